use export_config::shared::RemoteSyncConfig;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::downstream::base::RemoteSync;
use crate::error::{ErrorKind, ExportResult};
use crate::export_error;

/// Mirrors entity directories into another directory tree.
///
/// A directory synced under key `k` lands in `<target_dir>/<key_prefix>/<k>`. Files already
/// present at the destination are overwritten; extra files are left in place.
#[derive(Debug, Clone)]
pub struct DirectoryMirrorSync {
    target_dir: PathBuf,
    key_prefix: String,
}

impl DirectoryMirrorSync {
    pub fn new(target_dir: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Self {
        Self {
            target_dir: target_dir.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(config: &RemoteSyncConfig) -> Self {
        Self::new(&config.target_dir, &config.key_prefix)
    }

    fn destination(&self, remote_key: &str) -> PathBuf {
        let mut path = self.target_dir.clone();
        if !self.key_prefix.is_empty() {
            path.push(&self.key_prefix);
        }
        path.push(remote_key);
        path
    }
}

impl RemoteSync for DirectoryMirrorSync {
    fn enabled(&self) -> bool {
        true
    }

    async fn sync_directory(
        &self,
        local_dir: &Path,
        remote_key: &str,
        label: &str,
    ) -> ExportResult<()> {
        let destination = self.destination(remote_key);
        let copied = copy_tree(local_dir, &destination).await.map_err(|err| {
            export_error!(
                ErrorKind::SyncFailed,
                "Failed to mirror directory",
                format!("{} -> {}", local_dir.display(), destination.display()),
                source: err
            )
        })?;

        info!(label, files = copied, destination = %destination.display(), "directory synced");

        Ok(())
    }
}

/// Copies every file below `from` into `to`, creating directories as needed.
async fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    let mut copied = 0;

    while let Some((source_dir, target_dir)) = pending.pop() {
        fs::create_dir_all(&target_dir).await?;

        let mut entries = fs::read_dir(&source_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = target_dir.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), target).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}
