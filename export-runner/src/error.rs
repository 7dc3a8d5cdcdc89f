use export::error::ExportError;
use std::backtrace::Backtrace;
use std::error::Error;
use thiserror::Error;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Error type for the export runner.
///
/// Wraps [`ExportError`] for pipeline errors and adds variants for process setup.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The export run failed.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[source] Box<dyn Error + Send + Sync>),
    /// The runtime could not be started.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Creates a configuration error from any error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err))
    }

    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Export(_) => "export error",
            RunnerError::Config(_) => "configuration error",
            RunnerError::Io(_) => "i/o error",
        }
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Export(err) => Some(err.backtrace()),
            RunnerError::Config(_) | RunnerError::Io(_) => None,
        }
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("export failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export::error::ErrorKind;

    #[test]
    fn report_lists_category_and_causes() {
        let io = std::io::Error::other("disk full");
        let err = RunnerError::from(
            ExportError::from((ErrorKind::DestinationIoError, "Failed to write output file"))
                .with_source(io),
        );

        let report = err.render_report();

        assert!(report.starts_with("export failed\n"));
        assert!(report.contains("category: export error"));
        assert!(report.contains("cause 1: disk full"));
    }
}
