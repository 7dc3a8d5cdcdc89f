use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A numeric field is outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The output root directory is empty.
    #[error("`output.root_dir` cannot be empty")]
    EmptyOutputRoot,
    /// The same entity appears more than once in the skip-list.
    #[error("entity {0} appears more than once in `skip_list`")]
    DuplicateSkipEntry(u64),
}
