use thiserror::Error;

/// Result type for permission checks.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the capabilities the broker consumes.
#[derive(Debug, Error)]
pub enum Error {
    /// The permission backend could not decide.
    #[error("permission check failed: {0}")]
    PermissionCheck(String),

    /// The project named by the scope does not exist.
    #[error("no such project `{0}`")]
    NoSuchProject(String),

    /// The change named by the scope does not exist.
    #[error("no such change {project}~{number}")]
    NoSuchChange {
        /// Project of the change.
        project: String,
        /// Change number.
        number: u32,
    },
}
