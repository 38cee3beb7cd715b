//! Error types for Crosspost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_) => 3,
            CrosspostError::PostNotFound(_) | CrosspostError::AccountNotFound(_) => 2,
            CrosspostError::Publish(_) => 1,
            CrosspostError::Config(_) => 1,
            CrosspostError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures scoped to a single publish target or refresh attempt.
///
/// These never abort sibling targets: the orchestrator converts them into
/// the failing target's `error_message` and carries on. Messages for
/// `RemoteRejected` carry the platform's own response text verbatim so the
/// user sees what the platform said.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("{0}")]
    MissingMedia(String),

    #[error("{0}")]
    MissingDestination(String),

    #[error("No publisher registered for platform: {0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    RemoteRejected(String),

    #[error("Media processing did not complete after {0} status checks")]
    ProcessingTimedOut(u32),

    #[error("Network error: {0}")]
    Network(String),
}
