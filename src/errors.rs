use thiserror::Error;

use crate::domain::errors::OutboxError;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Parse {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid outbox dispatch configuration: {0}")]
    Invalid(String),
}

/// Startup and shutdown failures of the dispatch service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} must be set")]
    MissingEnv(&'static str),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
