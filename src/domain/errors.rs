use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection pool error: {0}")]
    Pool(String),
    #[error("Corrupt outbox row id={id}: {reason}")]
    CorruptRow { id: i64, reason: String },
    #[error("Duplicate handler registration for event type '{0}'")]
    DuplicateHandler(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OutboxError {
    /// Short, stable label used as the `exception` metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboxError::Database(_) => "Database",
            OutboxError::Pool(_) => "Pool",
            OutboxError::CorruptRow { .. } => "CorruptRow",
            OutboxError::DuplicateHandler(_) => "DuplicateHandler",
            OutboxError::Internal(_) => "Internal",
        }
    }
}
