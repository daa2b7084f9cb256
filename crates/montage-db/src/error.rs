//! Database-specific error types and conversions.

use montage_core::error::MontageError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Invalid database settings: {0}")]
    Config(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored record is malformed: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: String, reason: String },
}

impl DbError {
    /// Classify an error raised by a statement. Unique index violations
    /// become [`DbError::Conflict`].
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Conflict {
                entity: entity.into(),
                reason: message,
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn stale(entity: &str, id: &str, version: u64) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            reason: format!("{id} was modified concurrently (expected version {version})"),
        }
    }
}

impl From<DbError> for MontageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => MontageError::NotFound { entity, id },
            DbError::Conflict { entity, reason } => MontageError::Conflict { entity, reason },
            other => MontageError::Database(other.to_string()),
        }
    }
}
