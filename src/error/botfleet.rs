use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BotfleetError {
    /// Establishing the driver connection failed (network, auth, unknown database).
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// A statement failed on an established connection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// DDL failure scoped to one table; recovered by skipping that table.
    #[error("Schema error on table {table}: {message}")]
    Schema { table: String, message: String },

    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Worker spawn or control-channel IO failure.
    #[error("Process error: {0}")]
    Process(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BotfleetError {
    /// Failures that leave a worker without its datastore. Workers terminate on these with
    /// the connectivity exit code so the supervisor does not retry.
    pub fn is_datastore_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Database(_) | Self::NotFound(_)
        )
    }

    /// The driver connection is unusable and must be reopened before the next statement.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn dropped_connections_are_recognized() {
        let broken = BotfleetError::Database(sqlx::Error::Io(io::Error::from(
            io::ErrorKind::BrokenPipe,
        )));
        assert!(broken.is_connection_lost());
        assert!(broken.is_datastore_failure());

        let gone = BotfleetError::Database(sqlx::Error::Protocol("server has gone away".into()));
        assert!(gone.is_connection_lost());

        assert!(!BotfleetError::Database(sqlx::Error::RowNotFound).is_connection_lost());
        assert!(!BotfleetError::NotFound("acme".into()).is_connection_lost());
    }
}
