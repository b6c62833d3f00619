use thiserror::Error;

/// Errors that can occur when writing to or reading from the record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    /// The record violated a field constraint.
    #[error("Record rejected: {0}")]
    ValidationRejected(String),

    /// The store could not be reached or failed internally.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

impl RecordStoreError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordStoreError::ValidationRejected(_) => "validation_rejected",
            RecordStoreError::Unavailable(_) => "unavailable",
            RecordStoreError::DuplicateKey(_) => "duplicate_key",
        }
    }
}

impl From<sqlx::Error> for RecordStoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(ref db_err) = err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => return RecordStoreError::DuplicateKey(constraint),
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                    return RecordStoreError::ValidationRejected(constraint);
                }
                _ => {}
            }
        }
        RecordStoreError::Unavailable(err.to_string())
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, RecordStoreError>;
