use thiserror::Error;

pub type Result<T> = std::result::Result<T, DoppelError>;

#[derive(Error, Debug)]
pub enum DoppelError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Birthday lookup failed: {0}")]
    Oracle(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DoppelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the underlying SQLite failure is a constraint violation
    /// (unique index, foreign key, check).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DoppelError::Storage(e)
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }
}

// conversion from reqwest::Error
impl From<reqwest::Error> for DoppelError {
    fn from(err: reqwest::Error) -> Self {
        DoppelError::Notification(err.to_string())
    }
}
