use sqlx::migrate::MigrateError;

/// Failure kinds surfaced by the donation and partner services.
///
/// The set is closed: callers match it exhaustively to pick a response.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// Caller or input fault, not retryable without correction.
    #[error("{0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A store operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// The payment gateway failed, timed out or answered with an incomplete response.
    #[error("gateway error: {0}")]
    External(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        ServiceError::External(message.into())
    }

    /// Stable name of the failure kind, as exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::NotFound(_) => "NotFoundError",
            ServiceError::Database(_) => "DatabaseError",
            ServiceError::External(_) => "ExternalError",
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Database(error.to_string())
    }
}

impl From<MigrateError> for ServiceError {
    fn from(error: MigrateError) -> Self {
        ServiceError::Database(format!("migration failed: {error}"))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ServiceError::External(format!("gateway request timed out: {error}"));
        }
        ServiceError::External(error.to_string())
    }
}
