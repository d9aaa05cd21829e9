// for error definitions
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateGateError {
    /// Errors surfaced by the cache backend
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Cache-specific errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend connection errors
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Backend authentication errors
    #[error("Cache authentication error: {0}")]
    Auth(String),

    /// Backend command errors
    #[error("Cache command error: {0}")]
    Command(String),

    /// The client is not connected; strict-mode commands refuse to run
    #[error("Cache backend unavailable")]
    Unavailable,
}

impl CacheError {
    /// Connection-class failures mark the client state, command-class
    /// failures do not.
    pub fn is_connection(&self) -> bool {
        matches!(self, CacheError::Connection(_) | CacheError::Unavailable)
    }
}

// Map backend errors onto the cache error taxonomy
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => CacheError::Auth(err.to_string()),
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                CacheError::Connection(err.to_string())
            }
            _ => CacheError::Command(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for RateGateError {
    fn from(err: redis::RedisError) -> Self {
        RateGateError::Cache(CacheError::from(err))
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, RateGateError>;
