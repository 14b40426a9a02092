//! Shared error type for the webhook delivery service.

use thiserror::Error;

/// Top-level error type threaded through the store, queue, cache, and HTTP layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("target_url is required".to_string());
        assert_eq!(err.to_string(), "validation error: target_url is required");
    }

    #[test]
    fn test_error_conversion() {
        let sql_err = sqlx::Error::RowNotFound;
        let our_err: Error = sql_err.into();
        assert!(matches!(our_err, Error::Database(_)));
    }
}
