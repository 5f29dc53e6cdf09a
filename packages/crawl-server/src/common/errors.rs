use thiserror::Error;

use crate::common::{SessionId, SkuId};
use crate::domains::filters::FilterError;

/// Errors returned by every core operation.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Crawling session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("A crawling session is already pending or processing for search keyword URL {0}")]
    SessionAlreadyRunning(SkuId),

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Stable classification of [`CoreError`] for callers that map errors onto a
/// transport (status codes, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    StoreFailure,
    Cancelled,
}

impl CoreError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::SessionNotFound(_) | CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::SessionAlreadyRunning(_) => ErrorKind::Conflict,
            CoreError::InvalidInput { .. } | CoreError::InvalidFilter(_) => {
                ErrorKind::InvalidInput
            }
            CoreError::DatabaseError(_) => ErrorKind::StoreFailure,
            CoreError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::SessionNotFound(SessionId::from_i64(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::SessionAlreadyRunning(SkuId::from_i64(123)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::InvalidFilter(FilterError::InvalidFilterColumn("a-b".into())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            CoreError::DatabaseError(sqlx::Error::PoolClosed).kind(),
            ErrorKind::StoreFailure
        );
        assert_eq!(CoreError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_message_names_the_sku() {
        let err = CoreError::SessionAlreadyRunning(SkuId::from_i64(123));
        assert!(err.to_string().contains("123"));
    }
}
