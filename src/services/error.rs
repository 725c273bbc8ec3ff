use thiserror::Error;

use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::filter::error::FilterError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    /// Request is well-formed but refers to a disallowed operation
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Query(#[from] FilterError),
}

impl ServiceError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, ServiceError::Database(e) if e.is_object_not_found())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Rejected(msg) => ApiError::validation_error(msg, None),
            ServiceError::Validation(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Query(e) => e.into(),
        }
    }
}
