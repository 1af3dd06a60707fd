use thiserror::Error;

use hotelbook_core::{DomainError, EntityId};

use crate::store::{ConcurrencyFailure, StoreError};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure of an entity service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The target id, or every supplied relationship target, did not resolve.
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    /// A client-supplied id is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write raced with a change other than deletion of its own row. Fatal.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A stored row does not satisfy its schema.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    /// Map a failed commit whose primary row is `(entity, id)`.
    ///
    /// Only the primary row vanishing is reported as `NotFound`; every other
    /// concurrency failure is fatal.
    pub(crate) fn from_commit(err: StoreError, entity: &str, id: &EntityId) -> Self {
        match err {
            StoreError::Concurrency { entity: e, id: ref row, failure: ConcurrencyFailure::Deleted }
                if e == entity && row == id =>
            {
                ServiceError::NotFound
            }
            other => other.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate { .. } => ServiceError::Conflict(value.to_string()),
            StoreError::Concurrency { .. } => ServiceError::Concurrency(value.to_string()),
            other => ServiceError::Store(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Invariant(msg),
        }
    }
}
