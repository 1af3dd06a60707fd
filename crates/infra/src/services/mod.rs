//! Application services over the row store.

pub mod entity_service;
pub mod error;
mod relations;

pub use entity_service::EntityService;
pub use error::{ServiceError, ServiceResult};
