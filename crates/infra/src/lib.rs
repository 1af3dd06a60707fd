//! Infrastructure layer: row stores, the hotel booking catalog and the
//! generic entity services built on them.

pub mod schema;
pub mod services;
pub mod store;

mod integration_tests;

pub use schema::CATALOG;
pub use services::{EntityService, ServiceError, ServiceResult};
pub use store::{InMemoryStore, Store, StoreError};
