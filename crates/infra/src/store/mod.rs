//! Row store boundary.
//!
//! The services talk to storage only through the [`Store`] trait: planned
//! find-many queries, predicate counts and atomic write batches. Two
//! implementations exist: an in-memory store for tests/dev and, behind the
//! `postgres` feature, a Postgres store.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use r#trait::{ConcurrencyFailure, Store, StoreError, WriteBatch, WriteOp};
