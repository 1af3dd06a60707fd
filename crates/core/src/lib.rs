//! `hotelbook-core` — building blocks shared by every entity.
//!
//! This crate is **pure**: identifiers, column values, static entity schemas,
//! the where-clause predicate builder and the find-many query plan. Stores and
//! HTTP live elsewhere.

pub mod entity;
pub mod error;
pub mod id;
pub mod query;
pub mod schema;
pub mod value;

pub use entity::{Changeset, Entity, Link, Record, Row};
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, IdRef};
pub use query::{
    Condition, FindManyArgs, OrderBy, PageLimits, Predicate, PredicateBuilder, Query,
    RelationLookup, SortKey, SortOrder, WhereInput,
};
pub use schema::{Catalog, EntityDef, FieldDef, FieldKind, RelationDef, RelationKind};
pub use value::Value;
