//! Entity identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a stored entity.
///
/// Ids are opaque strings: clients may supply their own on create, otherwise
/// the service generates one. They are immutable once assigned.
///
/// Deserialization goes through [`FromStr`], so an id read from a body is
/// trimmed and rejected when blank, exactly like an id read from a path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered) so generated ids sort roughly by creation.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap an existing string without validation.
    ///
    /// Prefer `parse` for untrusted input.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("EntityId: empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for EntityId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A reference to another entity by id, as carried in request bodies
/// (`{"id": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRef {
    pub id: EntityId,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: EntityId::new(id) }
    }

    pub fn into_ids(refs: Vec<IdRef>) -> Vec<EntityId> {
        refs.into_iter().map(|r| r.id).collect()
    }
}

impl From<EntityId> for IdRef {
    fn from(id: EntityId) -> Self {
        Self { id }
    }
}
