use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use hotelbook_core::{Catalog, EntityDef, EntityId, Predicate, Query, Row, Value};

/// Why a guarded write could not be applied.
///
/// Writes carry the version read earlier in the same operation. When the row
/// no longer matches, the store reports which of the two cases applies so the
/// caller can tell a raced delete from any other interleaving.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConcurrencyFailure {
    /// The row no longer exists.
    Deleted,
    /// The row exists but its version moved on.
    Other,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with id {id} already exists")]
    Duplicate { entity: &'static str, id: EntityId },

    #[error("optimistic concurrency check failed on {entity} {id}: {failure:?}")]
    Concurrency {
        entity: &'static str,
        id: EntityId,
        failure: ConcurrencyFailure,
    },

    /// A query or write named something the schema does not declare.
    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("failed to decode stored row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }
}

/// One write inside a [`WriteBatch`].
///
/// `expected_version`, when present, makes the write conditional on the row
/// still being at that version.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert {
        def: &'static EntityDef,
        id: EntityId,
        values: BTreeMap<&'static str, Value>,
    },
    Update {
        def: &'static EntityDef,
        id: EntityId,
        expected_version: Option<u64>,
        values: BTreeMap<&'static str, Value>,
    },
    /// Point (or clear) one foreign key on a row.
    SetRef {
        def: &'static EntityDef,
        id: EntityId,
        foreign_key: &'static str,
        target: Option<EntityId>,
        expected_version: Option<u64>,
    },
    /// Bump a row's version without changing it; guards the batch against a
    /// concurrent change to that row.
    Touch {
        def: &'static EntityDef,
        id: EntityId,
        expected_version: u64,
    },
    /// Remove a row. Foreign keys referencing it are set to null.
    Delete { def: &'static EntityDef, id: EntityId },
}

impl WriteOp {
    pub fn def(&self) -> &'static EntityDef {
        match self {
            WriteOp::Insert { def, .. }
            | WriteOp::Update { def, .. }
            | WriteOp::SetRef { def, .. }
            | WriteOp::Touch { def, .. }
            | WriteOp::Delete { def, .. } => def,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            WriteOp::Insert { id, .. }
            | WriteOp::Update { id, .. }
            | WriteOp::SetRef { id, .. }
            | WriteOp::Touch { id, .. }
            | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// Ordered writes committed atomically: all apply or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = WriteOp>) -> &mut Self {
        self.ops.extend(ops);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Row storage for every entity in a [`Catalog`].
///
/// ## Reads
///
/// `find` executes a planned find-many query in the fixed order filter, order,
/// skip, take, include. Rows come back with their current version so callers
/// can guard later writes. `count` applies only the predicate.
///
/// ## Writes
///
/// `commit` applies a [`WriteBatch`] atomically. Guarded writes that no longer
/// match report [`StoreError::Concurrency`]; inserting an existing id reports
/// [`StoreError::Duplicate`]. Nothing is retried.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    fn catalog(&self) -> &'static Catalog;

    async fn find(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError>;

    async fn count(&self, def: &'static EntityDef, predicate: &Predicate)
    -> Result<u64, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn catalog(&self) -> &'static Catalog {
        (**self).catalog()
    }

    async fn find(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError> {
        (**self).find(def, query).await
    }

    async fn count(
        &self,
        def: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        (**self).count(def, predicate).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).commit(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotelbook_hotels::HOTEL;

    #[test]
    fn batch_keeps_insertion_order() {
        let mut batch = WriteBatch::new();
        batch
            .push(WriteOp::Touch { def: &HOTEL, id: EntityId::new("h1"), expected_version: 3 })
            .push(WriteOp::Delete { def: &HOTEL, id: EntityId::new("h2") });
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[0].id().as_str(), "h1");
        assert_eq!(batch.ops()[1].def().name, "Hotel");
    }
}
