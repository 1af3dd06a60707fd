//! Relationship mutation.
//!
//! A has-many relationship set is the set of target rows whose foreign key
//! points at the source. Connecting, disconnecting and replacing all come
//! down to `SetRef` writes on target rows, committed in one batch together
//! with a `Touch` of the source at the version read when the operation
//! started. Every target write carries the version read during resolution,
//! so a concurrent change to any involved row fails the whole batch.

use std::collections::HashSet;

use hotelbook_core::{Condition, EntityDef, EntityId, Predicate, Query, Record, RelationDef, Row, Value};

use super::error::{ServiceError, ServiceResult};
use crate::store::{Store, StoreError, WriteBatch, WriteOp};

pub(crate) struct RelationMutator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> RelationMutator<'a, S>
where
    S: Store + ?Sized,
{
    pub(crate) fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load a row by id, or fail `NotFound`.
    pub(crate) async fn load(&self, def: &'static EntityDef, id: &EntityId) -> ServiceResult<Row> {
        self.store
            .find(def, &Query::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)
    }

    pub(crate) fn has_many(
        &self,
        def: &EntityDef,
        relation: &str,
    ) -> ServiceResult<(&'static RelationDef, &'static EntityDef)> {
        match def.relation(relation) {
            Some(rel) if rel.is_has_many() => Ok((rel, self.target(rel)?)),
            _ => Err(ServiceError::Validation(format!(
                "{} has no has-many relation `{relation}`",
                def.name
            ))),
        }
    }

    pub(crate) fn belongs_to(
        &self,
        def: &EntityDef,
        relation: &str,
    ) -> ServiceResult<(&'static RelationDef, &'static EntityDef)> {
        match def.relation(relation) {
            Some(rel) if !rel.is_has_many() => Ok((rel, self.target(rel)?)),
            _ => Err(ServiceError::Validation(format!(
                "{} has no single relation `{relation}`",
                def.name
            ))),
        }
    }

    fn target(&self, relation: &RelationDef) -> ServiceResult<&'static EntityDef> {
        self.store.catalog().target_of(relation).ok_or_else(|| {
            StoreError::schema(format!("relation target `{}` is not in the catalog", relation.target))
                .into()
        })
    }

    /// The existing rows among `ids`, in id order. Unknown ids are dropped.
    pub(crate) async fn resolve(
        &self,
        target: &'static EntityDef,
        ids: &[EntityId],
    ) -> ServiceResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .find(target, &Query::unbounded(Predicate::id_in(ids.to_vec())))
            .await?;
        Ok(rows.into_iter().map(|r| r.record).collect())
    }

    /// Rows of `target` currently in the relationship set of `source`.
    async fn members(
        &self,
        relation: &RelationDef,
        target: &'static EntityDef,
        source: &EntityId,
    ) -> ServiceResult<Vec<Record>> {
        let predicate = Predicate::all().and(Condition::Equals {
            field: relation.foreign_key(),
            value: Value::from(source.clone()),
        });
        let rows = self.store.find(target, &Query::unbounded(predicate)).await?;
        Ok(rows.into_iter().map(|r| r.record).collect())
    }

    /// Writes that make the relationship set of `source` exactly `resolved`.
    pub(crate) async fn replacement_ops(
        &self,
        relation: &RelationDef,
        target: &'static EntityDef,
        source: &EntityId,
        resolved: &[Record],
    ) -> ServiceResult<Vec<WriteOp>> {
        let fk = relation.foreign_key();
        let keep: HashSet<&EntityId> = resolved.iter().map(|r| &r.id).collect();
        let current = self.members(relation, target, source).await?;

        let dropped = current
            .iter()
            .filter(|r| !keep.contains(&r.id))
            .map(|r| set_ref(target, r, fk, None));
        let added = resolved
            .iter()
            .filter(|r| !r.points_at(fk, source))
            .map(|r| set_ref(target, r, fk, Some(source.clone())));
        Ok(dropped.chain(added).collect())
    }

    /// Add every resolvable id to the set. Fails `NotFound` when none resolve.
    pub(crate) async fn connect(
        &self,
        def: &'static EntityDef,
        relation: &str,
        source: &EntityId,
        ids: &[EntityId],
    ) -> ServiceResult<()> {
        let owner = self.load(def, source).await?;
        let (rel, target) = self.has_many(def, relation)?;
        let resolved = self.resolve(target, ids).await?;
        if resolved.is_empty() {
            return Err(ServiceError::NotFound);
        }

        let fk = rel.foreign_key();
        let mut batch = WriteBatch::new();
        batch.push(touch(def, &owner.record));
        batch.extend(
            resolved
                .iter()
                .filter(|r| !r.points_at(fk, source))
                .map(|r| set_ref(target, r, fk, Some(source.clone()))),
        );
        tracing::info!(relation, requested = ids.len(), resolved = resolved.len(), "connect");
        self.commit(batch, def, source).await
    }

    /// Remove resolvable ids from the set. Unknown or unconnected ids are ignored.
    pub(crate) async fn disconnect(
        &self,
        def: &'static EntityDef,
        relation: &str,
        source: &EntityId,
        ids: &[EntityId],
    ) -> ServiceResult<()> {
        let owner = self.load(def, source).await?;
        let (rel, target) = self.has_many(def, relation)?;
        let resolved = self.resolve(target, ids).await?;

        let fk = rel.foreign_key();
        let mut batch = WriteBatch::new();
        batch.push(touch(def, &owner.record));
        batch.extend(
            resolved
                .iter()
                .filter(|r| r.points_at(fk, source))
                .map(|r| set_ref(target, r, fk, None)),
        );
        tracing::info!(relation, requested = ids.len(), resolved = resolved.len(), "disconnect");
        self.commit(batch, def, source).await
    }

    /// Make the set exactly the resolvable subset of `ids`.
    ///
    /// An empty `ids` clears the set; a non-empty `ids` of which nothing
    /// resolves fails `NotFound`.
    pub(crate) async fn replace_all(
        &self,
        def: &'static EntityDef,
        relation: &str,
        source: &EntityId,
        ids: &[EntityId],
    ) -> ServiceResult<()> {
        let owner = self.load(def, source).await?;
        let (rel, target) = self.has_many(def, relation)?;
        let resolved = self.resolve(target, ids).await?;
        if resolved.is_empty() && !ids.is_empty() {
            return Err(ServiceError::NotFound);
        }

        let mut batch = WriteBatch::new();
        batch.push(touch(def, &owner.record));
        batch.extend(self.replacement_ops(rel, target, source, &resolved).await?);
        tracing::info!(relation, requested = ids.len(), resolved = resolved.len(), "replace_all");
        self.commit(batch, def, source).await
    }

    pub(crate) async fn commit(
        &self,
        batch: WriteBatch,
        def: &EntityDef,
        id: &EntityId,
    ) -> ServiceResult<()> {
        self.store
            .commit(batch)
            .await
            .map_err(|e| ServiceError::from_commit(e, def.name, id))
    }
}

fn touch(def: &'static EntityDef, record: &Record) -> WriteOp {
    WriteOp::Touch { def, id: record.id.clone(), expected_version: record.version }
}

fn set_ref(
    def: &'static EntityDef,
    record: &Record,
    foreign_key: &'static str,
    target: Option<EntityId>,
) -> WriteOp {
    WriteOp::SetRef {
        def,
        id: record.id.clone(),
        foreign_key,
        target,
        expected_version: Some(record.version),
    }
}
