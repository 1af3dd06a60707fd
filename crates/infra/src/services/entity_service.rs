use std::collections::BTreeMap;
use std::marker::PhantomData;

use chrono::Utc;
use tracing::instrument;

use hotelbook_core::{
    Changeset, Condition, Entity, EntityDef, EntityId, FindManyArgs, Link, PageLimits, Query,
    Value, WhereInput,
};

use super::error::{ServiceError, ServiceResult};
use super::relations::RelationMutator;
use crate::store::{Store, WriteBatch, WriteOp};

/// CRUD, find-many, count and relationship operations for one entity type.
///
/// Instantiated once per entity; everything entity-specific comes from the
/// [`Entity`] implementation and its static schema.
///
/// ## Reference resolution
///
/// On create and update, a single reference that does not resolve is stored
/// as null and a has-many list is reduced to the ids that exist; neither is an
/// error. The dedicated relationship operations (`connect`, `replace_all`)
/// fail `NotFound` instead when nothing resolves.
///
/// ## Concurrency
///
/// Every write is one batch guarded by the versions read earlier in the same
/// operation. If the operation's own row was deleted in between, the result
/// is `NotFound`; any other conflict surfaces as `ServiceError::Concurrency`.
#[derive(Debug)]
pub struct EntityService<E, S> {
    store: S,
    limits: PageLimits,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> EntityService<E, S> {
    pub fn new(store: S, limits: PageLimits) -> Self {
        Self { store, limits, _entity: PhantomData }
    }
}

impl<E, S> EntityService<E, S>
where
    E: Entity,
    S: Store,
{
    fn def() -> &'static EntityDef {
        E::definition()
    }

    fn relations(&self) -> RelationMutator<'_, S> {
        RelationMutator::new(&self.store)
    }

    #[instrument(skip_all, fields(entity = E::definition().name))]
    pub async fn create(&self, input: E::Create) -> ServiceResult<E> {
        let changeset = E::create_changeset(input, Utc::now());
        let id = changeset.id.clone().unwrap_or_else(EntityId::generate);
        let (values, links) = self.resolve_links(&id, changeset).await?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Insert { def: Self::def(), id: id.clone(), values });
        batch.extend(links);
        self.store.commit(batch).await?;
        tracing::info!(id = %id, "created");

        self.get(&id).await
    }

    #[instrument(skip_all, fields(entity = E::definition().name, id = %id))]
    pub async fn get(&self, id: &EntityId) -> ServiceResult<E> {
        let query = Query::by_id(id).with_include(E::includes());
        let row = self
            .store
            .find(Self::def(), &query)
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)?;
        Ok(E::from_row(&row)?)
    }

    /// Partial update: only supplied fields change.
    #[instrument(skip_all, fields(entity = E::definition().name, id = %id))]
    pub async fn update(&self, id: &EntityId, input: E::Update) -> ServiceResult<()> {
        let current = self.relations().load(Self::def(), id).await?;
        let changeset = E::update_changeset(input);
        let (values, links) = self.resolve_links(id, changeset).await?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Update {
            def: Self::def(),
            id: id.clone(),
            expected_version: Some(current.record.version),
            values,
        });
        batch.extend(links);
        self.relations().commit(batch, Self::def(), id).await?;
        tracing::info!("updated");
        Ok(())
    }

    #[instrument(skip_all, fields(entity = E::definition().name, id = %id))]
    pub async fn delete(&self, id: &EntityId) -> ServiceResult<()> {
        self.relations().load(Self::def(), id).await?;
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::Delete { def: Self::def(), id: id.clone() });
        self.relations().commit(batch, Self::def(), id).await?;
        tracing::info!("deleted");
        Ok(())
    }

    #[instrument(skip_all, fields(entity = E::definition().name))]
    pub async fn find_many(&self, args: &FindManyArgs<E::Where>) -> ServiceResult<Vec<E>> {
        let query = args.plan(Self::def(), &self.limits, E::includes())?;
        let rows = self.store.find(Self::def(), &query).await?;
        tracing::debug!(rows = rows.len(), "find_many");
        rows.iter().map(|r| E::from_row(r).map_err(ServiceError::from)).collect()
    }

    /// Number of rows matching `filter`, ignoring paging.
    #[instrument(skip_all, fields(entity = E::definition().name))]
    pub async fn meta(&self, filter: Option<&E::Where>) -> ServiceResult<u64> {
        let predicate = filter.map(WhereInput::to_predicate).unwrap_or_default();
        Ok(self.store.count(Self::def(), &predicate).await?)
    }

    #[instrument(skip_all, fields(entity = E::definition().name, id = %id, relation = relation))]
    pub async fn connect(&self, id: &EntityId, relation: &str, ids: &[EntityId]) -> ServiceResult<()> {
        self.relations().connect(Self::def(), relation, id, ids).await
    }

    #[instrument(skip_all, fields(entity = E::definition().name, id = %id, relation = relation))]
    pub async fn disconnect(
        &self,
        id: &EntityId,
        relation: &str,
        ids: &[EntityId],
    ) -> ServiceResult<()> {
        self.relations().disconnect(Self::def(), relation, id, ids).await
    }

    #[instrument(skip_all, fields(entity = E::definition().name, id = %id, relation = relation))]
    pub async fn replace_all(
        &self,
        id: &EntityId,
        relation: &str,
        ids: &[EntityId],
    ) -> ServiceResult<()> {
        self.relations().replace_all(Self::def(), relation, id, ids).await
    }

    /// Members of a has-many relation, through the find-many pipeline of the
    /// target entity `T`.
    #[instrument(skip_all, fields(entity = E::definition().name, id = %id, relation = relation))]
    pub async fn find_related<T: Entity>(
        &self,
        id: &EntityId,
        relation: &str,
        args: &FindManyArgs<T::Where>,
    ) -> ServiceResult<Vec<T>> {
        let mutator = self.relations();
        mutator.load(Self::def(), id).await?;
        let (rel, target) = mutator.has_many(Self::def(), relation)?;
        check_target::<T>(target)?;

        let mut query = args.plan(target, &self.limits, T::includes())?;
        query.predicate = query.predicate.and(Condition::Equals {
            field: rel.foreign_key(),
            value: Value::from(id.clone()),
        });
        let rows = self.store.find(target, &query).await?;
        rows.iter().map(|r| T::from_row(r).map_err(ServiceError::from)).collect()
    }

    /// The row a single (belongs-to) relation points at. A null or dangling
    /// reference is `NotFound`.
    #[instrument(skip_all, fields(entity = E::definition().name, id = %id, relation = relation))]
    pub async fn get_related<T: Entity>(&self, id: &EntityId, relation: &str) -> ServiceResult<T> {
        let mutator = self.relations();
        let source = mutator.load(Self::def(), id).await?;
        let (rel, target) = mutator.belongs_to(Self::def(), relation)?;
        check_target::<T>(target)?;

        let target_id = source.reference(rel.foreign_key()).ok_or(ServiceError::NotFound)?;
        let query = Query::by_id(&target_id).with_include(T::includes());
        let row = self
            .store
            .find(target, &query)
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound)?;
        Ok(T::from_row(&row)?)
    }

    /// Turn a changeset's links into foreign-key values (single references)
    /// and target writes (has-many lists) for the row `id`.
    async fn resolve_links(
        &self,
        id: &EntityId,
        changeset: Changeset,
    ) -> ServiceResult<(BTreeMap<&'static str, Value>, Vec<WriteOp>)> {
        let mutator = self.relations();
        let mut values = changeset.values;
        let mut ops = Vec::new();

        for link in changeset.links {
            match link {
                Link::Reference { relation, id: target_id } => {
                    let (rel, target) = mutator.belongs_to(Self::def(), relation)?;
                    let resolved = mutator.resolve(target, std::slice::from_ref(&target_id)).await?;
                    if resolved.is_empty() {
                        tracing::debug!(relation, target = %target_id, "reference did not resolve, stored as null");
                    }
                    let value = Value::from(resolved.into_iter().next().map(|r| r.id));
                    values.insert(rel.foreign_key(), value);
                }
                Link::Collection { relation, ids } => {
                    let (rel, target) = mutator.has_many(Self::def(), relation)?;
                    let resolved = mutator.resolve(target, &ids).await?;
                    if resolved.len() < ids.len() {
                        tracing::debug!(
                            relation,
                            requested = ids.len(),
                            resolved = resolved.len(),
                            "some related ids did not resolve"
                        );
                    }
                    ops.extend(mutator.replacement_ops(rel, target, id, &resolved).await?);
                }
            }
        }
        Ok((values, ops))
    }
}

fn check_target<T: Entity>(target: &EntityDef) -> ServiceResult<()> {
    let expected = T::definition();
    if expected.table == target.table {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "relation targets {} but {} was requested",
            target.name, expected.name
        )))
    }
}
