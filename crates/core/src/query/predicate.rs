//! Where-clause predicates.
//!
//! A predicate is a flat conjunction of conditions: every condition must hold.
//! There is no OR, negation or nesting. Each entity's where input turns its
//! present fields into conditions; absent fields add nothing.

use crate::entity::Record;
use crate::id::EntityId;
use crate::schema::{EntityDef, RelationDef, RelationKind};
use crate::value::Value;

/// One conjunct of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals value (`id` included).
    Equals { field: &'static str, value: Value },
    /// Row id is one of `ids`. Used to resolve references.
    IdIn(Vec<EntityId>),
    /// The row's relationship set intersects `ids`.
    RelatedAny { relation: &'static str, ids: Vec<EntityId> },
}

/// Resolves has-many membership for in-memory evaluation.
///
/// Stores implement this over their current snapshot so a predicate can ask
/// "does target row `target` point back at `source`?".
pub trait RelationLookup {
    fn points_at(&self, relation: &RelationDef, target: &EntityId, source: &EntityId) -> bool;
}

/// Flat conjunction of conditions. The empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn builder() -> PredicateBuilder {
        PredicateBuilder::default()
    }

    pub fn id_eq(id: &EntityId) -> Self {
        Self::all().and(Condition::Equals {
            field: "id",
            value: Value::Text(id.as_str().to_string()),
        })
    }

    pub fn id_in(ids: Vec<EntityId>) -> Self {
        Self::all().and(Condition::IdIn(ids))
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a record of entity `def`.
    ///
    /// Unknown relation names never match.
    pub fn matches(&self, def: &EntityDef, record: &Record, lookup: &dyn RelationLookup) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::Equals { field, value } => *record.get(field) == *value,
            Condition::IdIn(ids) => ids.contains(&record.id),
            Condition::RelatedAny { relation, ids } => match def.relation(relation) {
                Some(rel) => match rel.kind {
                    RelationKind::BelongsTo { foreign_key } => record
                        .reference(foreign_key)
                        .is_some_and(|target| ids.contains(&target)),
                    RelationKind::HasMany { .. } => {
                        ids.iter().any(|target| lookup.points_at(rel, target, &record.id))
                    }
                },
                None => false,
            },
        })
    }
}

/// Builder that skips absent filter fields.
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    predicate: Predicate,
}

impl PredicateBuilder {
    pub fn eq<T: Into<Value>>(mut self, field: &'static str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.predicate = self.predicate.and(Condition::Equals { field, value: v.into() });
        }
        self
    }

    pub fn related(mut self, relation: &'static str, ids: Option<Vec<EntityId>>) -> Self {
        if let Some(ids) = ids {
            self.predicate = self.predicate.and(Condition::RelatedAny { relation, ids });
        }
        self
    }

    pub fn build(self) -> Predicate {
        self.predicate
    }
}

/// A per-entity filter object whose fields are all optional.
pub trait WhereInput {
    fn to_predicate(&self) -> Predicate;
}
