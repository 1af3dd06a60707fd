//! Entity trait, stored records and changesets.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::id::EntityId;
use crate::query::WhereInput;
use crate::schema::EntityDef;
use crate::value::Value;

/// A persisted entity type.
///
/// Implementors map between their typed representation and the generic
/// `Row`/`Changeset` shapes the store understands; everything else (paging,
/// relationship mutation, concurrency handling) is generic.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Input for create.
    type Create: Send + 'static;
    /// Input for partial update.
    type Update: Send + 'static;
    /// Flat filter input.
    type Where: WhereInput + Send + Sync + 'static;

    fn definition() -> &'static EntityDef;

    fn id(&self) -> &EntityId;

    fn from_row(row: &Row) -> DomainResult<Self>;

    /// Build the changeset for a new row. Unset timestamps default to `now`.
    fn create_changeset(input: Self::Create, now: DateTime<Utc>) -> Changeset;

    /// Build the changeset for a partial update (only supplied fields).
    fn update_changeset(input: Self::Update) -> Changeset;

    /// Relationships resolved eagerly when projecting this entity.
    fn includes() -> Vec<&'static str> {
        Self::definition().has_many().map(|r| r.name).collect()
    }
}

/// A stored row: id, optimistic-concurrency version and column values.
///
/// Columns absent from `values` read as `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: EntityId,
    pub version: u64,
    pub values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new(id: EntityId) -> Self {
        Self { id, version: 1, values: BTreeMap::new() }
    }

    /// Read a column; `id` is addressable like any other column.
    pub fn get(&self, column: &str) -> Cow<'_, Value> {
        if column == "id" {
            return Cow::Owned(Value::Text(self.id.as_str().to_string()));
        }
        match self.values.get(column) {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(Value::Null),
        }
    }

    pub fn reference(&self, foreign_key: &str) -> Option<EntityId> {
        self.values.get(foreign_key).and_then(Value::as_reference)
    }

    pub fn points_at(&self, foreign_key: &str, target: &EntityId) -> bool {
        self.values
            .get(foreign_key)
            .and_then(Value::as_text)
            .is_some_and(|v| v == target.as_str())
    }
}

/// A record plus the relationship ids resolved for projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub record: Record,
    pub related: BTreeMap<&'static str, Vec<EntityId>>,
}

impl Row {
    pub fn new(record: Record) -> Self {
        Self { record, related: BTreeMap::new() }
    }

    pub fn id(&self) -> &EntityId {
        &self.record.id
    }

    pub fn related(&self, relation: &str) -> Vec<EntityId> {
        self.related.get(relation).cloned().unwrap_or_default()
    }

    pub fn reference(&self, foreign_key: &str) -> Option<EntityId> {
        self.record.reference(foreign_key)
    }

    pub fn text(&self, column: &str) -> DomainResult<Option<String>> {
        match self.record.get(column).into_owned() {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(type_mismatch(column, "text", &other)),
        }
    }

    pub fn float(&self, column: &str) -> DomainResult<Option<f64>> {
        match &*self.record.get(column) {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            other => Err(type_mismatch(column, "float", other)),
        }
    }

    pub fn timestamp(&self, column: &str) -> DomainResult<Option<DateTime<Utc>>> {
        match &*self.record.get(column) {
            Value::Null => Ok(None),
            Value::Timestamp(t) => Ok(Some(*t)),
            other => Err(type_mismatch(column, "timestamp", other)),
        }
    }

    pub fn required_timestamp(&self, column: &str) -> DomainResult<DateTime<Utc>> {
        self.timestamp(column)?
            .ok_or_else(|| DomainError::invariant(format!("{column} is required but null")))
    }
}

fn type_mismatch(column: &str, expected: &str, found: &Value) -> DomainError {
    DomainError::invariant(format!("{column}: expected {expected}, found {found:?}"))
}

/// A relationship assignment carried by a changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Point a belongs-to relation at `id` (null if it does not resolve).
    Reference { relation: &'static str, id: EntityId },
    /// Make a has-many relation exactly the resolvable subset of `ids`.
    Collection { relation: &'static str, ids: Vec<EntityId> },
}

impl Link {
    pub fn relation(&self) -> &'static str {
        match self {
            Link::Reference { relation, .. } | Link::Collection { relation, .. } => relation,
        }
    }
}

/// A partial set of column values plus relationship assignments.
///
/// For creates, columns not set are stored as `Null`; for updates they are
/// left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub id: Option<EntityId>,
    pub values: BTreeMap<&'static str, Value>,
    pub links: Vec<Link>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: Option<EntityId>) -> Self {
        self.id = id;
        self
    }

    pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    /// Set `column` only when `value` is present.
    pub fn set_opt<T: Into<Value>>(self, column: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn link_one(mut self, relation: &'static str, id: Option<EntityId>) -> Self {
        if let Some(id) = id {
            self.links.push(Link::Reference { relation, id });
        }
        self
    }

    pub fn link_many(mut self, relation: &'static str, ids: Option<Vec<EntityId>>) -> Self {
        if let Some(ids) = ids {
            self.links.push(Link::Collection { relation, ids });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_reads_null_and_id_is_addressable() {
        let rec = Record::new(EntityId::new("h1"));
        assert_eq!(rec.get("name").into_owned(), Value::Null);
        assert_eq!(rec.get("id").into_owned(), Value::Text("h1".into()));
    }

    #[test]
    fn changeset_skips_absent_options() {
        let cs = Changeset::new()
            .set_opt("name", Some("Grand"))
            .set_opt::<f64>("rating", None)
            .link_one("hotel", None)
            .link_many("rooms", Some(vec![]));
        assert_eq!(cs.values.len(), 1);
        assert_eq!(cs.links, vec![Link::Collection { relation: "rooms", ids: vec![] }]);
    }

    #[test]
    fn row_accessors_report_type_mismatches() {
        let mut rec = Record::new(EntityId::new("r1"));
        rec.values.insert("price", Value::Text("cheap".into()));
        let row = Row::new(rec);
        assert!(row.float("price").is_err());
        assert_eq!(row.text("price").unwrap().as_deref(), Some("cheap"));
        assert!(row.required_timestamp("created_at").is_err());
    }
}
