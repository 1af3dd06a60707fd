//! Static entity schemas.
//!
//! Each entity crate declares one `EntityDef` as a `static`. Stores use it to
//! know which columns exist, how they are typed, and how relationships map to
//! foreign-key columns.

/// Storage type of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Float,
    Timestamp,
}

/// A scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name (snake_case).
    pub name: &'static str,
    /// Name used in JSON payloads and sort expressions (camelCase).
    pub json_name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDef {
    pub const fn text(name: &'static str, json_name: &'static str) -> Self {
        Self { name, json_name, kind: FieldKind::Text, required: false }
    }

    pub const fn float(name: &'static str, json_name: &'static str) -> Self {
        Self { name, json_name, kind: FieldKind::Float, required: false }
    }

    pub const fn timestamp(name: &'static str, json_name: &'static str) -> Self {
        Self { name, json_name, kind: FieldKind::Timestamp, required: false }
    }

    pub const fn required(self) -> Self {
        Self { required: true, ..self }
    }
}

/// Where the foreign key of a relationship lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// This entity holds `foreign_key`, referencing the target's id.
    BelongsTo { foreign_key: &'static str },
    /// The target table holds `foreign_key`, referencing this entity's id.
    HasMany { foreign_key: &'static str },
}

/// A named relationship from one entity to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    /// Target table name.
    pub target: &'static str,
    pub kind: RelationKind,
}

impl RelationDef {
    pub const fn belongs_to(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self { name, target, kind: RelationKind::BelongsTo { foreign_key } }
    }

    pub const fn has_many(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self { name, target, kind: RelationKind::HasMany { foreign_key } }
    }

    pub fn foreign_key(&self) -> &'static str {
        match self.kind {
            RelationKind::BelongsTo { foreign_key } | RelationKind::HasMany { foreign_key } => {
                foreign_key
            }
        }
    }

    pub fn is_has_many(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany { .. })
    }
}

/// Static description of one entity: key, scalar columns, relationships.
///
/// The `id` column is implicit and never appears in `fields`.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_many(&self) -> impl Iterator<Item = &'static RelationDef> {
        self.relations.iter().filter(|r| r.is_has_many())
    }

    pub fn belongs_to(&self) -> impl Iterator<Item = &'static RelationDef> {
        self.relations.iter().filter(|r| !r.is_has_many())
    }

    /// Every stored column except `id`: scalar fields, then foreign keys.
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .map(|f| f.name)
            .chain(self.belongs_to().map(|r| r.foreign_key()))
            .collect()
    }

    /// Resolve a sort/filter field name given as either column or JSON name.
    ///
    /// Only `id` and scalar fields are sortable; relationships are not.
    pub fn resolve_sortable(&self, name: &str) -> Option<&'static str> {
        if name == "id" {
            return Some("id");
        }
        self.fields
            .iter()
            .find(|f| f.name == name || f.json_name == name)
            .map(|f| f.name)
    }
}

/// Every entity known to a store.
///
/// Entities are listed so that relation targets precede the entities that
/// reference them; stores that create tables rely on this order.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    entities: &'static [&'static EntityDef],
}

impl Catalog {
    pub const fn new(entities: &'static [&'static EntityDef]) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &'static [&'static EntityDef] {
        self.entities
    }

    pub fn table(&self, table: &str) -> Option<&'static EntityDef> {
        self.entities.iter().copied().find(|d| d.table == table)
    }

    /// Target entity of `relation`.
    pub fn target_of(&self, relation: &RelationDef) -> Option<&'static EntityDef> {
        self.table(relation.target)
    }

    /// Every `(entity, foreign_key)` whose foreign key points into `table`.
    pub fn referencing<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (&'static EntityDef, &'static str)> + 'a {
        self.entities.iter().copied().flat_map(move |def| {
            def.belongs_to()
                .filter(move |r| r.target == table)
                .map(move |r| (def, r.foreign_key()))
        })
    }
}
