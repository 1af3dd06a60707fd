//! The find-many query plan.
//!
//! Execution order is fixed for every store: filter, order, skip, take,
//! include. Ordering always ends with `id ASC`, so a stable page window
//! exists for any request.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entity::Record;
use crate::error::{DomainError, DomainResult};
use crate::id::EntityId;
use crate::query::predicate::{Predicate, WhereInput};
use crate::schema::EntityDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A requested sort key, as named by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Desc }
    }

    /// Parse `field[:asc|desc][,field[:asc|desc]...]`.
    ///
    /// A key without a direction sorts ascending. Blank segments are skipped.
    pub fn parse_list(raw: &str) -> DomainResult<Vec<SortKey>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|segment| {
                let (field, dir) = match segment.split_once(':') {
                    Some((f, d)) => (f.trim(), d.trim()),
                    None => (segment, "asc"),
                };
                if field.is_empty() {
                    return Err(DomainError::validation(format!("sort key `{segment}` has no field")));
                }
                let order = match dir.to_ascii_lowercase().as_str() {
                    "asc" => SortOrder::Asc,
                    "desc" => SortOrder::Desc,
                    other => {
                        return Err(DomainError::validation(format!(
                            "sort direction `{other}` must be asc or desc"
                        )));
                    }
                };
                Ok(SortKey { field: field.to_string(), order })
            })
            .collect()
    }
}

/// Paging defaults and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_take: u32,
    pub max_take: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_take: 100, max_take: 1000 }
    }
}

impl PageLimits {
    pub fn new(default_take: u32, max_take: u32) -> DomainResult<Self> {
        if max_take == 0 {
            return Err(DomainError::validation("max_take must be positive"));
        }
        if default_take > max_take {
            return Err(DomainError::validation(format!(
                "default_take ({default_take}) exceeds max_take ({max_take})"
            )));
        }
        Ok(Self { default_take, max_take })
    }

    /// Effective take for a request: default when absent, capped at `max_take`.
    pub fn effective_take(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_take).min(self.max_take)
    }
}

/// Client-facing find-many arguments for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FindManyArgs<W> {
    pub where_: Option<W>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
    pub sort_by: Vec<SortKey>,
}

impl<W> Default for FindManyArgs<W> {
    fn default() -> Self {
        Self { where_: None, skip: None, take: None, sort_by: Vec::new() }
    }
}

impl<W: WhereInput> FindManyArgs<W> {
    pub fn filtered(where_: W) -> Self {
        Self { where_: Some(where_), ..Self::default() }
    }

    pub fn sorted(mut self, key: SortKey) -> Self {
        self.sort_by.push(key);
        self
    }

    pub fn page(mut self, skip: u32, take: u32) -> Self {
        self.skip = Some(skip);
        self.take = Some(take);
        self
    }

    /// Validate against `def` and produce an executable plan.
    pub fn plan(
        &self,
        def: &EntityDef,
        limits: &PageLimits,
        include: Vec<&'static str>,
    ) -> DomainResult<Query> {
        let predicate = self.where_.as_ref().map(W::to_predicate).unwrap_or_default();
        let mut order = Vec::with_capacity(self.sort_by.len() + 1);
        for key in &self.sort_by {
            let column = def.resolve_sortable(&key.field).ok_or_else(|| {
                DomainError::validation(format!("{} has no sortable field `{}`", def.name, key.field))
            })?;
            order.push(OrderBy { column, order: key.order });
        }
        if order.last().map(|o| o.column) != Some("id") {
            order.push(OrderBy::ID_ASC);
        }
        Ok(Query {
            predicate,
            order,
            skip: self.skip.unwrap_or(0) as usize,
            take: limits.effective_take(self.take) as usize,
            include,
        })
    }
}

/// A resolved sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub order: SortOrder,
}

impl OrderBy {
    pub const ID_ASC: OrderBy = OrderBy { column: "id", order: SortOrder::Asc };
}

/// An executable find-many plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub predicate: Predicate,
    pub order: Vec<OrderBy>,
    pub skip: usize,
    pub take: usize,
    pub include: Vec<&'static str>,
}

impl Query {
    /// Every row matching `predicate`, in id order.
    pub fn unbounded(predicate: Predicate) -> Self {
        Self {
            predicate,
            order: vec![OrderBy::ID_ASC],
            skip: 0,
            take: usize::MAX,
            include: Vec::new(),
        }
    }

    pub fn by_id(id: &EntityId) -> Self {
        Self { take: 1, ..Self::unbounded(Predicate::id_eq(id)) }
    }

    pub fn with_include(mut self, include: Vec<&'static str>) -> Self {
        self.include = include;
        self
    }

    /// Row ordering. Nulls sort first ascending and last descending.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.order {
            let ord = a.get(key.column).sort_cmp(&b.get(key.column));
            let ord = match key.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Apply skip/take to an already ordered sequence.
    pub fn window<T>(&self, rows: impl IntoIterator<Item = T>) -> Vec<T> {
        rows.into_iter().skip(self.skip).take(self.take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::PredicateBuilder;
    use crate::schema::{FieldDef, RelationDef};
    use crate::value::Value;
    use proptest::prelude::*;

    static ITEM: EntityDef = EntityDef {
        name: "Item",
        table: "items",
        fields: &[FieldDef::text("label", "label"), FieldDef::float("unit_price", "unitPrice")],
        relations: &[RelationDef::belongs_to("owner", "owners", "owner_id")],
    };

    #[derive(Debug, Clone, Default, PartialEq)]
    struct ItemWhere {
        label: Option<String>,
    }

    impl WhereInput for ItemWhere {
        fn to_predicate(&self) -> Predicate {
            PredicateBuilder::default().eq("label", self.label.clone()).build()
        }
    }

    fn item(id: &str, price: Option<f64>) -> Record {
        let mut r = Record::new(EntityId::new(id));
        r.values.insert("unit_price", Value::from(price));
        r
    }

    fn sorted(query: &Query, mut rows: Vec<Record>) -> Vec<String> {
        rows.sort_by(|a, b| query.compare(a, b));
        rows.into_iter().map(|r| r.id.into_inner()).collect()
    }

    #[test]
    fn parse_list_accepts_directions_and_defaults_to_asc() {
        let keys = SortKey::parse_list("rating:desc, name ,createdAt:ASC").unwrap();
        assert_eq!(
            keys,
            vec![SortKey::desc("rating"), SortKey::asc("name"), SortKey::asc("createdAt")]
        );
        assert!(SortKey::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn parse_list_rejects_bad_direction() {
        assert!(matches!(SortKey::parse_list("name:up"), Err(DomainError::Validation(_))));
        assert!(matches!(SortKey::parse_list(":asc"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn plan_rejects_unknown_sort_field() {
        let args = FindManyArgs::<ItemWhere>::default().sorted(SortKey::asc("owner"));
        let err = args.plan(&ITEM, &PageLimits::default(), vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn plan_appends_id_tiebreaker_and_applies_limits() {
        let args = FindManyArgs::filtered(ItemWhere { label: Some("x".into()) })
            .sorted(SortKey::desc("unitPrice"));
        let q = args.plan(&ITEM, &PageLimits::new(10, 20).unwrap(), vec![]).unwrap();
        assert_eq!(
            q.order,
            vec![OrderBy { column: "unit_price", order: SortOrder::Desc }, OrderBy::ID_ASC]
        );
        assert_eq!(q.skip, 0);
        assert_eq!(q.take, 10);
        assert_eq!(q.predicate.conditions().len(), 1);

        let capped = FindManyArgs::<ItemWhere>::default().page(5, 5000);
        let q = capped.plan(&ITEM, &PageLimits::new(10, 20).unwrap(), vec![]).unwrap();
        assert_eq!((q.skip, q.take), (5, 20));
    }

    #[test]
    fn explicit_id_key_is_not_duplicated() {
        let args = FindManyArgs::<ItemWhere>::default().sorted(SortKey::desc("id"));
        let q = args.plan(&ITEM, &PageLimits::default(), vec![]).unwrap();
        assert_eq!(q.order, vec![OrderBy { column: "id", order: SortOrder::Desc }]);
    }

    #[test]
    fn nulls_first_ascending_last_descending() {
        let rows = vec![item("a", Some(2.0)), item("b", None), item("c", Some(1.0))];
        let asc = FindManyArgs::<ItemWhere>::default()
            .sorted(SortKey::asc("unitPrice"))
            .plan(&ITEM, &PageLimits::default(), vec![])
            .unwrap();
        assert_eq!(sorted(&asc, rows.clone()), vec!["b", "c", "a"]);

        let desc = FindManyArgs::<ItemWhere>::default()
            .sorted(SortKey::desc("unitPrice"))
            .plan(&ITEM, &PageLimits::default(), vec![])
            .unwrap();
        assert_eq!(sorted(&desc, rows), vec!["a", "c", "b"]);
    }

    #[test]
    fn page_limits_validate() {
        assert!(PageLimits::new(10, 0).is_err());
        assert!(PageLimits::new(50, 10).is_err());
        assert_eq!(PageLimits::default().effective_take(None), 100);
        assert_eq!(PageLimits::default().effective_take(Some(0)), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn consecutive_windows_partition_the_ordering(
            prices in proptest::collection::vec(proptest::option::of(0u8..5), 0..40),
            take in 1u32..7,
        ) {
            let rows: Vec<Record> = prices
                .iter()
                .enumerate()
                .map(|(i, p)| item(&format!("{i:03}"), p.map(f64::from)))
                .collect();
            let base = FindManyArgs::<ItemWhere>::default().sorted(SortKey::desc("unitPrice"));
            let full = base.plan(&ITEM, &PageLimits::new(1000, 1000).unwrap(), vec![]).unwrap();
            let expected = sorted(&full, rows.clone());

            let mut paged = Vec::new();
            let mut skip = 0u32;
            loop {
                let q = base
                    .clone()
                    .page(skip, take)
                    .plan(&ITEM, &PageLimits::default(), vec![])
                    .unwrap();
                let mut ordered = rows.clone();
                ordered.sort_by(|a, b| q.compare(a, b));
                let window = q.window(ordered);
                if window.is_empty() {
                    break;
                }
                paged.extend(window.into_iter().map(|r| r.id.into_inner()));
                skip += take;
            }
            prop_assert_eq!(paged, expected);
        }
    }
}
