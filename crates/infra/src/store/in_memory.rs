use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hotelbook_core::{
    Catalog, EntityDef, EntityId, Predicate, Query, Record, RelationDef, RelationLookup, Row,
    Value,
};

use super::r#trait::{ConcurrencyFailure, Store, StoreError, WriteBatch, WriteOp};

type Table = BTreeMap<EntityId, Record>;
type Tables = HashMap<&'static str, Table>;

/// In-memory row store.
///
/// Intended for tests/dev. A batch is applied in place under the write lock;
/// every touched row's prior state goes to an undo log that is replayed in
/// reverse when a later write in the batch fails.
#[derive(Debug)]
pub struct InMemoryStore {
    catalog: &'static Catalog,
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new(catalog: &'static Catalog) -> Self {
        let tables = catalog.entities().iter().map(|d| (d.table, Table::new())).collect();
        Self { catalog, tables: RwLock::new(tables) }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn find_rows(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.read()?;
        let lookup = Snapshot { tables: &*tables };
        let source = table(&tables, def)?;

        let mut matched: Vec<&Record> = source
            .values()
            .filter(|r| query.predicate.matches(def, r, &lookup))
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        let page = query.window(matched);

        let mut includes = Vec::with_capacity(query.include.len());
        for name in &query.include {
            let relation = def
                .relation(name)
                .filter(|r| r.is_has_many())
                .ok_or_else(|| StoreError::schema(format!("{} has no has-many `{name}`", def.name)))?;
            includes.push((relation.name, children_by_parent(&tables, relation)?));
        }

        Ok(page
            .into_iter()
            .map(|record| {
                let mut row = Row::new(record.clone());
                for (name, index) in &includes {
                    let ids = index.get(&record.id).cloned().unwrap_or_default();
                    row.related.insert(*name, ids);
                }
                row
            })
            .collect())
    }

    fn count_rows(&self, def: &'static EntityDef, predicate: &Predicate) -> Result<u64, StoreError> {
        let tables = self.read()?;
        let lookup = Snapshot { tables: &*tables };
        let source = table(&tables, def)?;
        Ok(source.values().filter(|r| predicate.matches(def, r, &lookup)).count() as u64)
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let mut undo = Vec::new();
        for op in batch.into_ops() {
            if let Err(err) = apply(&mut tables, self.catalog, op, &mut undo) {
                rollback(&mut tables, undo);
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    async fn find(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.find_rows(def, query)
    }

    async fn count(
        &self,
        def: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        self.count_rows(def, predicate)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let ops = batch.len();
        self.apply_batch(batch)?;
        tracing::debug!(ops, "in-memory batch committed");
        Ok(())
    }
}

/// Has-many membership over a consistent view of all tables.
struct Snapshot<'a> {
    tables: &'a Tables,
}

impl RelationLookup for Snapshot<'_> {
    fn points_at(&self, relation: &RelationDef, target: &EntityId, source: &EntityId) -> bool {
        self.tables
            .get(relation.target)
            .and_then(|t| t.get(target))
            .is_some_and(|r| r.points_at(relation.foreign_key(), source))
    }
}

fn table<'a>(tables: &'a Tables, def: &EntityDef) -> Result<&'a Table, StoreError> {
    tables
        .get(def.table)
        .ok_or_else(|| StoreError::schema(format!("unknown table {}", def.table)))
}

fn table_mut<'a>(tables: &'a mut Tables, def: &EntityDef) -> Result<&'a mut Table, StoreError> {
    tables
        .get_mut(def.table)
        .ok_or_else(|| StoreError::schema(format!("unknown table {}", def.table)))
}

/// Child ids grouped by the parent they point at, in id order.
fn children_by_parent(
    tables: &Tables,
    relation: &RelationDef,
) -> Result<HashMap<EntityId, Vec<EntityId>>, StoreError> {
    let target = tables
        .get(relation.target)
        .ok_or_else(|| StoreError::schema(format!("unknown table {}", relation.target)))?;
    let mut index: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
    for child in target.values() {
        if let Some(parent) = child.reference(relation.foreign_key()) {
            index.entry(parent).or_default().push(child.id.clone());
        }
    }
    Ok(index)
}

/// Prior state of a row written by the current batch (`None`: it did not exist).
struct Undo {
    table: &'static str,
    id: EntityId,
    prior: Option<Record>,
}

fn rollback(tables: &mut Tables, undo: Vec<Undo>) {
    for entry in undo.into_iter().rev() {
        if let Some(table) = tables.get_mut(entry.table) {
            match entry.prior {
                Some(record) => {
                    table.insert(entry.id, record);
                }
                None => {
                    table.remove(&entry.id);
                }
            }
        }
    }
}

fn guarded<'a>(
    table: &'a mut Table,
    def: &'static EntityDef,
    id: &EntityId,
    expected_version: Option<u64>,
    undo: &mut Vec<Undo>,
) -> Result<&'a mut Record, StoreError> {
    let conflict = |failure| StoreError::Concurrency { entity: def.name, id: id.clone(), failure };
    let record = table.get_mut(id).ok_or_else(|| conflict(ConcurrencyFailure::Deleted))?;
    if expected_version.is_some_and(|v| v != record.version) {
        return Err(conflict(ConcurrencyFailure::Other));
    }
    undo.push(Undo { table: def.table, id: id.clone(), prior: Some(record.clone()) });
    Ok(record)
}

fn apply(
    tables: &mut Tables,
    catalog: &Catalog,
    op: WriteOp,
    undo: &mut Vec<Undo>,
) -> Result<(), StoreError> {
    match op {
        WriteOp::Insert { def, id, values } => {
            let t = table_mut(tables, def)?;
            if t.contains_key(&id) {
                return Err(StoreError::Duplicate { entity: def.name, id });
            }
            let mut record = Record::new(id.clone());
            record.values = values;
            t.insert(id.clone(), record);
            undo.push(Undo { table: def.table, id, prior: None });
        }
        WriteOp::Update { def, id, expected_version, values } => {
            let record = guarded(table_mut(tables, def)?, def, &id, expected_version, undo)?;
            record.values.extend(values);
            record.version += 1;
        }
        WriteOp::SetRef { def, id, foreign_key, target, expected_version } => {
            let record = guarded(table_mut(tables, def)?, def, &id, expected_version, undo)?;
            record.values.insert(foreign_key, Value::from(target));
            record.version += 1;
        }
        WriteOp::Touch { def, id, expected_version } => {
            let record = guarded(table_mut(tables, def)?, def, &id, Some(expected_version), undo)?;
            record.version += 1;
        }
        WriteOp::Delete { def, id } => {
            let Some(removed) = table_mut(tables, def)?.remove(&id) else {
                return Err(StoreError::Concurrency {
                    entity: def.name,
                    id,
                    failure: ConcurrencyFailure::Deleted,
                });
            };
            undo.push(Undo { table: def.table, id: id.clone(), prior: Some(removed) });
            for (referencing, foreign_key) in catalog.referencing(def.table) {
                for record in table_mut(tables, referencing)?.values_mut() {
                    if record.points_at(foreign_key, &id) {
                        undo.push(Undo {
                            table: referencing.table,
                            id: record.id.clone(),
                            prior: Some(record.clone()),
                        });
                        record.values.insert(foreign_key, Value::Null);
                        record.version += 1;
                    }
                }
            }
        }
    }
    Ok(())
}
