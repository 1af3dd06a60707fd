//! Postgres-backed row store.
//!
//! Tables are derived from the static entity schemas: an `id TEXT` primary
//! key, a `version BIGINT` for optimistic concurrency, one typed column per
//! scalar field and one `TEXT` foreign key per belongs-to relation. Queries
//! are assembled with `sqlx::QueryBuilder`; column names only ever come from
//! the schemas, values are always bound.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` on insert, otherwise `Backend` |
//! | Database (foreign key violation) | `23503` | `Backend` |
//! | Database (check constraint violation) | `23514` | `Backend` |
//! | Database (other) / PoolClosed / Other | any | `Backend` |
//! | ColumnDecode / TypeNotFound | N/A | `Decode` |
//!
//! Guarded writes that touch zero rows are re-checked inside the transaction
//! to tell a vanished row (`ConcurrencyFailure::Deleted`) from a moved version
//! (`ConcurrencyFailure::Other`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _, Transaction};
use tracing::{Span, instrument};

use hotelbook_core::{
    Catalog, Condition, EntityDef, EntityId, FieldKind, Predicate, Query, Record, RelationKind,
    Row, SortOrder, Value,
};

use super::r#trait::{ConcurrencyFailure, Store, StoreError, WriteBatch, WriteOp};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    catalog: &'static Catalog,
}

impl PostgresStore {
    pub fn new(pool: PgPool, catalog: &'static Catalog) -> Self {
        Self { pool: Arc::new(pool), catalog }
    }

    /// Create every catalog table that does not exist yet.
    ///
    /// Foreign keys use `ON DELETE SET NULL`; deletes issued through
    /// [`Store::commit`] also null them explicitly so versions move.
    #[instrument(skip(self), err)]
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        for def in self.catalog.entities() {
            let ddl = create_table_sql(def);
            sqlx::query(&ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("bootstrap", e))?;
            tracing::info!(table = def.table, "table ready");
        }
        Ok(())
    }

    async fn load_includes(
        &self,
        def: &EntityDef,
        include: &[&'static str],
        ids: &[String],
    ) -> Result<Vec<(&'static str, HashMap<String, Vec<EntityId>>)>, StoreError> {
        let mut out = Vec::with_capacity(include.len());
        for name in include {
            let relation = def
                .relation(name)
                .filter(|r| r.is_has_many())
                .ok_or_else(|| StoreError::schema(format!("{} has no has-many `{name}`", def.name)))?;
            let fk = relation.foreign_key();
            let sql = format!(
                "SELECT id, {fk} FROM {target} WHERE {fk} = ANY($1) ORDER BY id ASC",
                target = relation.target
            );
            let rows = sqlx::query(&sql)
                .bind(ids)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("load_includes", e))?;

            let mut index: HashMap<String, Vec<EntityId>> = HashMap::new();
            for row in rows {
                let child: String = row.try_get("id").map_err(decode_error)?;
                let parent: String = row.try_get(fk).map_err(decode_error)?;
                index.entry(parent).or_default().push(EntityId::new(child));
            }
            out.push((relation.name, index));
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    #[instrument(
        skip(self, def, query),
        fields(
            table = def.table,
            operation = tracing::field::Empty,
            row_count = tracing::field::Empty
        ),
        err
    )]
    async fn find(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError> {
        let span = Span::current();
        span.record("operation", "find");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(select_list(def)).push(" FROM ").push(def.table).push(" WHERE ");
        push_predicate(&mut qb, def, &query.predicate)?;
        qb.push(" ORDER BY ");
        for (i, key) in query.order.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(key.column).push(match key.order {
                SortOrder::Asc => " ASC NULLS FIRST",
                SortOrder::Desc => " DESC NULLS LAST",
            });
        }
        qb.push(" LIMIT ").push_bind(clamp_i64(query.take));
        qb.push(" OFFSET ").push_bind(clamp_i64(query.skip));

        let pg_rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        let records = pg_rows
            .iter()
            .map(|r| decode_record(def, r))
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<String> = records.iter().map(|r| r.id.as_str().to_string()).collect();
        let includes = self.load_includes(def, &query.include, &ids).await?;

        let rows: Vec<Row> = records
            .into_iter()
            .map(|record| {
                let mut row = Row::new(record);
                for (name, index) in &includes {
                    let related = index.get(row.id().as_str()).cloned().unwrap_or_default();
                    row.related.insert(*name, related);
                }
                row
            })
            .collect();

        span.record("row_count", rows.len());
        Ok(rows)
    }

    #[instrument(skip(self, def, predicate), fields(table = def.table), err)]
    async fn count(
        &self,
        def: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        qb.push(def.table).push(" WHERE ");
        push_predicate(&mut qb, def, predicate)?;
        let count: i64 = qb
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?
            .try_get(0)
            .map_err(decode_error)?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, batch), fields(op_count = batch.len()), err)]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for op in batch.into_ops() {
            if let Err(err) = apply(&mut tx, self.catalog, op).await {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(err);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

fn create_table_sql(def: &EntityDef) -> String {
    let mut columns = vec![
        "id TEXT PRIMARY KEY".to_string(),
        "version BIGINT NOT NULL DEFAULT 1".to_string(),
    ];
    for field in def.fields {
        let ty = match field.kind {
            FieldKind::Text => "TEXT",
            FieldKind::Float => "DOUBLE PRECISION",
            FieldKind::Timestamp => "TIMESTAMPTZ",
        };
        let null = if field.required { " NOT NULL" } else { "" };
        columns.push(format!("{} {ty}{null}", field.name));
    }
    for relation in def.belongs_to() {
        columns.push(format!(
            "{} TEXT REFERENCES {}(id) ON DELETE SET NULL",
            relation.foreign_key(),
            relation.target
        ));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", def.table, columns.join(", "))
}

fn select_list(def: &EntityDef) -> String {
    let mut cols = vec!["id", "version"];
    cols.extend(def.columns());
    cols.join(", ")
}

fn clamp_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn has_column(def: &EntityDef, column: &str) -> bool {
    def.columns().iter().any(|c| *c == column)
}

/// Column names a predicate may reference: `id`, scalar fields, foreign keys.
fn known_column(def: &EntityDef, column: &str) -> bool {
    column == "id" || has_column(def, column)
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Text(s) => {
            qb.push_bind(s.clone());
        }
        Value::Float(f) => {
            qb.push_bind(*f);
        }
        Value::Timestamp(t) => {
            qb.push_bind(*t);
        }
    }
}

fn id_strings(ids: &[EntityId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_string()).collect()
}

fn push_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    def: &EntityDef,
    predicate: &Predicate,
) -> Result<(), StoreError> {
    if predicate.is_empty() {
        qb.push("TRUE");
        return Ok(());
    }
    for (i, condition) in predicate.conditions().iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        match condition {
            Condition::Equals { field, value } => {
                if !known_column(def, field) {
                    return Err(StoreError::schema(format!("{} has no column `{field}`", def.name)));
                }
                qb.push(*field);
                if value.is_null() {
                    qb.push(" IS NULL");
                } else {
                    qb.push(" = ");
                    push_value(qb, value);
                }
            }
            Condition::IdIn(ids) => {
                qb.push("id = ANY(").push_bind(id_strings(ids)).push(")");
            }
            Condition::RelatedAny { relation, ids } => {
                let rel = def.relation(relation).ok_or_else(|| {
                    StoreError::schema(format!("{} has no relation `{relation}`", def.name))
                })?;
                match rel.kind {
                    RelationKind::BelongsTo { foreign_key } => {
                        qb.push(foreign_key)
                            .push(" = ANY(")
                            .push_bind(id_strings(ids))
                            .push(")");
                    }
                    RelationKind::HasMany { foreign_key } => {
                        qb.push("EXISTS (SELECT 1 FROM ")
                            .push(rel.target)
                            .push(" t WHERE t.id = ANY(")
                            .push_bind(id_strings(ids))
                            .push(") AND t.")
                            .push(foreign_key)
                            .push(" = ")
                            .push(def.table)
                            .push(".id)");
                    }
                }
            }
        }
    }
    Ok(())
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn decode_record(def: &EntityDef, row: &PgRow) -> Result<Record, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;
    let mut record = Record::new(EntityId::new(id));
    record.version = version.max(0) as u64;

    for field in def.fields {
        let value = match field.kind {
            FieldKind::Text => Value::from(row.try_get::<Option<String>, _>(field.name).map_err(decode_error)?),
            FieldKind::Float => Value::from(row.try_get::<Option<f64>, _>(field.name).map_err(decode_error)?),
            FieldKind::Timestamp => Value::from(
                row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(field.name)
                    .map_err(decode_error)?,
            ),
        };
        record.values.insert(field.name, value);
    }
    for relation in def.belongs_to() {
        let fk = relation.foreign_key();
        let value: Option<String> = row.try_get(fk).map_err(decode_error)?;
        record.values.insert(fk, Value::from(value));
    }
    Ok(record)
}

fn push_assignments(
    qb: &mut QueryBuilder<'_, Postgres>,
    values: &BTreeMap<&'static str, Value>,
) {
    for (column, value) in values {
        qb.push(*column).push(" = ");
        push_value(qb, value);
        qb.push(", ");
    }
    qb.push("version = version + 1");
}

fn validate_columns(
    def: &EntityDef,
    values: &BTreeMap<&'static str, Value>,
) -> Result<(), StoreError> {
    match values.keys().find(|c| !has_column(def, c)) {
        Some(column) => Err(StoreError::schema(format!("{} has no column `{column}`", def.name))),
        None => Ok(()),
    }
}

/// Run a guarded `UPDATE ... WHERE id = $ [AND version = $]` and classify a
/// zero-row outcome.
async fn guarded_update(
    tx: &mut Transaction<'static, Postgres>,
    mut qb: QueryBuilder<'_, Postgres>,
    def: &EntityDef,
    id: &EntityId,
    expected_version: Option<u64>,
) -> Result<(), StoreError> {
    qb.push(" WHERE id = ").push_bind(id.as_str().to_string());
    if let Some(v) = expected_version {
        qb.push(" AND version = ").push_bind(i64::try_from(v).unwrap_or(i64::MAX));
    }
    let affected = qb
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?
        .rows_affected();
    if affected > 0 {
        return Ok(());
    }

    let exists = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = $1", def.table))
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("version_check", e))?
        .is_some();
    Err(StoreError::Concurrency {
        entity: def.name,
        id: id.clone(),
        failure: if exists { ConcurrencyFailure::Other } else { ConcurrencyFailure::Deleted },
    })
}

async fn apply(
    tx: &mut Transaction<'static, Postgres>,
    catalog: &Catalog,
    op: WriteOp,
) -> Result<(), StoreError> {
    match op {
        WriteOp::Insert { def, id, values } => {
            validate_columns(def, &values)?;
            let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
            qb.push(def.table).push(" (id, version");
            for column in values.keys() {
                qb.push(", ").push(*column);
            }
            qb.push(") VALUES (").push_bind(id.as_str().to_string()).push(", 1");
            for value in values.values() {
                qb.push(", ");
                push_value(&mut qb, value);
            }
            qb.push(")");
            qb.build().execute(&mut **tx).await.map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate { entity: def.name, id: id.clone() }
                } else {
                    map_sqlx_error("insert", e)
                }
            })?;
        }
        WriteOp::Update { def, id, expected_version, values } => {
            validate_columns(def, &values)?;
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(def.table).push(" SET ");
            push_assignments(&mut qb, &values);
            guarded_update(tx, qb, def, &id, expected_version).await?;
        }
        WriteOp::SetRef { def, id, foreign_key, target, expected_version } => {
            let values = BTreeMap::from([(foreign_key, Value::from(target))]);
            validate_columns(def, &values)?;
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(def.table).push(" SET ");
            push_assignments(&mut qb, &values);
            guarded_update(tx, qb, def, &id, expected_version).await?;
        }
        WriteOp::Touch { def, id, expected_version } => {
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
            qb.push(def.table).push(" SET ");
            push_assignments(&mut qb, &BTreeMap::new());
            guarded_update(tx, qb, def, &id, Some(expected_version)).await?;
        }
        WriteOp::Delete { def, id } => {
            for (referencing, foreign_key) in catalog.referencing(def.table) {
                let sql = format!(
                    "UPDATE {table} SET {foreign_key} = NULL, version = version + 1 WHERE {foreign_key} = $1",
                    table = referencing.table
                );
                sqlx::query(&sql)
                    .bind(id.as_str())
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("null_references", e))?;
            }
            let affected = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", def.table))
                .bind(id.as_str())
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("delete", e))?
                .rows_affected();
            if affected == 0 {
                return Err(StoreError::Concurrency {
                    entity: def.name,
                    id,
                    failure: ConcurrencyFailure::Deleted,
                });
            }
        }
    }
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::TypeNotFound { .. } => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
