//! PostgreSQL document store.
//!
//! All collections share the `documents` table (see `migrations/`): one row
//! per document, fields in a JSONB `body`. Uniqueness constraints become
//! partial unique expression indexes named `uq_<collection>__<field>[__<field>]`
//! so that a violation can be mapped back to the offending fields.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tourdesk_core::document::{CREATED_AT_FIELD, Document, DocumentId, ID_FIELD, VERSION_FIELD};
use tourdesk_core::query::{FilterOp, Predicate, QueryDescriptor, SortDirection};
use tourdesk_core::schema::ResourceSchema;
use tourdesk_core::store::{Aggregate, DocumentStore, StoreError, StoreResult};
use tracing::debug;
use uuid::Uuid;

const COLUMNS: &str = "id, body, version, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn index_name(collection: &str, fields: &[&str]) -> String {
    format!("uq_{}__{}", collection, fields.join("__"))
}

fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Maps a unique violation on one of our indexes back to a duplicate error.
fn map_write_error(err: sqlx::Error, collection: &str, body: &Map<String, Value>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let prefix = format!("uq_{collection}__");
            if let Some(fields) = db_err.constraint().and_then(|c| c.strip_prefix(&prefix)) {
                let fields: Vec<&str> = fields.split("__").collect();
                return StoreError::duplicate(&fields, body);
            }
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context("document write failed"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Stored fields with `patch` merged over them, as `body || patch` would.
fn post_image(current: Option<Document>, patch: Map<String, Value>) -> Map<String, Value> {
    let mut merged = current.map(|doc| doc.fields).unwrap_or_default();
    merged.extend(patch);
    merged
}

fn backend(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| StoreError::Backend(anyhow::Error::new(err).context(context))
}

fn document_from_row(row: &PgRow) -> StoreResult<Document> {
    let decode = || -> Result<Document, sqlx::Error> {
        let id: Uuid = row.try_get("id")?;
        let Json(body): Json<Value> = row.try_get("body")?;
        let version: i64 = row.try_get("version")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(Document {
            id: DocumentId::from_uuid(id),
            created_at,
            version,
            fields: match body {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        })
    };
    decode().map_err(backend("failed to decode document row"))
}

/// Pushes a JSONB expression for `field`, resolving the pseudo-fields to
/// their columns so that every comparison happens in JSONB space.
fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    match field {
        ID_FIELD => {
            qb.push("to_jsonb(id::text)");
        }
        VERSION_FIELD => {
            qb.push("to_jsonb(version)");
        }
        CREATED_AT_FIELD => {
            qb.push(
                r#"to_jsonb(to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"'))"#,
            );
        }
        other => {
            qb.push("(body -> ").push_bind(other.to_string()).push(")");
        }
    }
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    let value = Json(predicate.value.clone());
    match predicate.op {
        FilterOp::Eq => {
            push_field(qb, &predicate.field);
            qb.push(" = ").push_bind(value).push("::jsonb");
        }
        FilterOp::In => {
            qb.push("(").push_bind(value).push("::jsonb @> jsonb_build_array(");
            push_field(qb, &predicate.field);
            qb.push("))");
        }
        op => {
            let symbol = match op {
                FilterOp::Gte => ">=",
                FilterOp::Gt => ">",
                FilterOp::Lte => "<=",
                _ => "<",
            };
            // numbers compare numerically, strings bytewise, anything else never matches
            match &predicate.value {
                Value::Number(_) => {
                    qb.push("(CASE WHEN jsonb_typeof(");
                    push_field(qb, &predicate.field);
                    qb.push(") = 'number' THEN (");
                    push_field(qb, &predicate.field);
                    qb.push(")::numeric ")
                        .push(symbol)
                        .push(" (")
                        .push_bind(value)
                        .push("::jsonb)::numeric ELSE false END)");
                }
                Value::String(s) => {
                    qb.push("(CASE WHEN jsonb_typeof(");
                    push_field(qb, &predicate.field);
                    qb.push(") = 'string' THEN (");
                    push_field(qb, &predicate.field);
                    qb.push(" #>> '{}') COLLATE \"C\" ")
                        .push(symbol)
                        .push(" ")
                        .push_bind(s.clone())
                        .push(" COLLATE \"C\" ELSE false END)");
                }
                _ => {
                    qb.push("false");
                }
            }
        }
    }
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &[Predicate]) {
    qb.push(" WHERE collection = ").push_bind(collection.to_string());
    for predicate in filter {
        qb.push(" AND ");
        push_predicate(qb, predicate);
    }
}

/// Orders by type rank first (null < bool < number < string < array <
/// object), then by value within the type.
fn push_order(qb: &mut QueryBuilder<'_, Postgres>, query: &QueryDescriptor) {
    qb.push(" ORDER BY ");
    for key in &query.sort {
        let direction = match key.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        };

        qb.push("CASE COALESCE(jsonb_typeof(");
        push_field(qb, &key.field);
        qb.push("), 'missing') WHEN 'missing' THEN -1 WHEN 'null' THEN 0 WHEN 'boolean' THEN 1 \
                 WHEN 'number' THEN 2 WHEN 'string' THEN 3 WHEN 'array' THEN 4 ELSE 5 END")
            .push(direction)
            .push(", CASE WHEN jsonb_typeof(");
        push_field(qb, &key.field);
        qb.push(") = 'number' THEN (");
        push_field(qb, &key.field);
        qb.push(")::numeric END")
            .push(direction)
            .push(", CASE WHEN jsonb_typeof(");
        push_field(qb, &key.field);
        qb.push(") = 'string' THEN (");
        push_field(qb, &key.field);
        qb.push(" #>> '{}') END COLLATE \"C\"")
            .push(direction)
            .push(", ");
        push_field(qb, &key.field);
        qb.push(direction).push(", ");
    }
    qb.push("seq ASC");
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn register(&self, schema: &ResourceSchema) -> StoreResult<()> {
        for constraint in schema.unique_constraints() {
            let expressions = constraint
                .iter()
                .map(|f| format!("(body ->> {})", quote_literal(f)))
                .collect::<Vec<_>>()
                .join(", ");
            let ddl = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ({}) WHERE collection = {}",
                index_name(schema.name, &constraint),
                expressions,
                quote_literal(schema.name)
            );
            debug!(collection = schema.name, fields = ?constraint, "ensuring unique index");
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(backend("failed to create unique index"))?;
        }
        Ok(())
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Document> {
        let row = sqlx::query(&format!(
            "INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(collection)
        .bind(Json(Value::Object(fields.clone())))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, collection, &fields))?;

        document_from_row(&row)
    }

    async fn find(&self, collection: &str, query: &QueryDescriptor) -> StoreResult<Vec<Document>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM documents"));
        push_where(&mut qb, collection, &query.filter);
        push_order(&mut qb, query);
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        qb.push(" OFFSET ")
            .push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(backend("failed to query documents"))?;
        rows.iter().map(document_from_row).collect()
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend("failed to fetch document"))?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "UPDATE documents SET body = body || $3, version = version + 1 \
             WHERE collection = $1 AND id = $2 RETURNING {COLUMNS}"
        ))
        .bind(collection)
        .bind(*id.as_uuid())
        .bind(Json(Value::Object(patch.clone())))
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                // A compound constraint may be broken by a patch that only
                // names some of its fields; report the would-be document.
                let current = self.find_by_id(collection, id).await?;
                return Err(map_write_error(err, collection, &post_image(current, patch)));
            }
            Err(err) => return Err(map_write_error(err, collection, &patch)),
        };

        row.as_ref().map(document_from_row).transpose()
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING {COLUMNS}"
        ))
        .bind(collection)
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend("failed to delete document"))?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(backend("failed to delete documents"))?;
        Ok(result.rows_affected())
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: &[Predicate],
        field: &str,
    ) -> StoreResult<Aggregate> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count, AVG(CASE WHEN jsonb_typeof(");
        push_field(&mut qb, field);
        qb.push(") = 'number' THEN (");
        push_field(&mut qb, field);
        qb.push(")::numeric END)::float8 AS mean FROM documents");
        push_where(&mut qb, collection, filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(backend("failed to aggregate documents"))?;

        let count: i64 = row
            .try_get("count")
            .context("failed to decode aggregate count")?;
        let mean: Option<f64> = row
            .try_get("mean")
            .context("failed to decode aggregate mean")?;

        Ok(Aggregate {
            count: count.max(0) as u64,
            mean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tourdesk_core::query::SortKey;
    use tourdesk_core::schema::{FieldSpec, FieldType};

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn tour_schema() -> ResourceSchema {
        ResourceSchema::new("tours")
            .field(FieldSpec::new("name", FieldType::String).unique())
            .field(FieldSpec::new("price", FieldType::Number))
    }

    #[test]
    fn test_index_name_encodes_fields() {
        assert_eq!(index_name("reviews", &["tour", "user"]), "uq_reviews__tour__user");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_find_sql_binds_field_names() {
        let query = QueryDescriptor {
            filter: vec![Predicate::new("price", FilterOp::Lte, json!(500))],
            sort: vec![SortKey::desc("price")],
            ..QueryDescriptor::unbounded(Vec::new())
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM documents");
        push_where(&mut qb, "tours", &query.filter);
        push_order(&mut qb, &query);
        let sql = qb.sql();

        assert!(sql.contains("WHERE collection = $1"));
        assert!(sql.contains("(body -> $2)"));
        assert!(!sql.contains("price"));
        assert!(sql.ends_with("seq ASC"));
    }

    #[test]
    fn test_post_image_merges_patch_over_stored_fields() {
        let current = Document {
            id: DocumentId::new(),
            created_at: Utc::now(),
            version: 0,
            fields: fields(json!({ "tour": "t1", "user": "u1", "rating": 4 })),
        };
        let merged = post_image(Some(current), fields(json!({ "user": "u2" })));
        assert_eq!(merged, fields(json!({ "tour": "t1", "user": "u2", "rating": 4 })));

        let err = StoreError::duplicate(&["tour", "user"], &merged);
        assert!(err.to_string().contains("(t1, u2)"), "{err}");
        assert_eq!(post_image(None, fields(json!({ "a": 1 }))), fields(json!({ "a": 1 })));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_partial_patch_duplicate_reports_merged_fields(pool: PgPool) {
        let store = PgStore::new(pool);
        store
            .register(&ResourceSchema::new("reviews").unique_together(&["tour", "user"]))
            .await
            .unwrap();
        store
            .create("reviews", fields(json!({ "tour": "t1", "user": "u1" })))
            .await
            .unwrap();
        let other = store
            .create("reviews", fields(json!({ "tour": "t1", "user": "u2" })))
            .await
            .unwrap();

        let err = store
            .update_by_id("reviews", other.id, fields(json!({ "user": "u1" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert!(err.to_string().contains("(t1, u1)"), "{err}");
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_create_find_and_uniqueness(pool: PgPool) {
        let store = PgStore::new(pool);
        store.register(&tour_schema()).await.unwrap();

        for (name, price) in [("The Forest Hiker", 397), ("The Sea Explorer", 497)] {
            store
                .create("tours", fields(json!({ "name": name, "price": price })))
                .await
                .unwrap();
        }

        let err = store
            .create("tours", fields(json!({ "name": "The Forest Hiker", "price": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let query = QueryDescriptor {
            filter: vec![Predicate::new("price", FilterOp::Gt, json!(400))],
            sort: vec![SortKey::asc("price")],
            ..QueryDescriptor::unbounded(Vec::new())
        };
        let found = store.find("tours", &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["name"], json!("The Sea Explorer"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_update_delete_and_aggregate(pool: PgPool) {
        let store = PgStore::new(pool);
        let tour = DocumentId::new().to_value();
        let a = store
            .create("reviews", fields(json!({ "rating": 5, "tour": tour })))
            .await
            .unwrap();
        store
            .create("reviews", fields(json!({ "rating": 3, "tour": tour })))
            .await
            .unwrap();

        let agg = store
            .aggregate("reviews", &[Predicate::eq("tour", tour.clone())], "rating")
            .await
            .unwrap();
        assert_eq!(agg.count, 2);
        assert_eq!(agg.mean, Some(4.0));

        let updated = store
            .update_by_id("reviews", a.id, fields(json!({ "rating": 4 })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 1);

        assert!(store.delete_by_id("reviews", a.id).await.unwrap().is_some());
        assert!(store.delete_by_id("reviews", a.id).await.unwrap().is_none());
    }
}
