use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use tokio::task;
use uuid::Uuid;

use crate::migrations::run_migrations;

/// Named collections the engine persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Ideas,
    IdeaVersions,
    Evaluations,
    FeatureSimulations,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ideas => "ideas",
            Self::IdeaVersions => "idea_versions",
            Self::Evaluations => "evaluations",
            Self::FeatureSimulations => "feature_simulations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely-typed stored record. Typed entities are projected out of it by
/// the `records` module.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Equality filters, one ordering key and an optional limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document with a generated id. An `id` key in `data` is ignored.
    async fn create(&self, collection: Collection, data: Map<String, Value>) -> Result<Document>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    async fn list(&self, collection: Collection, query: Query) -> Result<Vec<Document>>;

    /// Shallow-merge `patch` into the stored body. Fails when the document is missing.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document>;
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: Collection, data: Map<String, Value>) -> Result<Document> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut data = data;
            data.remove("id");
            let now = Utc::now();
            let doc = Document {
                id: Uuid::new_v4().to_string(),
                data,
                created_at: now,
                updated_at: now,
            };
            let body = serde_json::to_string(&doc.data)?;
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            conn.execute(
                r#"
                INSERT INTO documents (collection, id, body, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    collection.as_str(),
                    doc.id,
                    body,
                    format_ts(&doc.created_at),
                    format_ts(&doc.updated_at),
                ],
            )?;
            Ok::<Document, anyhow::Error>(doc)
        })
        .await?
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let row = conn
                .query_row(
                    r#"
                    SELECT id, body, created_at, updated_at
                    FROM documents
                    WHERE collection = ?1 AND id = ?2
                    "#,
                    params![collection.as_str(), id],
                    read_row,
                )
                .optional()?;
            row.map(row_to_document).transpose()
        })
        .await?
    }

    async fn list(&self, collection: Collection, query: Query) -> Result<Vec<Document>> {
        let (sql, binds) = build_list_sql(collection, &query)?;
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(binds.iter()), read_row)?;
            let mut docs = Vec::new();
            for row in rows {
                docs.push(row_to_document(row?)?);
            }
            Ok::<Vec<Document>, anyhow::Error>(docs)
        })
        .await?
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let tx = conn.unchecked_transaction()?;
            let existing = tx
                .query_row(
                    r#"
                    SELECT id, body, created_at, updated_at
                    FROM documents
                    WHERE collection = ?1 AND id = ?2
                    "#,
                    params![collection.as_str(), id],
                    read_row,
                )
                .optional()?
                .ok_or_else(|| anyhow!("{collection} document not found: {id}"))?;
            let mut doc = row_to_document(existing)?;
            for (key, value) in patch {
                if key != "id" {
                    doc.data.insert(key, value);
                }
            }
            doc.updated_at = Utc::now();
            tx.execute(
                r#"
                UPDATE documents SET body = ?1, updated_at = ?2
                WHERE collection = ?3 AND id = ?4
                "#,
                params![
                    serde_json::to_string(&doc.data)?,
                    format_ts(&doc.updated_at),
                    collection.as_str(),
                    doc.id,
                ],
            )?;
            tx.commit()?;
            Ok::<Document, anyhow::Error>(doc)
        })
        .await?
    }
}

type RawRow = (String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn row_to_document((id, body, created_at, updated_at): RawRow) -> Result<Document> {
    let data = match serde_json::from_str::<Value>(&body)? {
        Value::Object(map) => map,
        other => bail!("document {id} body is not an object: {other}"),
    };
    Ok(Document {
        id,
        data,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn validate_field_name(field: &str) -> Result<()> {
    let mut chars = field.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid query field name: {field:?}");
    }
    Ok(())
}

fn field_expr(field: &str) -> Result<String> {
    validate_field_name(field)?;
    Ok(match field {
        "id" | "created_at" | "updated_at" => field.to_string(),
        _ => format!("json_extract(body, '$.{field}')"),
    })
}

fn to_sql_value(field: &str, value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => {
            bail!("filter on {field:?} must be a scalar value")
        }
    })
}

fn build_list_sql(collection: Collection, query: &Query) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = String::from(
        "SELECT id, body, created_at, updated_at FROM documents WHERE collection = ?1",
    );
    let mut binds = vec![SqlValue::Text(collection.as_str().to_string())];

    for (field, value) in &query.filters {
        binds.push(to_sql_value(field, value)?);
        sql.push_str(&format!(" AND {} IS ?{}", field_expr(field)?, binds.len()));
    }

    let (order_expr, direction) = match &query.order_by {
        Some((field, direction)) => (field_expr(field)?, *direction),
        None => ("created_at".to_string(), Direction::Asc),
    };
    let dir = match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    sql.push_str(&format!(" ORDER BY {order_expr} {dir}, seq {dir}"));

    if let Some(limit) = query.limit {
        binds.push(SqlValue::Integer(i64::try_from(limit)?));
        sql.push_str(&format!(" LIMIT ?{}", binds.len()));
    }

    Ok((sql, binds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn open_in_memory_succeeds() {
        assert!(SqliteDocumentStore::open_in_memory().is_ok());
    }

    #[tokio::test]
    async fn create_then_get_round_trips_body() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let doc = store
            .create(
                Collection::Ideas,
                obj(json!({"id": "ignored", "idea": "Invoice OCR", "n": 3})),
            )
            .await
            .unwrap();
        assert_ne!(doc.id, "ignored");
        assert!(!doc.data.contains_key("id"));

        let fetched = store.get(Collection::Ideas, &doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.data["idea"], "Invoice OCR");
        assert_eq!(fetched.data["n"], 3);
    }

    #[tokio::test]
    async fn get_is_scoped_by_collection() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let doc = store
            .create(Collection::Ideas, obj(json!({"idea": "x"})))
            .await
            .unwrap();
        assert!(store
            .get(Collection::Evaluations, &doc.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_filters_orders_and_limits() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        for n in [2, 1, 3] {
            store
                .create(
                    Collection::IdeaVersions,
                    obj(json!({"idea_id": "a", "version_number": n})),
                )
                .await
                .unwrap();
        }
        store
            .create(
                Collection::IdeaVersions,
                obj(json!({"idea_id": "b", "version_number": 9})),
            )
            .await
            .unwrap();

        let docs = store
            .list(
                Collection::IdeaVersions,
                Query::new()
                    .filter("idea_id", "a")
                    .order_by("version_number", Direction::Desc)
                    .limit(2),
            )
            .await
            .unwrap();
        let numbers: Vec<i64> = docs
            .iter()
            .map(|d| d.data["version_number"].as_i64().unwrap())
            .collect();
        assert_eq!(numbers, vec![3, 2]);
    }

    #[tokio::test]
    async fn list_filters_on_bool_and_null() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store
            .create(
                Collection::Evaluations,
                obj(json!({"is_current": true, "reports": null})),
            )
            .await
            .unwrap();
        store
            .create(
                Collection::Evaluations,
                obj(json!({"is_current": false, "reports": "{}"})),
            )
            .await
            .unwrap();

        let current = store
            .list(Collection::Evaluations, Query::new().filter("is_current", true))
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].data["is_current"], true);

        let no_reports = store
            .list(Collection::Evaluations, Query::new().filter("reports", Value::Null))
            .await
            .unwrap();
        assert_eq!(no_reports.len(), 1);
    }

    #[tokio::test]
    async fn update_merges_shallowly() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let doc = store
            .create(
                Collection::Ideas,
                obj(json!({"idea": "old", "problem": "keep", "nested": {"a": 1}})),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                Collection::Ideas,
                &doc.id,
                obj(json!({"idea": "new", "nested": {"b": 2}, "id": "nope"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.data["idea"], "new");
        assert_eq!(updated.data["problem"], "keep");
        assert_eq!(updated.data["nested"], json!({"b": 2}));
        assert!(updated.updated_at >= doc.updated_at);
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let err = store
            .update(Collection::Ideas, "missing", Map::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_rejects_unsafe_field_names() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let err = store
            .list(
                Collection::Ideas,
                Query::new().filter("idea') OR 1=1 --", "x"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid query field name"));
    }

    #[tokio::test]
    async fn list_rejects_non_scalar_filters() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        let err = store
            .list(Collection::Ideas, Query::new().filter("tags", json!(["a"])))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scalar"));
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ideagate.db");
        let path = path.to_str().unwrap();

        let id = {
            let store = SqliteDocumentStore::open(path).unwrap();
            store
                .create(Collection::Ideas, obj(json!({"idea": "durable"})))
                .await
                .unwrap()
                .id
        };

        let reopened = SqliteDocumentStore::open(path).unwrap();
        let doc = reopened.get(Collection::Ideas, &id).await.unwrap().unwrap();
        assert_eq!(doc.data["idea"], "durable");
    }
}
