//! Typed access to the migrated document tables
//!
//! [`ArtifactStore`] is the only way to obtain a connection to the store, and
//! it is only constructed after [`SchemaMigrator`] has brought the file up to
//! the target version. Every record lives in a JSON `doc` column; updates are
//! shallow merges expressed as a single `json_set` statement so concurrent
//! writers never overwrite fields they did not touch.
//!
//! [`SchemaMigrator`]: crate::db::SchemaMigrator

mod coaching;
mod identity;
mod inference_records;
mod match_profiles;
mod session_guard;

pub use identity::{IdentityRepository, VIRTUE_PROFILE_GUARD};
pub use session_guard::SessionGuard;

use crate::db::{open_database, open_in_memory, schema_versions, SchemaVersion};
use crate::events::{EventBus, StoreEvent};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::debug;

/// Handle to an opened, fully migrated store
///
/// Cheap to clone; clones share the pool and the event bus.
#[derive(Clone)]
pub struct ArtifactStore {
    pool: SqlitePool,
    events: EventBus,
    schema_version: u32,
}

impl ArtifactStore {
    /// Open (creating if absent) the store file and migrate it to the latest version
    pub async fn open(db_path: &Path) -> Result<Self> {
        Self::open_with(db_path, &schema_versions()).await
    }

    /// Open the store file with an explicit version chain
    pub async fn open_with(db_path: &Path, descriptors: &[SchemaVersion]) -> Result<Self> {
        let (pool, schema_version) = open_database(db_path, descriptors).await?;
        Ok(Self::from_migrated(pool, schema_version))
    }

    /// Private in-memory store at the latest version
    pub async fn open_in_memory() -> Result<Self> {
        let (pool, schema_version) = open_in_memory(&schema_versions()).await?;
        Ok(Self::from_migrated(pool, schema_version))
    }

    fn from_migrated(pool: SqlitePool, schema_version: u32) -> Self {
        Self {
            pool,
            events: EventBus::default(),
            schema_version,
        }
    }

    /// Underlying pool, for diagnostics and tests
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bus carrying a [`StoreEvent`] for every write
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Schema version recorded when the store was opened
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Repository for the singleton identity row
    pub fn identity(&self) -> IdentityRepository {
        IdentityRepository::new(self.clone())
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        debug!(event = event.event_type(), "store event");
        self.events.emit_lossy(event);
    }

    pub(crate) async fn insert_doc(&self, table: &str, doc: &Value) -> Result<i64> {
        let result = sqlx::query(&format!("INSERT INTO {} (doc) VALUES (?)", table))
            .bind(serde_json::to_string(doc)?)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub(crate) async fn fetch_doc(&self, table: &str, id: i64) -> Result<Option<String>> {
        let doc: Option<String> =
            sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = ?", table))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc)
    }
}

/// Serialize a record into its stored document object
pub(crate) fn to_document<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Internal(format!(
            "record serialized to non-object document: {}",
            other
        ))),
    }
}

/// Decode a stored document, naming the row on failure
pub(crate) fn decode<T: DeserializeOwned>(table: &str, id: i64, doc: &str) -> Result<T> {
    serde_json::from_str(doc).map_err(|e| {
        Error::Internal(format!("corrupt document {}#{}: {}", table, id, e))
    })
}

/// Overwrite the given top-level fields of one document
///
/// Fields absent from `fields` are left untouched. Returns the number of rows
/// changed (0 when `id` does not exist).
pub(crate) async fn merge_fields(
    conn: &mut SqliteConnection,
    table: &str,
    id: i64,
    fields: &Map<String, Value>,
) -> Result<u64> {
    if fields.is_empty() {
        let exists: Option<i64> =
            sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ?", table))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        return Ok(exists.map_or(0, |_| 1));
    }

    let pairs = vec!["?, json(?)"; fields.len()].join(", ");
    let sql = format!(
        "UPDATE {} SET doc = json_set(doc, {}) WHERE id = ?",
        table, pairs
    );

    let mut query = sqlx::query(&sql);
    for (key, value) in fields {
        query = query
            .bind(format!("$.\"{}\"", key))
            .bind(serde_json::to_string(value)?);
    }
    let result = query.bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
