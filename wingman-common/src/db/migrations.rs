//! Versioned schema migrations
//!
//! A store's schema is described by an ordered chain of [`SchemaVersion`]
//! descriptors `v1..vN`. Each descriptor declares the table shapes it creates
//! or changes and, optionally, a one-time [`Upgrade`] transform over existing
//! documents.
//!
//! - The applied version is tracked in the `schema_version` table.
//! - Every pending version runs in its own transaction together with the
//!   insert of its `schema_version` row: an interrupted version leaves no trace
//!   and is re-run in full on the next open.
//! - Transforms are idempotent: they check "already has field X" instead of
//!   overwriting, so re-running against partially migrated data is safe.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing versions** - users upgrade from any older release
//! 2. **Always add a new version** for a schema or data change
//! 3. **Guard every write** with a presence check
//! 4. **Stay inside the store** - transforms are synchronous functions over the
//!    loaded documents and cannot reach the network
//!
//! # Example
//!
//! ```rust,ignore
//! fn default_phase(ctx: &mut UpgradeContext) -> Result<()> {
//!     ctx.table("match_profiles")?.modify(|_, doc| {
//!         if doc.get("analysis_phase").is_none() {
//!             doc["analysis_phase"] = json!("complete");
//!         }
//!     });
//!     Ok(())
//! }
//!
//! SchemaVersion::new(3).upgrade("default analysis phase", &["match_profiles"], default_phase)
//! ```

use crate::db::schema_sync::{SchemaIntrospector, SchemaSync, TableShape};
use crate::{Error, Result};
use serde_json::Value;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Signature of an upgrade transform
pub type UpgradeFn = fn(&mut UpgradeContext) -> Result<()>;

/// One-time data transform attached to a schema version
#[derive(Clone)]
pub struct Upgrade {
    pub description: &'static str,
    /// Tables whose rows are loaded into the context
    pub touches: &'static [&'static str],
    pub apply: UpgradeFn,
}

impl std::fmt::Debug for Upgrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgrade")
            .field("description", &self.description)
            .field("touches", &self.touches)
            .finish()
    }
}

/// Descriptor of one schema version
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    pub version: u32,
    pub tables: Vec<TableShape>,
    pub upgrade: Option<Upgrade>,
}

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            tables: Vec::new(),
            upgrade: None,
        }
    }

    pub fn table(mut self, shape: TableShape) -> Self {
        self.tables.push(shape);
        self
    }

    pub fn upgrade(
        mut self,
        description: &'static str,
        touches: &'static [&'static str],
        apply: UpgradeFn,
    ) -> Self {
        self.upgrade = Some(Upgrade {
            description,
            touches,
            apply,
        });
        self
    }
}

/// A document row loaded for an upgrade
#[derive(Debug, Clone)]
struct CursorRow {
    id: i64,
    doc: Value,
    dirty: bool,
}

/// Mutable cursor over a table's existing documents
///
/// Only rows whose document actually changed are written back.
#[derive(Debug, Clone, Default)]
pub struct TableCursor {
    rows: Vec<CursorRow>,
}

impl TableCursor {
    /// Number of rows loaded
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Document with key `id`
    pub fn get(&self, id: i64) -> Option<&Value> {
        self.rows.iter().find(|r| r.id == id).map(|r| &r.doc)
    }

    /// Iterate `(id, doc)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Value)> {
        self.rows.iter().map(|r| (r.id, &r.doc))
    }

    /// Visit every document; returns how many changed
    pub fn modify<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(i64, &mut Value),
    {
        let mut changed = 0;
        for row in self.rows.iter_mut() {
            let before = row.doc.clone();
            f(row.id, &mut row.doc);
            if row.doc != before {
                row.dirty = true;
                changed += 1;
            }
        }
        changed
    }
}

/// Tables handed to an upgrade transform
#[derive(Debug, Default)]
pub struct UpgradeContext {
    version: u32,
    tables: HashMap<&'static str, TableCursor>,
}

impl UpgradeContext {
    /// Version being applied
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Cursor for a table listed in the upgrade's `touches`
    pub fn table(&mut self, name: &str) -> Result<&mut TableCursor> {
        let version = self.version;
        self.tables.get_mut(name).ok_or_else(|| Error::Migration {
            version,
            message: format!("table '{}' not declared in touches", name),
        })
    }
}

/// Applies version descriptors to a store
pub struct SchemaMigrator;

impl SchemaMigrator {
    /// Reject lists that are not exactly `1..=N` in ascending order
    pub fn validate_chain(descriptors: &[SchemaVersion]) -> Result<u32> {
        if descriptors.is_empty() {
            return Err(Error::SchemaChain("no schema versions declared".to_string()));
        }
        for (position, descriptor) in descriptors.iter().enumerate() {
            let expected = position as u32 + 1;
            if descriptor.version != expected {
                return Err(Error::SchemaChain(format!(
                    "expected v{} at position {}, found v{}",
                    expected, position, descriptor.version
                )));
            }
        }
        Ok(descriptors.len() as u32)
    }

    /// Bring the store up to the highest declared version
    ///
    /// Returns the recorded version after migration.
    pub async fn migrate(pool: &SqlitePool, descriptors: &[SchemaVersion]) -> Result<u32> {
        let target = Self::validate_chain(descriptors)?;

        let mut conn = pool.acquire().await?;
        create_schema_version_table(&mut conn).await?;
        let current = get_schema_version(&mut conn).await?;
        drop(conn);

        if current == target {
            info!("Store schema is up to date (v{})", current);
            return Ok(current);
        }

        if current > target {
            warn!(
                "Store schema version ({}) is newer than code version ({})",
                current, target
            );
            warn!("This may indicate a downgrade. Proceeding without migrating.");
            return Ok(current);
        }

        info!("Running store migrations: v{} -> v{}", current, target);

        for descriptor in descriptors.iter().filter(|d| d.version > current) {
            Self::apply_version(pool, descriptor).await?;
            info!("✓ Migration v{} completed", descriptor.version);
        }

        info!("All migrations completed successfully");
        Ok(target)
    }

    async fn apply_version(pool: &SqlitePool, descriptor: &SchemaVersion) -> Result<()> {
        let version = descriptor.version;
        info!("Running migration v{}", version);

        let mut tx = pool.begin().await?;

        for shape in &descriptor.tables {
            SchemaSync::apply_shape(&mut *tx, shape).await?;
        }

        if let Some(upgrade) = &descriptor.upgrade {
            info!("  upgrade: {}", upgrade.description);

            let mut ctx = UpgradeContext {
                version,
                tables: HashMap::new(),
            };
            for table in upgrade.touches {
                let cursor = load_cursor(&mut *tx, table).await?;
                debug!("  loaded {} rows from {}", cursor.len(), table);
                ctx.tables.insert(*table, cursor);
            }

            (upgrade.apply)(&mut ctx).map_err(|e| match e {
                Error::Migration { .. } => e,
                other => Error::Migration {
                    version,
                    message: other.to_string(),
                },
            })?;

            for (table, cursor) in &ctx.tables {
                let written = store_cursor(&mut *tx, table, cursor).await?;
                if written > 0 {
                    info!("  ✓ Rewrote {} rows in {}", written, table);
                }
            }
        }

        set_schema_version(&mut *tx, version).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn create_schema_version_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Get current schema version from the store
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(conn: &mut SqliteConnection) -> Result<u32> {
    if !SchemaIntrospector::table_exists(conn, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    Ok(version.unwrap_or(0) as u32)
}

async fn set_schema_version(conn: &mut SqliteConnection, version: u32) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO schema_version (version) VALUES (?)")
        .bind(version as i64)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn load_cursor(conn: &mut SqliteConnection, table: &str) -> Result<TableCursor> {
    if !SchemaIntrospector::table_exists(conn, table).await? {
        return Ok(TableCursor::default());
    }

    let rows = sqlx::query(&format!("SELECT id, doc FROM {} ORDER BY id", table))
        .fetch_all(&mut *conn)
        .await?;

    let mut cursor = TableCursor::default();
    for row in rows {
        let id: i64 = row.get("id");
        let raw: String = row.get("doc");
        let doc = serde_json::from_str(&raw)?;
        cursor.rows.push(CursorRow {
            id,
            doc,
            dirty: false,
        });
    }
    Ok(cursor)
}

async fn store_cursor(conn: &mut SqliteConnection, table: &str, cursor: &TableCursor) -> Result<usize> {
    let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", table);
    let mut written = 0;
    for row in cursor.rows.iter().filter(|r| r.dirty) {
        sqlx::query(&sql)
            .bind(serde_json::to_string(&row.doc)?)
            .bind(row.id)
            .execute(&mut *conn)
            .await?;
        written += 1;
    }
    Ok(written)
}
