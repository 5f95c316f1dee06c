//! Store initialization
//!
//! Opens (or creates) the SQLite file backing the artifact store and brings
//! it up to the latest schema version before anything else touches it.

use crate::db::migrations::{SchemaMigrator, SchemaVersion};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
///
/// Foreign keys stay off: sessions and audit rows reference profiles by id
/// without ownership.
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open the store at `db_path` and migrate it through `descriptors`
///
/// Returns the pool and the schema version recorded after migration.
pub async fn open_database(
    db_path: &Path,
    descriptors: &[SchemaVersion],
) -> Result<(SqlitePool, u32)> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(false)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new store: {}", db_path.display());
    } else {
        info!("Opened existing store: {}", db_path.display());
    }

    let version = SchemaMigrator::migrate(&pool, descriptors).await?;
    Ok((pool, version))
}

/// Open a private in-memory store
///
/// A single connection that never expires; a second connection would see a
/// different empty database.
pub async fn open_in_memory(descriptors: &[SchemaVersion]) -> Result<(SqlitePool, u32)> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(false)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    let version = SchemaMigrator::migrate(&pool, descriptors).await?;
    Ok((pool, version))
}
