//! Declarative table shapes
//!
//! Every entity table is a document table: an auto-increment integer key, a
//! JSON `doc` column, optional extra columns, and expression indexes over
//! document fields. A schema version declares the shapes of the tables it
//! creates or changes; [`SchemaSync::apply_shape`] brings the database in line.
//!
//! # What sync CAN fix
//! - Missing tables (CREATE TABLE IF NOT EXISTS)
//! - Missing columns (ALTER TABLE ADD COLUMN)
//! - Missing indexes (CREATE INDEX IF NOT EXISTS)
//!
//! # What sync CANNOT fix (needs an upgrade transform)
//! - Type or constraint changes
//! - Column removal
//!
//! # Usage
//!
//! ```rust,ignore
//! let shape = TableShape::documents("match_profiles")
//!     .column(ColumnDefinition::new("thumbnail", "BLOB"))
//!     .index(IndexDefinition::on_field("name"));
//! SchemaSync::apply_shape(&mut conn, &shape).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL", "BLOB")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    fn create_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// Expression index over a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub field: String,
}

impl IndexDefinition {
    pub fn on_field(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    fn index_name(&self, table: &str) -> String {
        format!("idx_{}_{}", table, self.field)
    }
}

/// Declared shape of one document table
#[derive(Debug, Clone, PartialEq)]
pub struct TableShape {
    pub name: &'static str,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableShape {
    /// Document table with `id` key and `doc` JSON column
    pub fn documents(name: &'static str) -> Self {
        Self {
            name,
            columns: vec![
                ColumnDefinition::new("id", "INTEGER").primary_key(),
                ColumnDefinition::new("doc", "TEXT").not_null().default("'{}'"),
            ],
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    /// Column name
    pub name: String,
    /// SQL type from PRAGMA table_info
    pub type_name: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY flag
    pub pk: bool,
}

/// Schema drift detected between declared and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (cannot auto-fix)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
}

/// Schema introspection via PRAGMA table_info
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns, ordered by cid
    pub async fn introspect_table(
        conn: &mut SqliteConnection,
        table_name: &str,
    ) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);
        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(conn: &mut SqliteConnection, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }
}

/// Compare declared columns to actual database columns
pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            match actual.iter().find(|c| c.name == expected_col.name) {
                Some(actual_col) => {
                    if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                        drift.push(SchemaDrift::TypeMismatch {
                            table: table_name.to_string(),
                            column: expected_col.name.clone(),
                            expected: expected_col.sql_type.clone(),
                            actual: actual_col.type_name.clone(),
                        });
                    }
                }
                None => drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                }),
            }
        }

        drift
    }

    /// SQLite type affinity comparison
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let affinity = |t: &str| {
            if t.contains("INT") {
                "INTEGER"
            } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
                "TEXT"
            } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
                "REAL"
            } else if t.is_empty() || t.contains("BLOB") {
                "BLOB"
            } else {
                "NUMERIC"
            }
        };

        affinity(&exp) == affinity(&act)
    }
}

/// Applies declared shapes to the database
pub struct SchemaSync;

impl SchemaSync {
    /// Create the table if missing, add missing columns, create missing indexes
    pub async fn apply_shape(conn: &mut SqliteConnection, shape: &TableShape) -> Result<()> {
        if !SchemaIntrospector::table_exists(conn, shape.name).await? {
            let columns: Vec<String> = shape.columns.iter().map(|c| c.create_sql()).collect();
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                shape.name,
                columns.join(", ")
            );
            sqlx::query(&sql).execute(&mut *conn).await?;
            info!("  ✓ Created table '{}'", shape.name);
        } else {
            let actual = SchemaIntrospector::introspect_table(conn, shape.name).await?;
            for change in SchemaDiff::compare(shape.name, &shape.columns, &actual) {
                match change {
                    SchemaDrift::MissingColumn { table, column } => {
                        Self::add_column(conn, &table, &column).await?;
                    }
                    SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                        warn!(
                            "  ⚠ Type mismatch in {}.{}: expected '{}', found '{}'. Upgrade transform required.",
                            table, column, expected, actual
                        );
                    }
                }
            }
        }

        for index in &shape.indexes {
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}(json_extract(doc, '$.{}'))",
                index.index_name(shape.name),
                shape.name,
                index.field
            );
            sqlx::query(&sql).execute(&mut *conn).await?;
            debug!("  index {} ensured", index.index_name(shape.name));
        }

        Ok(())
    }

    /// Add missing column via ALTER TABLE ADD COLUMN
    async fn add_column(
        conn: &mut SqliteConnection,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column.name, column.sql_type
        );

        // SQLite ALTER TABLE ADD COLUMN limitations:
        // - PRIMARY KEY: not supported
        // - NOT NULL: only with a DEFAULT
        if column.primary_key {
            warn!(
                "  ⚠ Cannot add PRIMARY KEY column {}.{} via ALTER TABLE",
                table, column.name
            );
        }

        if column.not_null {
            if let Some(default) = &column.default_value {
                sql.push_str(&format!(" NOT NULL DEFAULT {}", default));
            } else {
                warn!(
                    "  ⚠ Cannot add NOT NULL column {}.{} without DEFAULT value. Column will be nullable.",
                    table, column.name
                );
            }
        } else if let Some(default) = &column.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        match sqlx::query(&sql).execute(&mut *conn).await {
            Ok(_) => {
                info!("  ✓ Added column: {}.{} ({})", table, column.name, column.sql_type);
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("  {}.{} already present - skipping", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
