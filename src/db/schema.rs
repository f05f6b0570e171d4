//! Schema introspection.
//!
//! Every lookup runs against MySQL `information_schema` for the session's
//! active database (`DATABASE()`), under the configured query deadline.
//! Nothing is cached: each call sees the schema as it is now.

use crate::db::deadline::with_deadline;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ColumnDescriptor, ForeignKeyRef, TableName};
use crate::models::schema::parse_nullable;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Default deadline for metadata queries.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Schema inspector for one session connection.
#[derive(Debug, Clone, Copy)]
pub struct SchemaInspector {
    query_timeout: Duration,
}

impl Default for SchemaInspector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }
}

impl SchemaInspector {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// List all tables of the active database, in engine order.
    pub async fn list_tables(&self, pool: &MySqlPool) -> GatewayResult<Vec<String>> {
        let rows = with_deadline(
            "list tables",
            self.query_timeout,
            sqlx::query(queries::LIST_TABLES).fetch_all(pool),
        )
        .await
        .map_err(|e| e.context("Error querying tables"))?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| get_string(row, "TABLE_NAME"))
            .filter(|name| !name.is_empty())
            .collect();

        debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Describe the columns of a table in ordinal order.
    ///
    /// The name is only ever bound as a parameter, so any table the engine
    /// lists can be described. An unknown table yields no columns.
    ///
    /// The key-usage join yields one row per constraint a column takes part
    /// in; those rows are merged so each column appears once.
    pub async fn describe_table(
        &self,
        pool: &MySqlPool,
        table: &str,
    ) -> GatewayResult<Vec<ColumnDescriptor>> {
        let rows = with_deadline(
            "describe table",
            self.query_timeout,
            sqlx::query(queries::DESCRIBE_COLUMNS)
                .bind(table)
                .fetch_all(pool),
        )
        .await
        .map_err(|e| e.context("Error querying table structure"))?;

        let columns = merge_column_rows(rows.iter().map(column_row));
        debug!(table = %table, columns = columns.len(), "Described table");
        Ok(columns)
    }

    /// Resolve the primary-key column of a table.
    ///
    /// For a composite key the first column in ordinal order is returned.
    pub async fn primary_key_of(&self, pool: &MySqlPool, table: &TableName) -> GatewayResult<String> {
        let row = with_deadline(
            "primary key lookup",
            self.query_timeout,
            sqlx::query(queries::PRIMARY_KEY)
                .bind(table.as_str())
                .fetch_optional(pool),
        )
        .await
        .map_err(|e| e.context("Error obtaining primary key"))?;

        match row.map(|r| get_string(&r, "COLUMN_NAME")) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(GatewayError::not_found(format!(
                "No primary key found for table '{}'",
                table
            ))),
        }
    }

    /// Names of every column of a table. An unknown table is `NotFound`.
    pub async fn column_names(&self, pool: &MySqlPool, table: &TableName) -> GatewayResult<Vec<String>> {
        let rows = with_deadline(
            "column lookup",
            self.query_timeout,
            sqlx::query(queries::COLUMN_NAMES)
                .bind(table.as_str())
                .fetch_all(pool),
        )
        .await
        .map_err(|e| e.context("Error querying table structure"))?;

        let names: Vec<String> = rows.iter().map(|row| get_string(row, "COLUMN_NAME")).collect();
        if names.is_empty() {
            return Err(GatewayError::not_found(format!(
                "Table '{}' not found",
                table
            )));
        }
        Ok(names)
    }
}

mod queries {
    pub const LIST_TABLES: &str = r#"
        SELECT CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(c.COLUMN_NAME USING utf8mb4) AS COLUMN_NAME,
            CONVERT(c.DATA_TYPE USING utf8mb4) AS DATA_TYPE,
            CONVERT(c.IS_NULLABLE USING utf8mb4) AS IS_NULLABLE,
            CONVERT(c.COLUMN_DEFAULT USING utf8mb4) AS COLUMN_DEFAULT,
            CAST(IF(k.CONSTRAINT_NAME = 'PRIMARY', 1, 0) AS SIGNED) AS IS_PRIMARY_KEY,
            CONVERT(k.REFERENCED_TABLE_NAME USING utf8mb4) AS REFERENCED_TABLE_NAME,
            CONVERT(k.REFERENCED_COLUMN_NAME USING utf8mb4) AS REFERENCED_COLUMN_NAME
        FROM information_schema.COLUMNS c
        LEFT JOIN information_schema.KEY_COLUMN_USAGE k
            ON c.TABLE_SCHEMA = k.TABLE_SCHEMA
            AND c.TABLE_NAME = k.TABLE_NAME
            AND c.COLUMN_NAME = k.COLUMN_NAME
        WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ?
        ORDER BY c.ORDINAL_POSITION
        "#;

    pub const PRIMARY_KEY: &str = r#"
        SELECT CONVERT(COLUMN_NAME USING utf8mb4) AS COLUMN_NAME
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE()
        AND TABLE_NAME = ?
        AND CONSTRAINT_NAME = 'PRIMARY'
        ORDER BY ORDINAL_POSITION
        LIMIT 1
        "#;

    pub const COLUMN_NAMES: &str = r#"
        SELECT CONVERT(COLUMN_NAME USING utf8mb4) AS COLUMN_NAME
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#;
}

/// One row of the column/key-usage join, before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnRow {
    name: String,
    data_type: String,
    nullable: bool,
    default_value: Option<String>,
    is_primary_key: bool,
    references: Option<ForeignKeyRef>,
}

fn column_row(row: &MySqlRow) -> ColumnRow {
    let references = match (
        get_optional_string(row, "REFERENCED_TABLE_NAME"),
        get_optional_string(row, "REFERENCED_COLUMN_NAME"),
    ) {
        (Some(table), Some(column)) => Some(ForeignKeyRef::new(table, column)),
        _ => None,
    };

    ColumnRow {
        name: get_string(row, "COLUMN_NAME"),
        data_type: get_string(row, "DATA_TYPE"),
        nullable: parse_nullable(&get_string(row, "IS_NULLABLE")),
        default_value: get_optional_string(row, "COLUMN_DEFAULT"),
        is_primary_key: get_flag(row, "IS_PRIMARY_KEY"),
        references,
    }
}

/// Fold join rows into one descriptor per column, keeping first-seen order.
fn merge_column_rows<I>(rows: I) -> Vec<ColumnDescriptor>
where
    I: IntoIterator<Item = ColumnRow>,
{
    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if let Some(&idx) = positions.get(&row.name) {
            let existing = &mut columns[idx];
            existing.is_primary_key |= row.is_primary_key;
            if existing.foreign_key.is_none() {
                if let Some(reference) = row.references {
                    *existing = existing.clone().with_foreign_key(reference);
                }
            }
            continue;
        }

        let mut col = ColumnDescriptor::new(&row.name, row.data_type, row.nullable)
            .with_primary_key(row.is_primary_key);
        if let Some(default_value) = row.default_value {
            col = col.with_default(default_value);
        }
        if let Some(reference) = row.references {
            col = col.with_foreign_key(reference);
        }

        positions.insert(row.name, columns.len());
        columns.push(col);
    }
    columns
}

/// Get a string from a row; metadata may arrive as VARBINARY.
fn get_string(row: &MySqlRow, column: &str) -> String {
    get_optional_string(row, column).unwrap_or_default()
}

fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .or_else(|| {
            row.try_get::<Option<Vec<u8>>, _>(column)
                .ok()
                .flatten()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

/// Get a 0/1 flag regardless of the integer width the server picked.
fn get_flag(row: &MySqlRow, column: &str) -> bool {
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(column) {
        return v != 0;
    }
    if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(column) {
        return v;
    }
    matches!(row.try_get::<Option<u64>, _>(column), Ok(Some(v)) if v != 0)
}
