//! Generic CRUD over caller-named tables.
//!
//! Statements are synthesized per call: the table name is a validated
//! [`TableName`], the primary key comes from introspection, and payload keys
//! must name existing columns of the table. All identifiers are quoted and all
//! values are bound positionally. Payload keys are enumerated in sorted order,
//! so the SQL for a given payload is deterministic.

use crate::db::deadline::with_deadline;
use crate::db::identifier::quote_identifier;
use crate::db::params::bind_values;
use crate::db::schema::{DEFAULT_QUERY_TIMEOUT_SECS, SchemaInspector};
use crate::db::types::row_to_record;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Record, RecordId, TableName};
use futures_util::TryStreamExt;
use serde_json::Value as JsonValue;
use sqlx::MySqlPool;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct CrudEngine {
    inspector: SchemaInspector,
    query_timeout: Duration,
}

impl Default for CrudEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }
}

impl CrudEngine {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            inspector: SchemaInspector::new(query_timeout),
            query_timeout,
        }
    }

    pub fn inspector(&self) -> &SchemaInspector {
        &self.inspector
    }

    /// Insert a record and return it with the primary key filled in.
    ///
    /// When the engine assigns no identity (non auto-increment key), the
    /// record is returned as supplied.
    pub async fn create(
        &self,
        pool: &MySqlPool,
        table: &TableName,
        mut record: Record,
    ) -> GatewayResult<Record> {
        self.check_columns(pool, table, &record).await?;

        let columns = record_columns(&record);
        let sql = insert_sql(table, &columns);
        let start = Instant::now();
        let result = with_deadline(
            "insert",
            self.query_timeout,
            bind_values(sqlx::query(&sql), record.values()).execute(pool),
        )
        .await
        .map_err(|e| e.context("Error inserting item"))?;

        let pk = self
            .inspector
            .primary_key_of(pool, table)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { message } => {
                    GatewayError::database(format!("Error obtaining primary key: {}", message), None)
                }
                other => other,
            })?;

        let new_id = result.last_insert_id();
        if new_id != 0 {
            record.insert(pk, JsonValue::from(new_id));
        }

        info!(
            table = %table,
            last_insert_id = new_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Record created"
        );
        Ok(record)
    }

    /// Fetch every row of a table. An empty table is `NotFound`.
    pub async fn read_all(&self, pool: &MySqlPool, table: &TableName) -> GatewayResult<Vec<Record>> {
        let sql = select_all_sql(table);
        let start = Instant::now();
        let records = with_deadline("select", self.query_timeout, async {
            let mut rows = sqlx::query(&sql).fetch(pool);
            let mut records = Vec::new();
            while let Some(row) = rows.try_next().await? {
                records.push(row_to_record(&row));
            }
            Ok::<_, sqlx::Error>(records)
        })
        .await?;

        if records.is_empty() {
            return Err(GatewayError::not_found("Item not found in database"));
        }

        debug!(
            table = %table,
            row_count = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Records read"
        );
        Ok(records)
    }

    pub async fn read_by_id(
        &self,
        pool: &MySqlPool,
        table: &TableName,
        id: RecordId,
    ) -> GatewayResult<Record> {
        let pk = self.inspector.primary_key_of(pool, table).await?;
        let sql = select_by_key_sql(table, &pk);

        let row = with_deadline(
            "select by id",
            self.query_timeout,
            sqlx::query(&sql).bind(id).fetch_optional(pool),
        )
        .await?;

        row.map(|r| row_to_record(&r))
            .ok_or_else(|| GatewayError::not_found("Item not found in database"))
    }

    /// Update the row with the given id; returns the payload with the key set.
    pub async fn update(
        &self,
        pool: &MySqlPool,
        table: &TableName,
        id: RecordId,
        mut record: Record,
    ) -> GatewayResult<Record> {
        if record.is_empty() {
            return Err(GatewayError::invalid_input("Update payload must not be empty"));
        }
        self.check_columns(pool, table, &record).await?;

        let pk = self.inspector.primary_key_of(pool, table).await?;
        let columns = record_columns(&record);
        let sql = update_sql(table, &columns, &pk);

        let result = with_deadline(
            "update",
            self.query_timeout,
            bind_values(sqlx::query(&sql), record.values())
                .bind(id)
                .execute(pool),
        )
        .await
        .map_err(|e| e.context("Error updating item"))?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("Record not found or not updated"));
        }

        info!(table = %table, id = id, "Record updated");
        record.insert(pk, JsonValue::from(id));
        Ok(record)
    }

    /// Delete the row with the given id; returns the affected-row count.
    pub async fn delete(&self, pool: &MySqlPool, table: &TableName, id: RecordId) -> GatewayResult<u64> {
        let pk = self.inspector.primary_key_of(pool, table).await?;
        let sql = delete_sql(table, &pk);

        let result = with_deadline(
            "delete",
            self.query_timeout,
            sqlx::query(&sql).bind(id).execute(pool),
        )
        .await
        .map_err(|e| e.context("Error deleting item"))?;

        let rows_affected = result.rows_affected();
        if rows_affected == 0 {
            return Err(GatewayError::not_found("Record not found or not deleted"));
        }

        info!(table = %table, id = id, rows_affected = rows_affected, "Record deleted");
        Ok(rows_affected)
    }

    /// Reject payload keys that are not columns of the table.
    async fn check_columns(
        &self,
        pool: &MySqlPool,
        table: &TableName,
        record: &Record,
    ) -> GatewayResult<()> {
        if record.is_empty() {
            return Ok(());
        }
        let known = self.inspector.column_names(pool, table).await?;
        match unknown_columns(record, &known).first() {
            Some(column) => Err(GatewayError::invalid_input(format!(
                "Unknown column '{}' for table '{}'",
                column, table
            ))),
            None => Ok(()),
        }
    }
}

fn record_columns(record: &Record) -> Vec<&str> {
    record.keys().map(String::as_str).collect()
}

/// Payload keys, in sorted order, that are not among `known`.
///
/// MySQL column names are case-insensitive, so matching is too.
pub fn unknown_columns<'a>(record: &'a Record, known: &[String]) -> Vec<&'a str> {
    let known: HashSet<String> = known.iter().map(|name| name.to_lowercase()).collect();
    record
        .keys()
        .map(String::as_str)
        .filter(|key| !known.contains(&key.to_lowercase()))
        .collect()
}

// =============================================================================
// SQL Builders
// =============================================================================

pub fn insert_sql(table: &TableName, columns: &[&str]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders = vec!["?"; columns.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table.as_str()),
        names.join(", "),
        placeholders.join(", ")
    )
}

pub fn select_all_sql(table: &TableName) -> String {
    format!("SELECT * FROM {}", quote_identifier(table.as_str()))
}

pub fn select_by_key_sql(table: &TableName, pk: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?",
        quote_identifier(table.as_str()),
        quote_identifier(pk)
    )
}

pub fn update_sql(table: &TableName, columns: &[&str], pk: &str) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = ?", quote_identifier(c)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_identifier(table.as_str()),
        assignments.join(", "),
        quote_identifier(pk)
    )
}

pub fn delete_sql(table: &TableName, pk: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_identifier(table.as_str()),
        quote_identifier(pk)
    )
}
