//! Parameter binding for record values.
//!
//! Record values arrive as JSON scalars and are bound positionally; only
//! identifiers ever reach the SQL text.

use serde_json::Value as JsonValue;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::types::Json;

pub(crate) type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Bind a record value to a MySQL query.
pub(crate) fn bind_value<'q>(query: MySqlQuery<'q>, value: &'q JsonValue) -> MySqlQuery<'q> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(v) => query.bind(*v),
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                query.bind(v)
            } else if let Some(v) = n.as_u64() {
                query.bind(v)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(v) => query.bind(v.as_str()),
        // Nested values are stored as JSON text
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(Json(value)),
    }
}

/// Bind every value in order.
pub(crate) fn bind_values<'q, I>(mut query: MySqlQuery<'q>, values: I) -> MySqlQuery<'q>
where
    I: IntoIterator<Item = &'q JsonValue>,
{
    for value in values {
        query = bind_value(query, value);
    }
    query
}
