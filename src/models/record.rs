//! Generic row representation and validated table names.

use crate::db::identifier::is_valid_identifier;
use crate::error::{GatewayError, GatewayResult};
use serde_json::Value as JsonValue;
use std::fmt;

/// One row, keyed by column name.
///
/// Used both as the create/update payload and as the read result. Backed by
/// `serde_json::Map`, whose keys iterate in sorted order, so SQL generated
/// from a record is deterministic.
pub type Record = serde_json::Map<String, JsonValue>;

/// Row identifier accepted on `/crud/{table}/{id}` routes.
pub type RecordId = i64;

/// A table name that passed the identifier validator.
///
/// Only values of this type are ever interpolated into generated SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validate a caller-supplied table name.
    pub fn parse(name: &str) -> GatewayResult<Self> {
        if is_valid_identifier(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(GatewayError::invalid_input("Invalid input or table name"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
