//! Schema-related data models.
//!
//! Column descriptors are produced fresh by every introspection call and
//! never cached.

use serde::{Deserialize, Serialize};

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Rendered label, `table.column`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(rename = "column_name")]
    pub name: String,
    pub data_type: String,
    #[serde(rename = "is_nullable")]
    pub nullable: bool,
    #[serde(rename = "column_default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    /// `referenced_table.referenced_column`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_column: Option<String>,
}

impl ColumnDescriptor {
    /// Create a new column descriptor.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            is_primary_key: false,
            foreign_key: None,
            referenced_table: None,
            referenced_column: None,
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    pub fn with_foreign_key(mut self, reference: ForeignKeyRef) -> Self {
        self.foreign_key = Some(reference.label());
        self.referenced_table = Some(reference.table);
        self.referenced_column = Some(reference.column);
        self
    }
}

/// Map the engine's "YES"/"NO" nullability marker to a boolean.
pub fn parse_nullable(marker: &str) -> bool {
    marker.eq_ignore_ascii_case("YES")
}
