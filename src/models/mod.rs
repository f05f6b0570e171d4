//! Data models for the gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod record;
pub mod schema;

pub use record::{Record, RecordId, TableName};
pub use schema::{ColumnDescriptor, ForeignKeyRef};
