//! Database layer.
//!
//! - Identifier validation and quoting
//! - Session store and connection broker
//! - Schema introspection
//! - Generic CRUD statements and row decoding

pub mod broker;
pub mod crud;
mod deadline;
pub mod identifier;
pub(crate) mod params;
pub mod schema;
pub mod session;
pub mod types;

pub use broker::{BrokerSettings, ConnectionBroker, Credentials, LoginGrant};
pub use crud::CrudEngine;
pub use identifier::{is_valid_identifier, quote_identifier};
pub use schema::SchemaInspector;
pub use session::{Session, SessionStore};
