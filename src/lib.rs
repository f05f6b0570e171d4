//! DB CRUD Gateway Library
//!
//! A per-session database gateway: callers log in with their own MySQL
//! credentials, receive a session cookie bound to a private connection, and
//! then use schema-discovery and generic CRUD endpoints on any table.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod server;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{AppState, router};
