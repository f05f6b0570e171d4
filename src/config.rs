//! Configuration handling for the gateway.
//!
//! Every setting comes from a CLI flag with an environment variable fallback.

use crate::db::BrokerSettings;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 9091;
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_DB_HOST: &str = "127.0.0.1";
pub const DEFAULT_DB_PORT: u16 = crate::db::broker::DEFAULT_DB_PORT;
pub const DEFAULT_SESSION_TTL_SECS: u64 = crate::db::session::DEFAULT_SESSION_TTL_SECS;
pub const MAX_SESSION_TTL_SECS: u64 = crate::db::session::MAX_SESSION_TTL_SECS;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = crate::db::session::DEFAULT_SWEEP_INTERVAL_SECS;
pub const DEFAULT_SESSION_MAX_CONNECTIONS: u32 = crate::db::broker::DEFAULT_SESSION_MAX_CONNECTIONS;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = crate::db::schema::DEFAULT_QUERY_TIMEOUT_SECS;

// Idle session connections are released after this long
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

// Upper bound for the connect and query timeouts and the sweep interval
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration for the DB CRUD gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-crud-gateway",
    about = "Per-session database gateway exposing schema discovery and generic CRUD over HTTP",
    version,
    author
)]
pub struct Config {
    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "GATEWAY_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "GATEWAY_HTTP_PORT")]
    pub http_port: u16,

    /// Path the API is mounted under ("/" mounts at the root)
    #[arg(long, default_value = DEFAULT_API_PREFIX, env = "GATEWAY_API_PREFIX")]
    pub api_prefix: String,

    /// Database host used for every login
    #[arg(long, default_value = DEFAULT_DB_HOST, env = "DB_HOST")]
    pub db_host: String,

    /// Database port used for every login
    #[arg(long, default_value_t = DEFAULT_DB_PORT, env = "DB_PORT")]
    pub db_port: u16,

    /// Session lifetime in seconds, also advertised as the cookie lifetime
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_SECS, env = "GATEWAY_SESSION_TTL")]
    pub session_ttl: u64,

    /// Seconds between sweeps of expired sessions
    #[arg(
        long,
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECS,
        env = "GATEWAY_SESSION_SWEEP_INTERVAL"
    )]
    pub session_sweep_interval: u64,

    /// Maximum connections in each session's private pool
    #[arg(
        long,
        default_value_t = DEFAULT_SESSION_MAX_CONNECTIONS,
        env = "GATEWAY_SESSION_MAX_CONNECTIONS"
    )]
    pub session_max_connections: u32,

    /// Login connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "GATEWAY_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Upper bound in seconds for each schema or CRUD statement
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "GATEWAY_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Built-in defaults, without consulting flags or environment.
    pub fn default_config() -> Self {
        Self {
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            db_host: DEFAULT_DB_HOST.to_string(),
            db_port: DEFAULT_DB_PORT,
            session_ttl: DEFAULT_SESSION_TTL_SECS,
            session_sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
            session_max_connections: DEFAULT_SESSION_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Reject settings the gateway cannot start with.
    pub fn validate(&self) -> Result<(), String> {
        if self.http_port == 0 {
            return Err("http_port must be greater than 0".to_string());
        }
        if self.db_port == 0 {
            return Err("db_port must be greater than 0".to_string());
        }
        if self.db_host.trim().is_empty() {
            return Err("db_host must not be empty".to_string());
        }
        if !self.api_prefix.starts_with('/') {
            return Err(format!(
                "api_prefix must start with '/' (got '{}')",
                self.api_prefix
            ));
        }
        if self.session_ttl == 0 || self.session_ttl > MAX_SESSION_TTL_SECS {
            return Err(format!(
                "session_ttl must be between 1 and {} seconds",
                MAX_SESSION_TTL_SECS
            ));
        }
        if self.session_sweep_interval == 0 || self.session_sweep_interval > MAX_TIMEOUT_SECS {
            return Err(format!(
                "session_sweep_interval must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }
        if self.session_max_connections == 0 {
            return Err("session_max_connections must be greater than 0".to_string());
        }
        if self.connect_timeout == 0 || self.connect_timeout > MAX_TIMEOUT_SECS {
            return Err(format!(
                "connect_timeout must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }
        if self.query_timeout == 0 || self.query_timeout > MAX_TIMEOUT_SECS {
            return Err(format!(
                "query_timeout must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }
        Ok(())
    }

    /// API mount path without a trailing slash; empty means the root.
    pub fn normalized_api_prefix(&self) -> String {
        self.api_prefix.trim_end_matches('/').to_string()
    }

    pub fn session_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }

    pub fn sweep_interval_duration(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval)
    }

    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Settings consumed by the connection broker.
    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            db_host: self.db_host.clone(),
            db_port: self.db_port,
            session_ttl: self.session_ttl_duration(),
            max_connections: self.session_max_connections,
            connect_timeout: self.connect_timeout_duration(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
