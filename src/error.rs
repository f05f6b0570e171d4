//! Error types for the gateway.
//!
//! Every core operation reports failures through [`GatewayError`]. The request
//! gateway turns each variant into an HTTP status and a `{"message": ...}` body.

use axum::Json;
use axum::extract::rejection::{BytesRejection, FormRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or malformed caller input.
    #[error("{message}")]
    InvalidInput { message: String },

    /// Credentials rejected by the database.
    #[error("{message}")]
    Auth { message: String },

    /// Missing, unknown or expired session token.
    #[error("{message}")]
    Session { message: String },

    /// Row, table or primary key absent.
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
    },

    /// The connection could not be configured or reached.
    #[error("{message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {limit_ms}ms")]
    Timeout { operation: String, limit_ms: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// `limit` is the deadline that expired.
    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Prefix the message of a database error with context, keeping the SQL state.
    ///
    /// Other variants are returned unchanged so that classification (404, 401, ...)
    /// survives the extra context.
    pub fn context(self, context: &str) -> Self {
        match self {
            Self::Database { message, sql_state } => Self::Database {
                message: format!("{}: {}", context, message),
                sql_state,
            },
            other => other,
        }
    }

    /// Operator hint, only carried by connection errors.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// HTTP status code this error maps to at the request gateway.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Auth { .. } | Self::Session { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Database { .. }
            | Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => GatewayError::connection(
                msg.to_string(),
                "Check the database host, port and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => GatewayError::not_found("Item not found in database"),
            sqlx::Error::PoolTimedOut => GatewayError::connection(
                "Timed out waiting for a session connection",
                "Raise --connect-timeout or --session-max-connections",
            ),
            sqlx::Error::PoolClosed => {
                GatewayError::connection("Session connection is closed", "Log in again")
            }
            sqlx::Error::Io(io_err) => GatewayError::connection(
                format!("Database I/O failed: {}", io_err),
                "Check that the database server is reachable",
            ),
            sqlx::Error::Tls(tls_err) => GatewayError::connection(
                format!("TLS handshake failed: {}", tls_err),
                "Check the server certificate and TLS feature flags",
            ),
            sqlx::Error::Protocol(msg) => GatewayError::connection(
                format!("Unexpected server reply: {}", msg),
                "The server may not be MySQL compatible",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                GatewayError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::database(format!("Failed to decode column {}: {}", index, source), None)
            }
            sqlx::Error::Decode(source) => {
                GatewayError::database(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => GatewayError::internal("Database worker crashed"),
            _ => GatewayError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

// Extractor rejections answer with the usual JSON body instead of axum's text.
macro_rules! invalid_input_from_rejection {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for GatewayError {
                fn from(rejection: $rejection) -> Self {
                    GatewayError::invalid_input(rejection.body_text())
                }
            }
        )+
    };
}

invalid_input_from_rejection!(BytesRejection, FormRejection, PathRejection, QueryRejection);

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, suggestion = ?self.suggestion(), "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        let body = Json(serde_json::json!({ "message": self.to_string() }));
        (status, body).into_response()
    }
}
