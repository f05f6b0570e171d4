//! Session store mapping opaque tokens to per-session connections.
//!
//! Each session exclusively owns one small MySQL pool. The map is protected by
//! a single lock that is held only for the map access itself; connections are
//! always closed after the lock has been released.

use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default session lifetime, also advertised as the cookie lifetime.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 300;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Longest lifetime a session may be given.
pub const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Clamp a requested lifetime to [`MAX_SESSION_TTL_SECS`].
pub fn bounded_ttl(ttl: Duration) -> Duration {
    ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECS))
}

/// An authenticated session.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub connection: MySqlPool,
    pub username: String,
    pub database: String,
    pub created_at: DateTime<Utc>,
    expires_at: Instant,
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        connection: MySqlPool,
        username: impl Into<String>,
        database: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            token: token.into(),
            connection,
            username: username.into(),
            database: database.into(),
            created_at: Utc::now(),
            expires_at: Instant::now() + bounded_ttl(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A reused token silently replaces the old entry,
    /// whose connection is closed.
    pub async fn put(&self, session: Session) {
        let token = session.token.clone();
        let replaced = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(token.clone(), session)
        };

        if let Some(old) = replaced {
            warn!(token = %mask_token(&token), "Session token reused, closing previous connection");
            old.connection.close().await;
        }
        debug!(token = %mask_token(&token), "Session registered");
    }

    /// Resolve a token to its connection.
    ///
    /// Expired sessions are evicted on lookup and reported as missing.
    pub async fn get(&self, token: &str) -> GatewayResult<MySqlPool> {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if !session.is_expired() => {
                    return Ok(session.connection.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            debug!(token = %mask_token(token), "Session expired on lookup");
            self.evict_if_expired(token).await;
            return Err(GatewayError::session("Session expired"));
        }
        Err(GatewayError::session("Session not found"))
    }

    /// Close the session's connection and delete the entry.
    ///
    /// Returns false when no session was registered under the token.
    pub async fn remove(&self, token: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(token)
        };

        match removed {
            Some(session) => {
                session.connection.close().await;
                info!(
                    token = %mask_token(token),
                    username = %session.username,
                    "Session closed"
                );
                true
            }
            None => {
                debug!(token = %mask_token(token), "No session to close");
                false
            }
        }
    }

    /// Check if a live (unexpired) session exists for the token.
    pub async fn contains(&self, token: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.get(token).is_some_and(|s| !s.is_expired())
    }

    /// Get the number of registered sessions.
    pub async fn count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Start a background task that removes expired sessions.
    ///
    /// This should be called once when the server starts.
    pub fn start_cleanup_task(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired().await;
                if removed > 0 {
                    info!(removed = removed, "Expired sessions removed");
                }
            }
        });
    }

    /// Remove every expired session, closing its connection.
    /// Returns the number of sessions removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let expired_tokens: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.is_expired())
                .map(|(token, _)| token.clone())
                .collect();
            expired_tokens
                .iter()
                .filter_map(|token| sessions.remove(token))
                .collect()
        };

        let count = expired.len();
        for session in expired {
            debug!(token = %mask_token(&session.token), "Closing expired session");
            session.connection.close().await;
        }
        count
    }

    /// Close all connections and clear the store.
    pub async fn close_all(&self) {
        let drained: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in drained {
            session.connection.close().await;
        }
        info!("All sessions closed");
    }

    async fn evict_if_expired(&self, token: &str) {
        let evicted = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(token) {
                Some(session) if session.is_expired() => sessions.remove(token),
                _ => None,
            }
        };
        if let Some(session) = evicted {
            session.connection.close().await;
        }
    }
}

/// Generate a new session token.
pub fn generate_session_token() -> String {
    format!("sess_{}", uuid::Uuid::new_v4().simple())
}

/// Shorten a token for logging.
pub fn mask_token(token: &str) -> String {
    match token.get(..8) {
        Some(prefix) if token.len() > 8 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}
