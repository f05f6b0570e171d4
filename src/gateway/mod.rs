//! HTTP request gateway.
//!
//! `/login` and `/logout` are public; every other route goes through
//! [`session::require_session`], which resolves the `session_token` cookie to
//! the session's connection.

pub mod handlers;
pub mod session;

use crate::db::{ConnectionBroker, CrudEngine, SessionStore};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Arc<ConnectionBroker>,
    pub crud: CrudEngine,
}

impl AppState {
    pub fn new(broker: Arc<ConnectionBroker>, crud: CrudEngine) -> Self {
        Self { broker, crud }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.broker.store()
    }
}

/// Build the API router, mounted under `prefix` (empty for the root).
pub fn router(state: AppState, prefix: &str) -> Router {
    let protected = Router::new()
        .route("/tables", get(handlers::list_tables))
        .route("/table-structure", get(handlers::table_structure))
        .route(
            "/crud/{table}",
            post(handlers::create).get(handlers::read_all),
        )
        .route(
            "/crud/{table}/{id}",
            get(handlers::read_by_id)
                .put(handlers::update)
                .delete(handlers::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    let api = Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", get(handlers::logout))
        .merge(protected)
        .with_state(state);

    let prefix = prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    app.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BrokerSettings, Session};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value as JsonValue;
    use sqlx::MySqlPool;
    use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    const PREFIX: &str = "/api/v1";

    fn test_state() -> AppState {
        let store = Arc::new(SessionStore::new());
        let broker = Arc::new(ConnectionBroker::new(store, BrokerSettings::default()));
        AppState::new(broker, CrudEngine::default())
    }

    /// A pool that never touches the network until first use, and then
    /// fails quickly: nothing listens on port 1.
    fn lazy_pool() -> MySqlPool {
        let options = MySqlConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("test")
            .database("test");
        MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy_with(options)
    }

    async fn with_session(state: &AppState, token: &str, ttl: Duration) {
        state
            .sessions()
            .put(Session::new(token, lazy_pool(), "u", "d", ttl))
            .await;
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, body)
    }

    fn get_with_cookie(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("session_token={}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_protected_route_without_cookie_is_unauthorized() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .uri("/api/v1/tables")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_session_is_unauthorized() {
        let app = router(test_state(), PREFIX);
        let (status, _) = send(app, get_with_cookie("/api/v1/crud/users", "sess_unknown")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let state = test_state();
        with_session(&state, "sess_old", Duration::ZERO).await;
        let app = router(state.clone(), PREFIX);

        let (status, _) = send(app, get_with_cookie("/api/v1/tables", "sess_old")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.sessions().count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_table_name_is_bad_request() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        let (status, body) = send(app, get_with_cookie("/api/v1/crud/users;drop", "sess_a")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid input or table name");
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        let (status, body) = send(app, get_with_cookie("/api/v1/crud/users/abc", "sess_a")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid ID");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/crud/users")
            .header(header::COOKIE, "session_token=sess_a")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request payload");
    }

    #[tokio::test]
    async fn test_unsupported_method_is_not_allowed() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        let request = Request::builder()
            .method("PATCH")
            .uri("/api/v1/crud/users/1")
            .header(header::COOKIE, "session_token=sess_a")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_table_structure_requires_table_parameter() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        let (status, body) = send(app, get_with_cookie("/api/v1/table-structure", "sess_a")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "the parameter 'table' is mandatory");
    }

    #[tokio::test]
    async fn test_table_structure_accepts_underscore_names() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let app = router(state, PREFIX);

        // The name reaches the database; only the unreachable server fails it
        let (status, body) = send(
            app,
            get_with_cookie("/api/v1/table-structure?table=order_items", "sess_a"),
        )
        .await;
        assert_ne!(status, StatusCode::BAD_REQUEST);
        assert_ne!(body["message"], "Invalid input or table name");
    }

    #[tokio::test]
    async fn test_login_without_form_is_bad_request() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/login")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("application/json"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Username and password are required");
    }

    #[tokio::test]
    async fn test_login_with_json_body_is_bad_request() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username":"u","password":"p"}"#))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username and password are required");
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=&password=&dbname=shop"))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username and password are required");
    }

    #[tokio::test]
    async fn test_logout_without_cookie_is_bad_request() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .uri("/api/v1/logout")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No session found");
    }

    #[tokio::test]
    async fn test_logout_closes_session_and_expires_cookie() {
        let state = test_state();
        with_session(&state, "sess_a", Duration::from_secs(60)).await;
        let pool = state.sessions().get("sess_a").await.unwrap();
        let app = router(state.clone(), PREFIX);

        let response = app
            .oneshot(get_with_cookie("/api/v1/logout", "sess_a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.contains("Max-Age=0"));

        assert_eq!(state.sessions().count().await, 0);
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_logout_of_unknown_session_still_expires_cookie() {
        let state = test_state();
        with_session(&state, "sess_live", Duration::from_secs(60)).await;
        let app = router(state.clone(), PREFIX);

        let response = app
            .oneshot(get_with_cookie("/api/v1/logout", "sess_gone"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.contains("Max-Age=0"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Logout successful");

        // Other sessions are untouched
        assert_eq!(state.sessions().count().await, 1);
    }

    #[tokio::test]
    async fn test_logout_of_expired_session_is_ok() {
        let state = test_state();
        with_session(&state, "sess_old", Duration::ZERO).await;
        let app = router(state.clone(), PREFIX);

        let (status, body) = send(app, get_with_cookie("/api/v1/logout", "sess_old")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logout successful");
        assert_eq!(state.sessions().count().await, 0);
    }

    #[tokio::test]
    async fn test_root_prefix() {
        let app = router(test_state(), "/");
        let request = Request::builder()
            .uri("/tables")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_routes_outside_prefix_are_not_found() {
        let app = router(test_state(), PREFIX);
        let request = Request::builder()
            .uri("/tables")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
