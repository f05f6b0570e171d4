//! HTTP handlers.
//!
//! Handlers validate the table name and id before touching the database, then
//! delegate to the broker, the schema inspector or the CRUD engine.

use crate::db::Credentials;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::AppState;
use crate::gateway::session::{SessionConnection, expired_cookie, session_cookie, session_token};
use crate::models::{ColumnDescriptor, Record, RecordId, TableName};
use axum::{
    Extension, Form, Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, FormRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse},
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
}

#[derive(Debug, Deserialize)]
pub struct TableStructureQuery {
    pub table: Option<String>,
}

/// `POST /login`
///
/// A body that is not a readable form counts as missing credentials.
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> GatewayResult<impl IntoResponse> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Unreadable login form");
            LoginForm::default()
        }
    };

    let grant = state
        .broker
        .login(Credentials {
            username: form.username,
            password: form.password,
            database: form.dbname,
        })
        .await?;

    let cookie = session_cookie(&grant.token, grant.max_age, grant.expires_at);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "message": "Login successful" })),
    ))
}

/// `GET /logout`
///
/// The cookie is expired even when its session is already gone.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> GatewayResult<impl IntoResponse> {
    let token = session_token(&headers).ok_or_else(|| GatewayError::invalid_input("No session found"))?;
    if !state.broker.logout(token).await {
        debug!("Logout for a session that no longer exists");
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, expired_cookie())]),
        Json(json!({ "message": "Logout successful" })),
    ))
}

/// `GET /tables`
pub async fn list_tables(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
) -> GatewayResult<Json<Vec<String>>> {
    let tables = state.crud.inspector().list_tables(&pool).await?;
    Ok(Json(tables))
}

/// `GET /table-structure?table=<name>`
pub async fn table_structure(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    query: Result<Query<TableStructureQuery>, QueryRejection>,
) -> GatewayResult<Json<Vec<ColumnDescriptor>>> {
    let Query(query) = query?;
    let table = query
        .table
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::invalid_input("the parameter 'table' is mandatory"))?;

    let columns = state.crud.inspector().describe_table(&pool, &table).await?;
    Ok(Json(columns))
}

/// `POST /crud/{table}`
pub async fn create(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> GatewayResult<Json<Record>> {
    let Path(table) = path?;
    let table = TableName::parse(&table)?;
    let record = parse_record(&body?)?;

    let stored = state.crud.create(&pool, &table, record).await?;
    Ok(Json(stored))
}

/// `GET /crud/{table}`
pub async fn read_all(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    path: Result<Path<String>, PathRejection>,
) -> GatewayResult<Json<Vec<Record>>> {
    let Path(table) = path?;
    let table = TableName::parse(&table)?;
    let records = state.crud.read_all(&pool, &table).await?;
    Ok(Json(records))
}

/// `GET /crud/{table}/{id}`
pub async fn read_by_id(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> GatewayResult<Json<Record>> {
    let Path((table, id)) = path?;
    let table = TableName::parse(&table)?;
    let id = parse_id(&id)?;

    let record = state.crud.read_by_id(&pool, &table, id).await?;
    Ok(Json(record))
}

/// `PUT /crud/{table}/{id}`
pub async fn update(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> GatewayResult<Json<Record>> {
    let Path((table, id)) = path?;
    let table = TableName::parse(&table)?;
    let id = parse_id(&id)?;
    let record = parse_record(&body?)?;

    let updated = state.crud.update(&pool, &table, id, record).await?;
    Ok(Json(updated))
}

/// `DELETE /crud/{table}/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Extension(SessionConnection(pool)): Extension<SessionConnection>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> GatewayResult<Json<JsonValue>> {
    let Path((table, id)) = path?;
    let table = TableName::parse(&table)?;
    let id = parse_id(&id)?;

    let rows_affected = state.crud.delete(&pool, &table, id).await?;
    Ok(Json(json!({
        "message": "Delete successful",
        "rows_affected": rows_affected.to_string(),
    })))
}

fn parse_id(raw: &str) -> GatewayResult<RecordId> {
    raw.parse::<RecordId>()
        .map_err(|_| GatewayError::invalid_input("Invalid ID"))
}

/// Parse a request body as a JSON object.
fn parse_record(body: &[u8]) -> GatewayResult<Record> {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(JsonValue::Object(record)) => Ok(record),
        Ok(_) => Err(GatewayError::invalid_input("Request body must be a JSON object")),
        Err(e) => {
            debug!(error = %e, "Malformed JSON body");
            Err(GatewayError::invalid_input("Invalid request payload"))
        }
    }
}
