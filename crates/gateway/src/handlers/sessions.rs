//! Session record handlers
//!
//! Successful responses share one envelope: `{status, message, data}`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::AppState;
use sessionvault_common::{
    auth::AuthContext,
    db::{ListOutcome, ListParams, Repository, SessionInput},
    db::models::Session,
    errors::{AppError, Result},
    metrics::record_session_op,
};

const CREATED_MESSAGE: &str = "Session has been created successfully.";
const UPDATED_MESSAGE: &str = "Session has been updated successfully.";
const DELETED_MESSAGE: &str = "Session has been deleted successfully.";
const RETRIEVED_MESSAGE: &str = "Session retrieved successfully.";

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            status: 200,
            message,
            data,
        })
    }
}

/// List request; every field is optional and loosely typed
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsRequest {
    pub page: Option<Value>,
    pub per_page: Option<Value>,
    pub get_all: Option<Value>,
    pub search_value: Option<Value>,
}

impl ListSessionsRequest {
    fn params(&self) -> ListParams {
        ListParams::from_json(
            self.page.as_ref(),
            self.per_page.as_ref(),
            self.get_all.as_ref(),
            self.search_value.as_ref(),
        )
    }
}

/// Caller identity returned by the auth check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub user_id: Uuid,
}

/// Unparseable ids cannot name a record
fn parse_session_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::session_not_found(id))
}

fn tracked<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    record_session_op(operation, result.is_ok());
    result
}

/// Create a new session record
///
/// The body is read as JSON whatever its content type.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<Session>>> {
    let request = SessionInput::from_body(&body)?;
    let repo = Repository::new(state.db.clone());

    let session = tracked("create", repo.create_session(request).await)?;

    tracing::info!(
        session_id = %session.id,
        name = %session.name,
        "Session created"
    );

    Ok(ApiResponse::ok(CREATED_MESSAGE, session))
}

/// Replace every field of a session record
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<Session>>> {
    let id = parse_session_id(&id)?;
    let request = SessionInput::from_body(&body)?;
    let repo = Repository::new(state.db.clone());

    let session = tracked("update", repo.update_session(id, request).await)?;

    tracing::info!(session_id = %session.id, "Session updated");

    Ok(ApiResponse::ok(UPDATED_MESSAGE, session))
}

/// Soft-delete a session record
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Session>>> {
    let id = parse_session_id(&id)?;
    let repo = Repository::new(state.db.clone());

    let session = tracked("delete", repo.soft_delete_session(id).await)?;

    tracing::info!(session_id = %session.id, "Session deleted");

    Ok(ApiResponse::ok(DELETED_MESSAGE, session))
}

/// Filtered, paginated listing
///
/// The body is optional; an empty body lists the first page.
pub async fn list_sessions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<ListOutcome>>> {
    let request: ListSessionsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ListSessionsRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Validation {
            message: format!("Invalid list request: {}", e),
            field: None,
        })?
    };

    list(&state, request.params()).await
}

/// Unfiltered first page, for clients that cannot send a body
pub async fn list_sessions_default(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ListOutcome>>> {
    list(&state, ListParams::default()).await
}

async fn list(state: &AppState, params: ListParams) -> Result<Json<ApiResponse<ListOutcome>>> {
    let repo = Repository::new(state.db.clone());

    let outcome = tracked("list", repo.list_sessions(&params).await)?;

    tracing::debug!(
        search = ?params.search,
        pagination = ?params.pagination,
        "Sessions listed"
    );

    Ok(ApiResponse::ok(RETRIEVED_MESSAGE, outcome))
}

/// Every live record, no filters
pub async fn all_sessions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Session>>>> {
    let repo = Repository::new(state.db.clone());

    let sessions = tracked("all", repo.all_sessions().await)?;

    Ok(ApiResponse::ok(RETRIEVED_MESSAGE, sessions))
}

/// Get a session record by ID
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Session>>> {
    let id = parse_session_id(&id)?;
    let repo = Repository::new(state.db.clone());

    let session = tracked("get", repo.get_session(id).await)?;

    Ok(ApiResponse::ok(RETRIEVED_MESSAGE, session))
}

/// The record identified by the authenticated caller's ID
pub async fn current_session(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Session>>> {
    let repo = Repository::new(state.db.clone());

    let session = tracked("current", repo.get_session(auth.user_id).await)?;

    tracing::debug!(
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        "Current session resolved"
    );

    Ok(ApiResponse::ok(RETRIEVED_MESSAGE, session))
}

/// Token check; the extractor rejects unauthenticated callers
pub async fn check_auth(auth: AuthContext) -> Json<ApiResponse<AuthStatus>> {
    ApiResponse::ok(
        "Authenticated",
        AuthStatus {
            user_id: auth.user_id,
        },
    )
}
