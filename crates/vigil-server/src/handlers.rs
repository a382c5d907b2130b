//! REST handlers for the bot management API.
//!
//! Every route resolves the caller's session first; owner scoping happens
//! inside the supervisor and store, so a wrong-owner id is indistinguishable
//! from a missing one.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use vigil_core::classify;
use vigil_core::ids::BotId;
use vigil_store::users::UserRepo;
use vigil_store::StoreError;
use vigil_supervisor::{BotSupervisor, SupervisorError};

use crate::client::ClientRegistry;
use crate::session::{self, SESSION_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub supervisor: BotSupervisor,
    pub users: Arc<UserRepo>,
    pub registry: Arc<ClientRegistry>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::InvalidToken => Self {
                status: StatusCode::BAD_REQUEST,
                message: "Invalid token format".to_string(),
            },
            SupervisorError::Gateway(gw) => Self {
                status: StatusCode::BAD_REQUEST,
                message: classify::classify(&gw).message,
            },
            SupervisorError::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: "Bot not found".to_string(),
            },
            SupervisorError::NotRunning => Self {
                status: StatusCode::CONFLICT,
                message: "Bot is not running".to_string(),
            },
            SupervisorError::Store(err) => {
                tracing::error!(error = %err, "store failure in handler");
                Self::internal()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store failure in handler");
        Self::internal()
    }
}

/// JSON response with the session id echoed in a header.
fn with_session(session_id: String, body: serde_json::Value) -> Response {
    ([(SESSION_HEADER, session_id)], Json(body)).into_response()
}

#[derive(Deserialize)]
pub struct CreateBotRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

pub async fn list_bots(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    let bots = state.supervisor.list_bots(&user.id).await?;
    let stats = state.supervisor.status_counts(&user.id)?;

    Ok(with_session(
        session_id,
        json!({ "success": true, "bots": bots, "stats": stats }),
    ))
}

pub async fn create_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBotRequest>,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    let bot_id = state.supervisor.add_bot(&user.id, &request.token).await?;

    Ok(with_session(
        session_id,
        json!({ "success": true, "bot_id": bot_id }),
    ))
}

pub async fn get_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    let bot = state
        .supervisor
        .get_bot(&user.id, &BotId::from_raw(id))
        .await
        .ok_or(SupervisorError::NotFound)?;

    Ok(with_session(
        session_id,
        json!({ "success": true, "bot": bot }),
    ))
}

pub async fn toggle_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    let status = state
        .supervisor
        .toggle_bot(&user.id, &BotId::from_raw(id))
        .await?;

    Ok(with_session(
        session_id,
        json!({ "success": true, "status": status }),
    ))
}

pub async fn delete_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    state
        .supervisor
        .remove_bot(&user.id, &BotId::from_raw(id))
        .await?;

    Ok(with_session(session_id, json!({ "success": true })))
}

pub async fn bot_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let (user, session_id) = session::resolve_session(&state.users, &headers)?;
    let history =
        state
            .supervisor
            .bot_history(&user.id, &BotId::from_raw(id), params.limit)?;

    Ok(with_session(
        session_id,
        json!({ "success": true, "history": history }),
    ))
}

pub async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.supervisor.global_status_counts()?;
    let body = json!({
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339(),
        "bot_count": state.supervisor.live_count(),
        "stats": stats,
    });
    Ok(Json(body).into_response())
}
