use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use vigil_core::events::DashboardEvent;
use vigil_core::ids::UserId;
use vigil_store::users::UserRepo;
use vigil_store::Database;
use vigil_supervisor::BotSupervisor;

use crate::client::{self, ClientRegistry};
use crate::event_bridge;
use crate::handlers::{self, AppState};
use crate::session;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_send_queue: 256,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/bots",
            get(handlers::list_bots).post(handlers::create_bot),
        )
        .route(
            "/api/bots/{id}",
            get(handlers::get_bot).delete(handlers::delete_bot),
        )
        .route("/api/bots/{id}/toggle", put(handlers::toggle_bot))
        .route("/api/bots/{id}/history", get(handlers::bot_history))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle to keep it alive.
pub async fn start(
    config: ServerConfig,
    db: Database,
    supervisor: BotSupervisor,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(ClientRegistry::new(config.max_send_queue));

    let bridge_handle = event_bridge::create_bridge(Arc::clone(&registry), supervisor.subscribe());

    let _cleanup = client::start_cleanup_task(
        Arc::clone(&registry),
        std::time::Duration::from_secs(60),
    );

    let state = AppState {
        supervisor,
        users: Arc::new(UserRepo::new(db)),
        registry,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "vigil server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
        _bridge: bridge_handle,
        _cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _bridge: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

#[derive(Deserialize)]
struct WsQuery {
    session: Option<String>,
}

/// WebSocket upgrade: resolve the session before upgrading so the client is
/// bound to its user from the first frame.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = query
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(session::new_session_id);

    let user = match state.users.get_or_create(&session_id) {
        Ok(user) => user,
        Err(err) => {
            tracing::error!(error = %err, "session resolution failed for websocket");
            return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user.id))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let (client_id, rx) = state.registry.register(user_id.clone());
    tracing::info!(client_id = %client_id, user_id = %user_id, "websocket client connected");

    send_snapshot(&state, &client_id, &user_id).await;

    client::handle_ws_connection(socket, client_id, rx, Arc::clone(&state.registry)).await;
}

/// Queue the current bots + stats for a freshly connected client so the
/// dashboard renders without waiting for the next mutation.
async fn send_snapshot(
    state: &AppState,
    client_id: &client::ClientId,
    user_id: &UserId,
) {
    let bots = match state.supervisor.list_bots(user_id).await {
        Ok(bots) => bots,
        Err(err) => {
            tracing::warn!(error = %err, "failed to snapshot bots for new client");
            return;
        }
    };
    let stats = match state.supervisor.status_counts(user_id) {
        Ok(stats) => stats,
        Err(err) => {
            tracing::warn!(error = %err, "failed to snapshot stats for new client");
            return;
        }
    };

    let events = [
        DashboardEvent::BotsUpdate {
            user_id: user_id.clone(),
            bots,
        },
        DashboardEvent::StatsUpdate {
            user_id: user_id.clone(),
            stats,
        },
    ];
    for event in &events {
        if let Some(json) = event_bridge::serialize_event(event) {
            state.registry.send_to(client_id, json);
        }
    }
}
