//! REST API for the web frontend
//!
//! Read access is open; write access requires the configured bearer token.
//! The restart endpoint does not kill the process, it resolves the graceful
//! shutdown future that `axum::serve` waits on.

use crate::dispatcher::Dispatcher;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use lineup_common::config::{LineupConfig, Meta};
use lineup_common::snapshot::SlotRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    restart: mpsc::UnboundedSender<()>,
}

/// Schedule payload served to the frontend
#[derive(Serialize)]
struct ScheduleResponse {
    meta: MetaResponse,
    sets: Vec<SlotRecord>,
}

#[derive(Serialize)]
struct MetaResponse {
    #[serde(flatten)]
    meta: Meta,
    rooms: Vec<String>,
}

/// PWA manifest, icons derived from the configured asset prefix
#[derive(Serialize)]
struct Manifest {
    name: String,
    short_name: String,
    start_url: String,
    display: String,
    background_color: String,
    lang: String,
    scope: String,
    description: String,
    theme_color: String,
    icons: Vec<Icon>,
}

#[derive(Serialize)]
struct Icon {
    src: String,
    sizes: String,
    #[serde(rename = "type")]
    mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RestartRequest {
    merged_by: String,
    created_by: String,
    pr_url: String,
    push_type: String,
    pushed_by: String,
    pusher_name: String,
    pusher_email: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(rename = "adminMsg")]
    admin_msg: String,
}

/// Serve the API until shutdown is requested, by signal or by the restart
/// endpoint.
pub async fn start(dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let port = dispatcher.config().port;
    let (restart_tx, restart_rx) = mpsc::unbounded_channel();
    let state = AppState {
        dispatcher,
        restart: restart_tx,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api", get(get_schedule).put(update_lineup).post(restart))
        .route("/api/message", post(message))
        .route("/manifest", get(get_manifest))
        .route("/manifest.webmanifest", get(get_manifest))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("HTTP server listening on port {port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(restart_rx))
        .await?;
    Ok(())
}

async fn shutdown_signal(mut restart: mpsc::UnboundedReceiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot install ctrl-c handler: {e}");
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!("cannot install SIGTERM handler: {e}"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
        _ = restart.recv() => info!("restart requested over the API, shutting down"),
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let token = &state.dispatcher.config().server_token;
    if token.is_empty() {
        return false;
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {token}"))
        .unwrap_or(false)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn get_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ScheduleResponse> {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    state
        .dispatcher
        .log_api_hit(&user_agent, &client_ip(&headers))
        .await;
    let config = state.dispatcher.config();
    Json(ScheduleResponse {
        meta: MetaResponse {
            meta: config.meta.clone(),
            rooms: config.lineup.rooms.clone(),
        },
        sets: state.dispatcher.canonical_slots().await,
    })
}

async fn get_manifest(State(state): State<AppState>) -> Json<Manifest> {
    let meta = &state.dispatcher.config().meta;
    Json(Manifest {
        name: meta.mobile_app_name.clone(),
        short_name: meta.mobile_app_name.clone(),
        start_url: "/".to_string(),
        display: "standalone".to_string(),
        background_color: "#222123".to_string(),
        lang: "en".to_string(),
        scope: "/".to_string(),
        description: "An app to display DJ sets".to_string(),
        theme_color: "#222123".to_string(),
        icons: vec![
            Icon {
                src: format!("{}-192x192.png", meta.prefix),
                sizes: "192x192".to_string(),
                mime: "image/png".to_string(),
                purpose: Some("any".to_string()),
            },
            Icon {
                src: format!("{}-180x180.png", meta.prefix),
                sizes: "180x180".to_string(),
                mime: "image/png".to_string(),
                purpose: Some("maskable".to_string()),
            },
            Icon {
                src: format!("{}-192x192.png", meta.prefix),
                sizes: "192x192".to_string(),
                mime: "image/png".to_string(),
                purpose: Some("maskable".to_string()),
            },
        ],
    })
}

async fn update_lineup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(lineup): Json<LineupConfig>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        );
    }
    match state
        .dispatcher
        .submit_api_lineup(lineup, &client_ip(&headers))
        .await
    {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({"message": format!("Created MR {id} with changes")})),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

async fn restart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RestartRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        );
    }
    let restart_msg = match req.push_type.as_str() {
        "merge" => format!(
            "Restart: Merged by: {}, Created by: {}, PR URL: {}",
            req.merged_by, req.created_by, req.pr_url
        ),
        "force push" => format!(
            "Restart: Force-pushed by: {}, Pusher: {} ({}), PR URL: {}",
            req.pushed_by, req.pusher_name, req.pusher_email, req.pr_url
        ),
        _ => format!(
            "Restart: Unknown push type. Pushed by: {}, Pusher: {} ({}), PR URL: {}",
            req.pushed_by, req.pusher_name, req.pusher_email, req.pr_url
        ),
    };
    state.dispatcher.broadcast_message(&restart_msg).await;
    if state.restart.send(()).is_err() {
        warn!("restart channel closed");
    }
    (
        StatusCode::OK,
        Json(json!({"message": "Server is restarting..."})),
    )
}

async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MessageRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        );
    }
    state.dispatcher.broadcast_message(&req.admin_msg).await;
    (
        StatusCode::OK,
        Json(json!({"status": "Message sent to admins"})),
    )
}
