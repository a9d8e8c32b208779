//! JSON API consumed by the dashboard.

use crate::config::save_roster;
use crate::domain::{PlayerIdentity, Role, SlotKey};
use crate::error::{Result, TrackerError};
use crate::services::TrackerService;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<TrackerService>,
    pub roster_path: PathBuf,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/scrape_data", get(scrape_data))
        .route("/api/player/:role/:slot", get(player))
        .route("/api/overview", get(overview))
        .route("/api/operators", get(operators))
        .route("/api/update_players", post(update_players))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Dashboard API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let status = match err {
            TrackerError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn scrape_data(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.fetch_configured().await)
}

async fn player(
    State(state): State<AppState>,
    Path((role, slot)): Path<(String, usize)>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let role: Role = role.parse()?;
    let key = SlotKey::new(role, slot);
    let identity = state
        .tracker
        .roster()
        .snapshot()
        .await
        .player_at(key)
        .cloned()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("no player configured as {key}")))?;

    Ok(Json(state.tracker.fetch_single(identity, role, slot).await))
}

#[derive(Debug, Deserialize)]
pub struct PlayerQuery {
    platform: String,
    username: String,
}

async fn overview(
    State(state): State<AppState>,
    Query(query): Query<PlayerQuery>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let identity = PlayerIdentity::parse(&query.username, &query.platform)?;
    Ok(Json(state.tracker.fetch_overview_only(identity).await))
}

async fn operators(
    State(state): State<AppState>,
    Query(query): Query<PlayerQuery>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let identity = PlayerIdentity::parse(&query.username, &query.platform)?;
    Ok(Json(state.tracker.fetch_operators_only(identity).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayerEntry {
    #[serde(default)]
    username: String,
    #[serde(default)]
    platform: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePlayersRequest {
    #[serde(default)]
    allies: Vec<PlayerEntry>,
    #[serde(default)]
    enemies: Vec<PlayerEntry>,
    #[serde(default)]
    save_to_config: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UpdatePlayersResponse {
    success: bool,
    message: String,
    allies_count: usize,
    enemies_count: usize,
}

/// Valid entries only; the rest are logged and dropped.
fn identities(entries: &[PlayerEntry], role: Role) -> Vec<PlayerIdentity> {
    entries
        .iter()
        .filter_map(|entry| match PlayerIdentity::parse(&entry.username, &entry.platform) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("Skipping {} entry '{}': {}", role, entry.username, e);
                None
            }
        })
        .collect()
}

async fn update_players(
    State(state): State<AppState>,
    Json(request): Json<UpdatePlayersRequest>,
) -> std::result::Result<Json<UpdatePlayersResponse>, ApiError> {
    let allies = identities(&request.allies, Role::Ally);
    let enemies = identities(&request.enemies, Role::Enemy);

    let roster = state.tracker.roster().update(allies, enemies).await?;

    // The in-memory update already happened; a failed save does not undo it.
    if request.save_to_config && !roster.allies().is_empty() {
        if let Err(e) = save_roster(&state.roster_path, &roster) {
            warn!("Roster updated but not saved to {:?}: {}", state.roster_path, e);
        }
    }

    Ok(Json(UpdatePlayersResponse {
        success: true,
        message: "Configuration updated successfully".to_string(),
        allies_count: roster.allies().len(),
        enemies_count: roster.enemies().len(),
    }))
}
