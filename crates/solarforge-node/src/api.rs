//! HTTP API server for the SolarForge node.
//!
//! Forge requests go through the node event loop; reads and record upserts
//! hit the store directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use solarforge_core::{
    ForgeReceipt, ForgeStats, Galaxy, GalaxyId, Issue, IssueId, User, UserId, UserStarSnapshot, Version,
    VersionId, VersionRollup,
};
use solarforge_settlement::{ForgeError, GalaxySpaceStore, IssueStore, StatsStore, StoreError};

use crate::commands::NodeCommand;
use crate::state::NodeState;

// --- Response types ---

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub gateway_id: String,
    pub uptime_secs: u64,
    pub forges_settled: u64,
    pub forges_failed: u64,
    pub versions_forged: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Deserialize)]
pub struct SunshinesRequest {
    pub amount: u64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, kind: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            kind: kind.into(),
        }),
    )
}

/// HTTP status reported for a failed forge.
pub fn forge_error_status(err: &ForgeError) -> StatusCode {
    match err {
        ForgeError::NotFound => StatusCode::NOT_FOUND,
        ForgeError::DuplicateForge => StatusCode::CONFLICT,
        ForgeError::NoCredits | ForgeError::NoAddresses | ForgeError::NamespaceMissing => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ForgeError::GatewayError(_) => StatusCode::BAD_GATEWAY,
        ForgeError::UpdateFailed | ForgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn forge_error(err: ForgeError) -> ApiError {
    api_error(forge_error_status(&err), err.kind(), err.to_string())
}

fn store_error(err: StoreError) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

fn not_found(what: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", format!("{} not found", what))
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        gateway_id: state.gateway_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        forges_settled: state.forges_settled(),
        forges_failed: state.forges_failed(),
        versions_forged: state.versions_forged(),
    })
}

async fn handle_forge_issue(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
) -> Result<Json<ForgeReceipt>, ApiError> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::ForgeIssue {
        issue_id: IssueId(id),
        reply: reply_tx,
    };

    let result = send_command_and_await(&state, cmd, reply_rx).await?;
    result.map(Json).map_err(forge_error)
}

async fn handle_forge_version(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
) -> Result<Json<VersionRollup>, ApiError> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::ForgeVersion {
        version_id: VersionId(id),
        reply: reply_tx,
    };

    send_command_and_await(&state, cmd, reply_rx).await.map(Json)
}

async fn handle_stats(State(state): State<Arc<NodeState>>) -> Json<ForgeStats> {
    match state.store.stats().await {
        Ok(stats) => Json(stats),
        Err(e) => {
            tracing::warn!(error = %e, "stats unavailable, reporting zeros");
            Json(ForgeStats::default())
        }
    }
}

async fn handle_galaxy_space(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserStarSnapshot>>, ApiError> {
    state
        .store
        .galaxy_space(&GalaxyId(id))
        .await
        .map(Json)
        .map_err(store_error)
}

async fn handle_user_star(
    State(state): State<Arc<NodeState>>,
    Path((galaxy, user)): Path<(String, String)>,
) -> Result<Json<UserStarSnapshot>, ApiError> {
    state
        .store
        .get_user_star(&GalaxyId(galaxy), &UserId(user))
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("user star"))
}

async fn handle_get_issue(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
) -> Result<Json<Issue>, ApiError> {
    state
        .store
        .get_issue(&IssueId(id))
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("issue"))
}

async fn handle_put_issue(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    Json(mut issue): Json<Issue>,
) -> Result<Json<Issue>, ApiError> {
    issue.id = IssueId(id);
    let stored = state.store.upsert_issue(issue).map_err(store_error)?;
    tracing::info!(
        issue_id = %stored.id,
        credits = stored.credits,
        state = ?stored.forge_state(),
        "issue stored"
    );
    Ok(Json(stored))
}

async fn handle_add_sunshines(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    Json(req): Json<SunshinesRequest>,
) -> Result<StatusCode, ApiError> {
    let issue_id = IssueId(id);
    if state
        .store
        .get_issue(&issue_id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(not_found("issue"));
    }
    if !state
        .store
        .add_credits(&issue_id, req.amount)
        .map_err(store_error)?
    {
        return Err(api_error(
            StatusCode::CONFLICT,
            "issue_forged",
            "issue is already forged or being forged",
        ));
    }
    tracing::info!(issue_id = %issue_id, amount = req.amount, "sunshines attached");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_put_user(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    Json(mut user): Json<User>,
) -> Result<StatusCode, ApiError> {
    user.id = UserId(id);
    let stored = state.store.upsert_user(user).map_err(store_error)?;
    tracing::info!(user_id = %stored.id, reward_balance = stored.reward_balance, "user stored");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_put_galaxy(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    Json(mut galaxy): Json<Galaxy>,
) -> Result<StatusCode, ApiError> {
    galaxy.id = GalaxyId(id);
    state.store.put_galaxy(&galaxy).map_err(store_error)?;
    tracing::info!(galaxy_id = %galaxy.id, "galaxy stored");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_put_version(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    Json(mut version): Json<Version>,
) -> Result<StatusCode, ApiError> {
    version.id = VersionId(id);
    state.store.put_version(&version).map_err(store_error)?;
    tracing::info!(version_id = %version.id, patches = version.patches.len(), "version stored");
    Ok(StatusCode::NO_CONTENT)
}

/// Helper to send a command and await the reply.
async fn send_command_and_await<T>(
    state: &Arc<NodeState>,
    cmd: NodeCommand,
    reply_rx: tokio::sync::oneshot::Receiver<T>,
) -> Result<T, ApiError> {
    state.command_tx.send(cmd).await.map_err(|_| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unavailable",
            "node event loop not running",
        )
    })?;

    reply_rx.await.map_err(|_| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unavailable",
            "event loop dropped the reply channel",
        )
    })
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/stats", get(handle_stats))
        .route("/api/v1/forge/issues/{id}", post(handle_forge_issue))
        .route("/api/v1/forge/versions/{id}", post(handle_forge_version))
        .route("/api/v1/galaxies/{id}", put(handle_put_galaxy))
        .route("/api/v1/galaxies/{id}/space", get(handle_galaxy_space))
        .route("/api/v1/galaxies/{id}/users/{user}", get(handle_user_star))
        .route("/api/v1/issues/{id}", get(handle_get_issue).put(handle_put_issue))
        .route("/api/v1/issues/{id}/sunshines", post(handle_add_sunshines))
        .route("/api/v1/users/{id}", put(handle_put_user))
        .route("/api/v1/versions/{id}", put(handle_put_version))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
