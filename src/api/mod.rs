//! Small HTTP control plane for the running filter.

use crate::config::Config;
use crate::engine::{normalize_domain, BlockListStore, BlocklistUpdater, DecisionEngine};
use crate::init::build_rule_set;
use crate::stats::StatsCollector;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ApiState {
    pub engine: Arc<DecisionEngine>,
    pub store: Arc<dyn BlockListStore>,
    pub updater: Option<Arc<BlocklistUpdater>>,
    pub stats: Arc<StatsCollector>,
    /// Config file the `[rules]` section is reloaded from.
    pub config_path: PathBuf,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/stats", get(get_stats))
        .route("/api/check", get(check_domain))
        .route("/api/refresh", post(trigger_refresh))
        .route("/api/rules/reload", post(reload_rules))
        .with_state(state)
}

pub async fn start_api_server(state: Arc<ApiState>, addr: std::net::SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("API Server listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("API server failed")
}

async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let updater_state = state.updater.as_ref().map(|u| u.state());
    Json(serde_json::json!({
        "store": state.store.name(),
        "updater": updater_state,
        "snapshot": state.store.last_snapshot(),
        "active_entries": state.store.block_map().len(),
        "rules": state.store.rules().counts(),
    }))
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.stats.get_snapshot())
}

#[derive(Deserialize)]
struct CheckParams {
    domain: String,
}

async fn check_domain(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<CheckParams>,
) -> impl IntoResponse {
    let name = normalize_domain(&params.domain);
    Json(serde_json::json!({
        "domain": name,
        "whitelisted": state.store.is_whitelisted(&name),
        "blacklisted": state.store.is_blacklisted(&name),
        "blocked": state.engine.is_blocked(&name),
    }))
}

async fn trigger_refresh(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match &state.updater {
        Some(updater) => {
            let queued = updater.trigger();
            let status = if queued { "refresh_triggered" } else { "refresh_coalesced" };
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": status })))
        }
        None => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "status": "no_sources_configured" })),
        ),
    }
}

async fn reload_rules(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let rules = match Config::load(&state.config_path).await {
        Ok(config) => build_rule_set(&config.rules).map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };

    match rules {
        Ok(rules) => {
            let counts = rules.counts();
            state.store.replace_rules(rules);
            info!("Reloaded rules from {}", state.config_path.display());
            (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "reloaded", "rules": counts })),
            )
        }
        Err(e) => {
            warn!("Rule reload rejected: {:#}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "status": "rejected", "error": format!("{:#}", e) })),
            )
        }
    }
}
