use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    config::Config,
    controller::AppState,
    decision_log::LogEntry,
    domain::{DailyPlan, Strategy},
    engine::TickDecision,
};

pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .nest("/api/v1", v1_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}

fn v1_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .route("/decisions", get(get_decisions))
        .route("/plan", get(get_plan))
        .route("/tick", post(trigger_tick))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub timestamp: DateTime<Utc>,
    pub status_line: String,
    pub strategy: Option<Strategy>,
    pub decision: Option<TickDecision>,
}

async fn get_status(State(st): State<AppState>) -> impl IntoResponse {
    Json(SystemStatus {
        timestamp: Utc::now(),
        status_line: st.controller.status_line(),
        strategy: st.controller.last_strategy(),
        decision: st.controller.last_decision(),
    })
}

#[derive(Debug, Serialize)]
pub struct DecisionHistory {
    pub entries: Vec<LogEntry>,
}

async fn get_decisions(State(st): State<AppState>) -> impl IntoResponse {
    Json(DecisionHistory {
        entries: st.controller.log_entries(),
    })
}

async fn get_plan(State(st): State<AppState>) -> impl IntoResponse {
    match st.controller.last_plan() {
        Some(plan) => Json::<Option<DailyPlan>>(Some(plan)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no plan computed yet"})),
        )
            .into_response(),
    }
}

/// Manual dispatch trigger, mainly for the simulator and debugging.
async fn trigger_tick(State(st): State<AppState>) -> impl IntoResponse {
    st.controller.run_tick().await;
    Json(serde_json::json!({
        "status_line": st.controller.status_line(),
    }))
}
