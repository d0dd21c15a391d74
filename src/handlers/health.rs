//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::model::EngineStatus;
use crate::AppState;

#[derive(Serialize)]
pub struct HomeResponse {
    message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    model: EngineStatus,
}

pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "Fraud Detection API is running successfully!",
    })
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model: state.engine.status(),
    })
}
