use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::health::HealthReport;
use crate::store::chain::ChainReport;

/// Full KPI report, computed on demand from the event stream.
pub async fn health_report(
    State(state): State<AppState>,
) -> Result<Json<HealthReport>, ApiError> {
    Ok(Json(state.monitor.compute().await?))
}

/// Walk the whole chain and report the first break.
pub async fn verify_integrity(
    State(state): State<AppState>,
) -> Result<Json<ChainReport>, ApiError> {
    Ok(Json(state.ledger.store.verify_integrity(None, None).await?))
}

/// Liveness: does the backend answer.
pub async fn liveness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.ledger.store.healthy().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable")
    }
}
