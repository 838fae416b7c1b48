use axum::{extract::State, http::StatusCode, Json};
use pollbot_core::{observability, AppState};
use serde_json::{json, Value};

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match pollbot_db::ping(&state.db).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("health check: database unavailable: {err}");
            false
        }
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "database": database,
            "metrics": observability::metrics_snapshot(),
        })),
    )
}
