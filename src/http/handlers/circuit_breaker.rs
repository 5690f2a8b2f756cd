use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.payment_service.circuit.snapshot().await;
    (
        axum::http::StatusCode::OK,
        Json(serde_json::json!({
            "gateway": state.payment_service.gateway.name(),
            "state": snapshot.state,
            "window_total": snapshot.window_total,
            "window_failed": snapshot.window_failed,
            "failure_ratio": snapshot.failure_ratio(),
            "cooldown_until": snapshot.cooldown_until,
            "updated_at": snapshot.updated_at,
        })),
    )
        .into_response()
}
