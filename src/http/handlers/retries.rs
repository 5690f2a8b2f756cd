use crate::domain::payment::ErrorEnvelope;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

pub async fn get_attempts(State(state): State<AppState>, Path(order_id): Path<String>) -> impl IntoResponse {
    match state.counter.get(&order_id).await {
        Ok(attempts) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({ "order_id": order_id, "attempts": attempts })),
        )
            .into_response(),
        Err(e) => {
            let mut body = ErrorEnvelope::new("COUNTER_UNAVAILABLE", "attempt counter could not be read");
            body.error.details = Some(format!("{:#}", e));
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
