use crate::domain::payment::PaymentRequest;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

pub async fn pay(State(state): State<AppState>, Json(req): Json<PaymentRequest>) -> impl IntoResponse {
    if let Err(body) = req.validate() {
        return (axum::http::StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let resp = state.payment_service.pay(req).await;
    (axum::http::StatusCode::OK, Json(resp)).into_response()
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}
