pub mod circuit;
pub mod config;
pub mod domain {
    pub mod payment;
    pub mod retry;
}
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod circuit_breaker;
        pub mod ops;
        pub mod payments;
        pub mod retries;
    }
}
pub mod pipeline;
pub mod repo {
    pub mod outbox_repo;
}
pub mod retry;
pub mod service {
    pub mod outbox_relay;
    pub mod payment_service;
}
pub mod store;

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub log: std::sync::Arc<dyn store::LogStore>,
    pub counter: retry::attempts::AttemptCounter,
}

pub fn router(state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(http::handlers::payments::health))
        .route("/payments/pay", post(http::handlers::payments::pay))
        .route("/retries/:order_id", get(http::handlers::retries::get_attempts))
        .route("/circuit-breaker/status", get(http::handlers::circuit_breaker::status))
        .route("/ops/readiness", get(http::handlers::ops::readiness))
        .route("/ops/liveness", get(http::handlers::ops::liveness))
        .with_state(state)
}
