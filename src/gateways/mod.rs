use crate::config::{GatewayAdapter, GatewaySettings};
use crate::domain::payment::{PaymentRequest, PaymentStatus};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod http;
pub mod mock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

/// Upstream payment provider. Implementations carry no retry logic of their own.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, request: &PaymentRequest) -> Result<GatewayResponse>;
}

pub fn from_settings(settings: &GatewaySettings) -> Arc<dyn PaymentGateway> {
    match settings.adapter {
        GatewayAdapter::Http => Arc::new(http::HttpGateway {
            url: settings.url.clone(),
            timeout: settings.timeout,
            client: reqwest::Client::new(),
        }),
        GatewayAdapter::Mock => Arc::new(mock::MockGateway {
            behavior: settings.mock_behavior.clone(),
        }),
    }
}
