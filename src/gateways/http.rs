use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::gateways::{GatewayResponse, PaymentGateway};
use anyhow::Result;
use reqwest::StatusCode;
use std::time::Duration;

/// Posts the request as JSON; a 2xx body containing `SUCCESS` counts as paid.
pub struct HttpGateway {
    pub url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

pub fn classify_body(status: StatusCode, body: &str) -> GatewayResponse {
    if status.is_success() && body.contains("SUCCESS") {
        return GatewayResponse {
            status: PaymentStatus::Success,
            transaction_id: serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("trade_no").and_then(|id| id.as_str()).map(ToString::to_string)),
            error_code: None,
            error_message: None,
        };
    }

    GatewayResponse {
        status: if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            PaymentStatus::Timeout
        } else {
            PaymentStatus::Failure
        },
        transaction_id: None,
        error_code: Some(format!("HTTP_{}", status.as_u16())),
        error_message: Some(body.chars().take(200).collect()),
    }
}

#[async_trait::async_trait]
impl PaymentGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn attempt(&self, request: &PaymentRequest) -> Result<GatewayResponse> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await;

        let result = match resp {
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                classify_body(status, &body)
            }
            Err(e) if e.is_timeout() => GatewayResponse {
                status: PaymentStatus::Timeout,
                transaction_id: None,
                error_code: Some("TIMEOUT".to_string()),
                error_message: Some("gateway timeout".to_string()),
            },
            Err(e) => GatewayResponse {
                status: PaymentStatus::Failure,
                transaction_id: None,
                error_code: Some("NETWORK_ERROR".to_string()),
                error_message: Some(e.to_string()),
            },
        };

        Ok(result)
    }
}
