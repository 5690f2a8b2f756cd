use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::gateways::{GatewayResponse, PaymentGateway};
use anyhow::Result;

pub struct MockGateway {
    pub behavior: String,
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn attempt(&self, _request: &PaymentRequest) -> Result<GatewayResponse> {
        let response = match self.behavior.as_str() {
            "ALWAYS_FAILURE" => GatewayResponse {
                status: PaymentStatus::Failure,
                transaction_id: None,
                error_code: Some("MOCK_DECLINED".to_string()),
                error_message: Some("mock decline".to_string()),
            },
            "ALWAYS_TIMEOUT" => GatewayResponse {
                status: PaymentStatus::Timeout,
                transaction_id: None,
                error_code: Some("MOCK_TIMEOUT".to_string()),
                error_message: Some("mock timeout".to_string()),
            },
            _ => GatewayResponse {
                status: PaymentStatus::Success,
                transaction_id: Some(format!("mock_txn_{}", uuid::Uuid::new_v4())),
                error_code: None,
                error_message: None,
            },
        };

        Ok(response)
    }
}
