use crate::circuit::breaker::CircuitBreaker;
use crate::circuit::state::CircuitDecision;
use crate::domain::payment::{PayOutcome, PayResponse, PaymentRequest};
use crate::gateways::PaymentGateway;
use crate::retry::sink::RetrySink;
use std::sync::Arc;
use std::time::Duration;

pub const DEGRADED_MESSAGE: &str = "Payment failed, please try again later.";

#[derive(Clone)]
pub struct PaymentService {
    pub gateway: Arc<dyn PaymentGateway>,
    pub circuit: CircuitBreaker,
    pub retry_sink: Arc<dyn RetrySink>,
    pub primary_timeout: Duration,
}

impl PaymentService {
    /// Synchronous payment. Always answers: either paid, or degraded with the request
    /// handed to the retry sink.
    pub async fn pay(&self, request: PaymentRequest) -> PayResponse {
        let was_probe = match self.circuit.acquire().await {
            CircuitDecision::Allow => false,
            CircuitDecision::Probe => true,
            CircuitDecision::Reject(reason) => {
                return self.fallback(&request, &reason).await;
            }
        };

        let reason = match tokio::time::timeout(self.primary_timeout, self.gateway.attempt(&request)).await {
            Ok(Ok(response)) if response.is_success() => {
                self.circuit.record(true, was_probe).await;
                return PayResponse {
                    order_id: request.order_id,
                    outcome: PayOutcome::Success,
                    message: "SUCCESS".to_string(),
                    transaction_ref: response.transaction_id,
                    retry_scheduled: false,
                };
            }
            Ok(Ok(response)) => format!(
                "gateway {} returned {:?} ({})",
                self.gateway.name(),
                response.status,
                response.error_code.as_deref().unwrap_or("no code")
            ),
            Ok(Err(e)) => format!("gateway {} error: {:#}", self.gateway.name(), e),
            Err(_) => format!("gateway {} timed out after {:?}", self.gateway.name(), self.primary_timeout),
        };

        self.circuit.record(false, was_probe).await;
        self.fallback(&request, &reason).await
    }

    async fn fallback(&self, request: &PaymentRequest, reason: &str) -> PayResponse {
        tracing::warn!(
            "payment gateway unavailable for order {}, using fallback: {}",
            request.order_id,
            reason
        );

        let retry_scheduled = match self.retry_sink.enqueue(request).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "failed to hand order {} to {} retry sink: {:#}",
                    request.order_id,
                    self.retry_sink.kind(),
                    e
                );
                false
            }
        };

        PayResponse {
            order_id: request.order_id.clone(),
            outcome: PayOutcome::Degraded,
            message: DEGRADED_MESSAGE.to_string(),
            transaction_ref: None,
            retry_scheduled,
        }
    }
}
