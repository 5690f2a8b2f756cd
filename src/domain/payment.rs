use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<(), ErrorEnvelope> {
        if self.order_id.trim().is_empty() {
            return Err(ErrorEnvelope::new("INVALID_ORDER_ID", "order_id must not be empty"));
        }
        if self.amount_minor <= 0 {
            return Err(ErrorEnvelope::new("INVALID_AMOUNT", "amount_minor must be > 0"));
        }
        if self.currency.trim().is_empty() {
            return Err(ErrorEnvelope::new("INVALID_CURRENCY", "currency must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayOutcome {
    Success,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayResponse {
    pub order_id: String,
    pub outcome: PayOutcome,
    pub message: String,
    pub transaction_ref: Option<String>,
    pub retry_scheduled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorPayload {
                code: code.to_string(),
                message: message.to_string(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: "O1".to_string(),
            amount_minor: 1999,
            currency: "CNY".to_string(),
            subject: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_blank_order_and_non_positive_amount() {
        let mut r = request();
        r.order_id = "  ".to_string();
        assert_eq!(r.validate().unwrap_err().error.code, "INVALID_ORDER_ID");

        let mut r = request();
        r.amount_minor = 0;
        assert_eq!(r.validate().unwrap_err().error.code, "INVALID_AMOUNT");
    }

    #[test]
    fn subject_is_optional_on_the_wire() {
        let parsed: PaymentRequest =
            serde_json::from_str(r#"{"order_id":"O9","amount_minor":5,"currency":"CNY"}"#).unwrap();
        assert_eq!(parsed.subject, None);
        assert!(!serde_json::to_string(&parsed).unwrap().contains("subject"));
    }
}
