//! Boundary envelope for the (external) HTTP layer.
//!
//! Every public-facing operation resolves to a normally-shaped body with a
//! `success` discriminator. Failures carry the static user-facing message
//! plus enough detail for logs — never a raw error chain or stack trace.

use serde::Serialize;
use serde_json::Value;

use crate::service::ServiceError;

/// Success body: `{"success": true, ...data}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSuccess<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Failure body: static message, loggable detail, optional domain fallback
/// payload (e.g. the preset drug list).
#[derive(Debug, Clone, Serialize)]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
    pub error_detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

impl ApiFailure {
    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            error_detail: err.detail(),
            fallback: None,
        }
    }

    /// Attach a domain fallback payload (static suggestion, preset drugs).
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, TransportError};
    use serde_json::json;

    #[derive(Serialize)]
    struct Demo {
        answer: String,
    }

    #[test]
    fn success_flattens_data() {
        let body = ApiSuccess::new(Demo {
            answer: "好的".into(),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["answer"], "好的");
    }

    #[test]
    fn failure_exposes_message_not_chain() {
        let err = ServiceError::Unavailable {
            message: "AI分析服务暂时不可用",
            source: CompletionError::Exhausted {
                attempts: 4,
                last: TransportError::Network("connection reset".into()),
            },
        };
        let body = ApiFailure::from_error(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "AI分析服务暂时不可用");
        // Detail is for logs; the user-facing message carries no chain
        assert!(json["error_detail"].as_str().unwrap().contains("attempts"));
        assert!(json.get("fallback").is_none());
    }

    #[test]
    fn failure_carries_fallback_payload() {
        let err = ServiceError::EmptyInput("症状描述不能为空");
        let body = ApiFailure::from_error(&err)
            .with_fallback(json!({"fallback_advice": "请记录症状详情"}));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["fallback"]["fallback_advice"], "请记录症状详情");
    }
}
