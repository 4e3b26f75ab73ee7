//! Emergency-assessment reply classification.
//!
//! Unlike triage (which scans the caller's input), this parser classifies
//! the *model's reply* by token presence, in fixed precedence order:
//! 紧急/立即 → emergency, then 急迫/尽快 → urgent, else normal.

use serde::{Deserialize, Serialize};

use super::triage::UrgencyLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAssessment {
    pub urgency_level: UrgencyLevel,
    pub message: String,
    pub action: String,
    pub color: String,
}

/// Classify an assessment reply into the three-level scheme.
pub fn classify_emergency_reply(reply: &str) -> EmergencyAssessment {
    if reply.contains("紧急") || reply.contains("立即") {
        EmergencyAssessment {
            urgency_level: UrgencyLevel::Emergency,
            message: "建议立即就医".to_string(),
            action: "请前往急诊科".to_string(),
            color: UrgencyLevel::Emergency.color().to_string(),
        }
    } else if reply.contains("急迫") || reply.contains("尽快") {
        EmergencyAssessment {
            urgency_level: UrgencyLevel::Urgent,
            message: "建议尽快就医".to_string(),
            action: "请及时预约就诊".to_string(),
            color: UrgencyLevel::Urgent.color().to_string(),
        }
    } else {
        EmergencyAssessment {
            urgency_level: UrgencyLevel::Normal,
            message: "可以观察症状变化".to_string(),
            action: "注意休息，必要时就医".to_string(),
            color: UrgencyLevel::Normal.color().to_string(),
        }
    }
}

/// Conservative assessment when the service cannot be reached.
pub fn fallback_assessment() -> EmergencyAssessment {
    EmergencyAssessment {
        urgency_level: UrgencyLevel::Normal,
        message: "无法评估，建议咨询医生".to_string(),
        action: "如有疑虑请及时就医".to_string(),
        color: UrgencyLevel::Normal.color().to_string(),
    }
}
