//! Symptom triage — a fixed rule table, not model-derived.
//!
//! Urgency is classified from the *caller's symptom input*, never from the
//! model reply: the reply informs the advice text, the rule table decides
//! the banner. Emergency keywords always win over urgent keywords.

use serde::{Deserialize, Serialize};

/// Keywords that force `emergency` regardless of anything else.
pub const EMERGENCY_KEYWORDS: [&str; 6] =
    ["胸痛", "呼吸困难", "意识障碍", "大出血", "急性", "严重"];

/// Keywords that raise `urgent` when no emergency keyword matched.
pub const URGENT_KEYWORDS: [&str; 5] = ["发烧", "持续", "剧烈", "头痛", "腹痛"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Emergency,
    Urgent,
    Normal,
}

impl UrgencyLevel {
    pub fn color(&self) -> &'static str {
        match self {
            UrgencyLevel::Emergency => "#e74c3c",
            UrgencyLevel::Urgent => "#f39c12",
            UrgencyLevel::Normal => "#27ae60",
        }
    }
}

/// Urgency banner shown with every symptom analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyAssessment {
    pub level: UrgencyLevel,
    pub message: String,
    pub color: String,
}

/// Classify symptoms against the two keyword tiers.
pub fn classify_urgency(symptoms: &str) -> UrgencyAssessment {
    if EMERGENCY_KEYWORDS.iter().any(|k| symptoms.contains(k)) {
        return UrgencyAssessment {
            level: UrgencyLevel::Emergency,
            message: "症状可能较为严重，建议立即就医".to_string(),
            color: UrgencyLevel::Emergency.color().to_string(),
        };
    }
    if URGENT_KEYWORDS.iter().any(|k| symptoms.contains(k)) {
        return UrgencyAssessment {
            level: UrgencyLevel::Urgent,
            message: "建议尽快就医检查".to_string(),
            color: UrgencyLevel::Urgent.color().to_string(),
        };
    }
    UrgencyAssessment {
        level: UrgencyLevel::Normal,
        message: "症状相对较轻，可观察并适当治疗".to_string(),
        color: UrgencyLevel::Normal.color().to_string(),
    }
}

/// Coarse risk score derived from the urgency tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: String,
    pub risk_score: u32,
}

fn risk_for(level: UrgencyLevel) -> RiskAssessment {
    if level == UrgencyLevel::Urgent {
        RiskAssessment {
            risk_level: "中等风险".to_string(),
            risk_score: 30,
        }
    } else {
        RiskAssessment {
            risk_level: "低风险".to_string(),
            risk_score: 15,
        }
    }
}

/// Standing advice attached to every analysis.
pub fn default_recommendations() -> Vec<String> {
    vec![
        "记录症状的发生时间和严重程度".to_string(),
        "保持充足的休息和睡眠".to_string(),
        "注意饮食健康，多喝水".to_string(),
        "如症状持续或加重，请及时就医".to_string(),
    ]
}

/// Full symptom-analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct SymptomAnalysis {
    pub diagnosis_advice: String,
    pub urgency: UrgencyAssessment,
    pub recommendations: Vec<String>,
    pub risk: RiskAssessment,
    pub model_used: String,
}

/// Static advice surfaced when the analysis service is unavailable.
pub const SYMPTOM_FALLBACK_ADVICE: &str = "请记录症状详情，如症状持续或加重请及时就医";

/// Assemble the analysis from the cleaned model advice and the symptom
/// input.
pub fn parse_symptom_response(
    advice: &str,
    symptoms: &str,
    model_used: &str,
) -> SymptomAnalysis {
    let urgency = classify_urgency(symptoms);
    let risk = risk_for(urgency.level);
    SymptomAnalysis {
        diagnosis_advice: advice.to_string(),
        urgency,
        recommendations: default_recommendations(),
        risk,
        model_used: model_used.to_string(),
    }
}
