//! Per-use-case response interpreters.
//!
//! Each parser is a pure function from raw text to a guaranteed-shape
//! result, built on keyword/section heuristics — not a general NLP pass.
//! Parsers never raise on malformed input: they degrade to sentinels,
//! defaults, or the untyped fallback variant.

pub mod diagnosis;
pub mod drug;
pub mod emergency;
pub mod tcm;
pub mod triage;

pub use diagnosis::{parse_diagnosis_reply, DiagnosisChatResult, DEFAULT_FOLLOW_UP_QUESTION};
pub use drug::{fallback_drugs, parse_drug_response, DrugEntry, DrugRecommendation};
pub use emergency::{classify_emergency_reply, fallback_assessment, EmergencyAssessment};
pub use tcm::{
    extract_section, extract_suggestions, parse_tcm_inquiry_response, parse_tcm_pulse_response,
    parse_tcm_vision_response, TcmImage, TcmImageKind, TcmInquiryAnalysis, TcmPulseAnalysis,
    TcmVisionAnalysis, NO_ANALYSIS_SENTINEL,
};
pub use triage::{
    classify_urgency, default_recommendations, parse_symptom_response, RiskAssessment,
    SymptomAnalysis, UrgencyAssessment, UrgencyLevel,
};
