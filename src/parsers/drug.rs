//! Drug-recommendation envelope.
//!
//! The model's advice is free prose; the envelope keeps a fixed shape with
//! static safety warnings. No structured dosages are extracted — the advice
//! text carries them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub indication: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrugRecommendation {
    pub recommended_drugs: Vec<DrugEntry>,
    pub detailed_advice: String,
    pub warnings: Vec<String>,
    pub model_used: String,
}

/// Static warnings attached to every recommendation.
pub const DRUG_WARNINGS: [&str; 3] = [
    "请在医生指导下使用",
    "注意药物相互作用",
    "遵循说明书用药",
];

/// Wrap the model's advice text in the fixed envelope.
pub fn parse_drug_response(advice: &str, model_used: &str) -> DrugRecommendation {
    DrugRecommendation {
        recommended_drugs: vec![DrugEntry {
            name: "根据AI建议".to_string(),
            dosage: "详见AI分析".to_string(),
            frequency: "按医嘱".to_string(),
            indication: "对症治疗".to_string(),
        }],
        detailed_advice: advice.to_string(),
        warnings: DRUG_WARNINGS.iter().map(|w| w.to_string()).collect(),
        model_used: model_used.to_string(),
    }
}

/// Conservative OTC fallback surfaced when the service is unavailable.
pub fn fallback_drugs() -> Vec<DrugEntry> {
    vec![DrugEntry {
        name: "对乙酰氨基酚".to_string(),
        dosage: "500mg".to_string(),
        frequency: "每6-8小时一次".to_string(),
        indication: "退热止痛".to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_advice_and_static_warnings() {
        let rec = parse_drug_response("布洛芬缓释胶囊，饭后服用", "qwen-plus");
        assert_eq!(rec.detailed_advice, "布洛芬缓释胶囊，饭后服用");
        assert_eq!(rec.warnings.len(), 3);
        assert!(rec.warnings.contains(&"请在医生指导下使用".to_string()));
        assert_eq!(rec.recommended_drugs.len(), 1);
    }

    #[test]
    fn fallback_is_acetaminophen() {
        let drugs = fallback_drugs();
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].name, "对乙酰氨基酚");
        assert_eq!(drugs[0].dosage, "500mg");
    }
}
