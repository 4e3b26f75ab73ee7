//! TCM (traditional Chinese medicine) response parsing.
//!
//! The vision task asks the model for a strict JSON schema (face / tongue /
//! zangfu / syndromes / treatment / lifestyle); when the reply honors it the
//! typed result is filled directly. When it doesn't, the parser degrades to
//! keyword-section extraction over the prose — and when even that finds
//! nothing, the raw content is surfaced as a general analysis.

use serde::{Deserialize, Serialize};

use crate::text::extract_json;

/// Sentinel returned when no section matches the keywords.
pub const NO_ANALYSIS_SENTINEL: &str = "暂无相关分析";

/// Sentinel suggestion when none could be harvested.
pub const DEFAULT_SUGGESTION: &str = "请咨询专业中医师获得个性化建议";

/// Suggestion surfaced with degraded (non-JSON) vision replies.
const CONSULT_SUGGESTION: &str = "请咨询专业中医师获得更详细的诊断";

// ═══════════════════════════════════════════════════════════
// Section / suggestion extraction
// ═══════════════════════════════════════════════════════════

/// Extract the passage around the first line containing any keyword:
/// that line, then subsequent non-heading, non-empty lines, until a blank
/// line or heading-like line. Returns the sentinel when nothing matches.
pub fn extract_section(content: &str, keywords: &[&str]) -> String {
    let mut relevant: Vec<&str> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if keywords.iter().any(|k| line.contains(k)) {
            relevant.push(line);
            continue;
        }
        if relevant.is_empty() {
            continue;
        }
        let heading_like = line.starts_with("##")
            || line.starts_with("**")
            || line.starts_with("1.")
            || line.starts_with("2.")
            || line.starts_with("3.");
        if !line.is_empty() && !heading_like {
            relevant.push(line);
        } else if line.is_empty() || line.starts_with("##") || line.starts_with("**") {
            break;
        }
    }

    let result = relevant.join(" ").trim().to_string();
    if result.is_empty() {
        NO_ANALYSIS_SENTINEL.to_string()
    } else {
        result
    }
}

/// Harvest up to five suggestion lines (triggered by 建议/调理/注意/养生),
/// stripping list numbering; sentinel default when nothing found.
pub fn extract_suggestions(content: &str) -> Vec<String> {
    const TRIGGERS: [&str; 4] = ["建议", "调理", "注意", "养生"];

    let mut suggestions: Vec<String> = Vec::new();
    let mut in_suggestions = false;

    for line in content.lines() {
        let line = line.trim();
        if TRIGGERS.iter().any(|t| line.contains(t)) {
            in_suggestions = true;
            match line.split_once('：') {
                Some((_, rest)) => suggestions.push(rest.trim().to_string()),
                None => suggestions.push(line.to_string()),
            }
        } else if in_suggestions && !line.is_empty() {
            if line.starts_with("##") || line.starts_with("**") {
                break;
            }
            let stripped = line.trim_start_matches(['1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', '•', ' ']);
            suggestions.push(stripped.trim().to_string());
        }
    }

    suggestions.retain(|s| !s.is_empty());
    suggestions.truncate(5);
    if suggestions.is_empty() {
        vec![DEFAULT_SUGGESTION.to_string()]
    } else {
        suggestions
    }
}

// ═══════════════════════════════════════════════════════════
// Vision analysis
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcmImageKind {
    Face,
    Tongue,
}

/// One caller-supplied diagnostic image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcmImage {
    pub kind: TcmImageKind,
    /// `data:image/...;base64,...`
    pub data_url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub analysis: String,
    pub constitution: String,
    pub complexion: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TongueAnalysis {
    pub analysis: String,
    pub constitution: String,
    pub body_color: String,
    pub body_shape: String,
    pub coating_color: String,
    pub coating_thickness: String,
    pub moisture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZangfuAssessment {
    #[serde(default)]
    pub liver: String,
    #[serde(default)]
    pub heart: String,
    #[serde(default)]
    pub spleen: String,
    #[serde(default)]
    pub lung: String,
    #[serde(default)]
    pub kidney: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Syndrome {
    pub name: String,
    #[serde(default)]
    pub basis: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentAdvice {
    #[serde(default)]
    pub principle: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub acupoints: Vec<String>,
    #[serde(default)]
    pub herbal: Vec<String>,
}

/// Structured TCM vision result — JSON-schema fields when the model
/// complied, keyword-extracted text otherwise, raw prose as a last resort.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TcmVisionAnalysis {
    pub face: Option<FaceAnalysis>,
    pub tongue: Option<TongueAnalysis>,
    pub zangfu: Option<ZangfuAssessment>,
    pub syndromes: Vec<Syndrome>,
    pub treatment: Option<TreatmentAdvice>,
    pub suggestions: Vec<String>,
    pub general_analysis: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTcmVision {
    face: Option<RawFace>,
    tongue: Option<TongueAnalysis>,
    zangfu: Option<ZangfuAssessment>,
    #[serde(default)]
    syndromes: Vec<Syndrome>,
    treatment: Option<TreatmentAdvice>,
    lifestyle: Option<RawLifestyle>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFace {
    #[serde(default)]
    complexion: String,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    constitution: String,
    #[serde(default)]
    analysis: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawLifestyle {
    #[serde(default)]
    diet: Vec<String>,
    #[serde(default)]
    exercise: Vec<String>,
    #[serde(default)]
    sleep: Vec<String>,
    #[serde(default)]
    emotion: Vec<String>,
}

/// Parse a vision reply: strict JSON first, keyword extraction second,
/// raw prose last.
pub fn parse_tcm_vision_response(content: &str, images: &[TcmImage]) -> TcmVisionAnalysis {
    if let Some(map) = extract_json(content) {
        if let Ok(raw) = serde_json::from_value::<RawTcmVision>(serde_json::Value::Object(map)) {
            let face = raw.face.map(|f| FaceAnalysis {
                // Analysis text falls back to the complexion description
                analysis: if f.analysis.is_empty() {
                    f.complexion.clone()
                } else {
                    f.analysis
                },
                constitution: f.constitution,
                complexion: f.complexion,
                features: f.features,
            });
            let suggestions = raw
                .lifestyle
                .map(|lf| {
                    [lf.diet, lf.exercise, lf.sleep, lf.emotion]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            return TcmVisionAnalysis {
                face,
                tongue: raw.tongue,
                zangfu: raw.zangfu,
                syndromes: raw.syndromes,
                treatment: raw.treatment,
                suggestions,
                general_analysis: None,
            };
        }
    }

    // Degraded path: keyword extraction per supplied image kind.
    let mut result = TcmVisionAnalysis::default();
    if images.iter().any(|i| i.kind == TcmImageKind::Face) {
        result.face = Some(FaceAnalysis {
            analysis: extract_section(content, &["面诊", "面色", "气色"]),
            constitution: extract_section(content, &["体质", "面诊体质"]),
            ..FaceAnalysis::default()
        });
    }
    if images.iter().any(|i| i.kind == TcmImageKind::Tongue) {
        result.tongue = Some(TongueAnalysis {
            analysis: extract_section(content, &["舌诊", "舌象", "舌质", "舌苔"]),
            constitution: extract_section(content, &["体质", "舌诊体质"]),
            ..TongueAnalysis::default()
        });
    }

    if result.face.is_none() && result.tongue.is_none() {
        result.general_analysis = Some(content.to_string());
    }
    result.suggestions = if result.general_analysis.is_some() {
        vec![CONSULT_SUGGESTION.to_string()]
    } else {
        extract_suggestions(content)
    };
    result
}

// ═══════════════════════════════════════════════════════════
// Inquiry / pulse analyses
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcmInquiryAnalysis {
    pub syndrome_differentiation: String,
    pub constitution_type: String,
    pub treatment_principle: String,
    pub herbal_formula: String,
    pub lifestyle_suggestions: Vec<String>,
    pub follow_up: String,
}

/// Keyword-section interpretation of an inquiry reply.
pub fn parse_tcm_inquiry_response(content: &str) -> TcmInquiryAnalysis {
    TcmInquiryAnalysis {
        syndrome_differentiation: extract_section(content, &["辨证", "证候", "诊断"]),
        constitution_type: extract_section(content, &["体质", "体质类型"]),
        treatment_principle: extract_section(content, &["治疗原则", "治则", "治法"]),
        herbal_formula: extract_section(content, &["方剂", "药方", "中药"]),
        lifestyle_suggestions: extract_suggestions(content),
        follow_up: extract_section(content, &["复诊", "随访", "注意事项"]),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcmPulseAnalysis {
    pub pulse_analysis: String,
    pub constitution_assessment: String,
    pub health_status: String,
    pub treatment_suggestions: Vec<String>,
    pub meridian_status: String,
    pub follow_up_advice: String,
}

/// Keyword-section interpretation of a pulse reading reply.
pub fn parse_tcm_pulse_response(content: &str) -> TcmPulseAnalysis {
    TcmPulseAnalysis {
        pulse_analysis: extract_section(content, &["脉象分析", "脉诊", "脉象"]),
        constitution_assessment: extract_section(content, &["体质", "体质评估"]),
        health_status: extract_section(content, &["健康状况", "病理", "状态"]),
        treatment_suggestions: extract_suggestions(content),
        meridian_status: extract_section(content, &["经络", "气血", "经脉"]),
        follow_up_advice: extract_section(content, &["建议", "注意", "调理"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_image() -> TcmImage {
        TcmImage {
            kind: TcmImageKind::Face,
            data_url: "data:image/jpeg;base64,AAAA".into(),
            description: String::new(),
        }
    }

    fn tongue_image() -> TcmImage {
        TcmImage {
            kind: TcmImageKind::Tongue,
            data_url: "data:image/jpeg;base64,BBBB".into(),
            description: String::new(),
        }
    }

    // ── extract_section ──

    #[test]
    fn section_starts_at_keyword_line() {
        let content = "开场白\n舌诊分析：舌质偏红\n苔薄白\n\n其他内容";
        let section = extract_section(content, &["舌诊", "舌象"]);
        assert!(section.contains("舌质偏红"));
        assert!(section.contains("苔薄白"));
        assert!(!section.contains("其他内容"));
    }

    #[test]
    fn section_stops_at_heading() {
        let content = "面色萎黄\n气血不足\n## 下一节\n不应包含";
        let section = extract_section(content, &["面色"]);
        assert!(section.contains("气血不足"));
        assert!(!section.contains("不应包含"));
    }

    #[test]
    fn missing_section_returns_sentinel() {
        assert_eq!(extract_section("毫无相关内容", &["脉象"]), NO_ANALYSIS_SENTINEL);
        assert_eq!(extract_section("", &["脉象"]), NO_ANALYSIS_SENTINEL);
    }

    // ── extract_suggestions ──

    #[test]
    fn suggestions_harvested_and_capped() {
        let content = "调理建议：\n1. 早睡早起\n2. 清淡饮食\n3. 适量运动\n4. 保持心情舒畅\n5. 避免熬夜\n6. 多饮温水";
        let suggestions = extract_suggestions(content);
        assert_eq!(suggestions.len(), 5);
        assert!(suggestions.iter().any(|s| s == "早睡早起"));
    }

    #[test]
    fn suggestions_default_sentinel() {
        assert_eq!(
            extract_suggestions("没有任何相关内容"),
            vec![DEFAULT_SUGGESTION.to_string()]
        );
    }

    // ── vision parsing ──

    #[test]
    fn structured_json_reply_fills_typed_fields() {
        let reply = r#"```json
{
  "face": {"complexion": "面色偏黄", "features": ["眼袋明显"], "constitution": "气虚质", "analysis": "气血不足之象"},
  "tongue": {"bodyColor": "淡红", "bodyShape": "胖大", "coatingColor": "白", "coatingThickness": "薄", "moisture": "润", "constitution": "痰湿质", "analysis": "脾虚湿盛"},
  "zangfu": {"liver": "正常", "heart": "正常", "spleen": "偏弱", "lung": "正常", "kidney": "正常"},
  "syndromes": [{"name": "脾气虚", "basis": ["面色偏黄", "舌胖大"]}],
  "treatment": {"principle": "健脾益气", "formula": "四君子汤", "acupoints": ["足三里"], "herbal": ["党参"]},
  "lifestyle": {"diet": ["少食生冷"], "exercise": ["八段锦"], "sleep": ["子时前入睡"], "emotion": ["戒怒"]}
}
```"#;
        let analysis = parse_tcm_vision_response(reply, &[face_image(), tongue_image()]);
        let face = analysis.face.unwrap();
        assert_eq!(face.analysis, "气血不足之象");
        assert_eq!(face.complexion, "面色偏黄");
        let tongue = analysis.tongue.unwrap();
        assert_eq!(tongue.body_color, "淡红");
        assert_eq!(analysis.syndromes[0].name, "脾气虚");
        assert_eq!(analysis.zangfu.unwrap().spleen, "偏弱");
        // Lifestyle flattened into one suggestion list
        assert_eq!(analysis.suggestions.len(), 4);
        assert!(analysis.general_analysis.is_none());
    }

    #[test]
    fn face_analysis_falls_back_to_complexion() {
        let reply = r#"{"face": {"complexion": "面色红润", "features": [], "constitution": "", "analysis": ""}}"#;
        let analysis = parse_tcm_vision_response(reply, &[face_image()]);
        assert_eq!(analysis.face.unwrap().analysis, "面色红润");
    }

    #[test]
    fn prose_reply_degrades_to_keyword_extraction() {
        let reply = "面诊所见：面色萎黄\n体质偏气虚\n\n调理建议：规律作息";
        let analysis = parse_tcm_vision_response(reply, &[face_image()]);
        let face = analysis.face.unwrap();
        assert!(face.analysis.contains("面色萎黄"));
        assert!(analysis.tongue.is_none());
        assert!(analysis.suggestions.iter().any(|s| s.contains("规律作息")));
    }

    #[test]
    fn unmatched_prose_becomes_general_analysis() {
        let reply = "图片过于模糊，无法进行判断。";
        let analysis = parse_tcm_vision_response(reply, &[]);
        assert_eq!(analysis.general_analysis.as_deref(), Some(reply));
        assert_eq!(analysis.suggestions, vec![CONSULT_SUGGESTION.to_string()]);
    }

    // ── inquiry / pulse ──

    #[test]
    fn inquiry_reply_maps_to_typed_sections() {
        let content = "辨证：脾胃虚寒\n治法：温中散寒\n方剂：理中汤加减\n复诊：两周后复诊";
        let analysis = parse_tcm_inquiry_response(content);
        assert!(analysis.syndrome_differentiation.contains("脾胃虚寒"));
        assert!(analysis.treatment_principle.contains("温中散寒"));
        assert!(analysis.herbal_formula.contains("理中汤"));
        assert!(analysis.follow_up.contains("两周后"));
    }

    #[test]
    fn pulse_reply_maps_to_typed_sections() {
        let content = "脉象分析：脉细弱\n体质评估：气血两虚\n经络：气血运行不畅";
        let analysis = parse_tcm_pulse_response(content);
        assert!(analysis.pulse_analysis.contains("脉细弱"));
        assert!(analysis.constitution_assessment.contains("气血两虚"));
        assert!(analysis.meridian_status.contains("不畅"));
    }

    #[test]
    fn empty_reply_yields_sentinels() {
        let analysis = parse_tcm_inquiry_response("");
        assert_eq!(analysis.syndrome_differentiation, NO_ANALYSIS_SENTINEL);
        assert_eq!(
            analysis.lifestyle_suggestions,
            vec![DEFAULT_SUGGESTION.to_string()]
        );
    }
}
