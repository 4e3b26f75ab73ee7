//! Diagnosis-chat reply router.
//!
//! The model is asked for a strict JSON envelope with a `status`
//! discriminator: `ask` (one follow-up question) or `final` (structured
//! summary). Replies that are not valid JSON are deliberately treated as a
//! final summary — a designed lossy degradation, surfaced as the distinct
//! `Unparsed` variant so callers can tell the two apart.

use serde::{Deserialize, Serialize};

use crate::text::{extract_json, normalize_summary_html, to_plain_text};

/// Asked when the model signals `ask` without supplying a question.
pub const DEFAULT_FOLLOW_UP_QUESTION: &str =
    "为了更了解您的情况，您能再补充一下症状的持续时间和严重程度吗？";

/// Outcome of one diagnosis-chat turn. Stateless server-side — the caller
/// supplies the conversation history on every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiagnosisChatResult {
    /// The model needs more information.
    Ask { question: String },
    /// Terminal state: structured summary.
    Final {
        summary_html: String,
        next_steps: Vec<String>,
        red_flags: Vec<String>,
    },
    /// The reply bypassed the JSON contract; its cleaned text is served as
    /// the summary.
    Unparsed { summary_html: String },
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Route a raw diagnosis-chat reply into the typed result.
pub fn parse_diagnosis_reply(content: &str) -> DiagnosisChatResult {
    let Some(map) = extract_json(content) else {
        return DiagnosisChatResult::Unparsed {
            summary_html: normalize_summary_html(&to_plain_text(content)),
        };
    };

    match map.get("status").and_then(|v| v.as_str()) {
        Some("ask") => {
            let question = map
                .get("ask")
                .and_then(|v| v.get("question"))
                .and_then(|v| v.as_str())
                .filter(|q| !q.trim().is_empty())
                .map(to_plain_text)
                .unwrap_or_else(|| DEFAULT_FOLLOW_UP_QUESTION.to_string());
            DiagnosisChatResult::Ask { question }
        }
        // Any other status (including a missing one) is treated as final.
        _ => {
            let final_obj = map.get("final");
            let summary = final_obj
                .and_then(|v| v.get("summary_html"))
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| to_plain_text(content));
            DiagnosisChatResult::Final {
                summary_html: normalize_summary_html(&summary),
                next_steps: string_list(final_obj.and_then(|v| v.get("next_steps"))),
                red_flags: string_list(final_obj.and_then(|v| v.get("red_flags"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_status_surfaces_question() {
        let reply = r#"{"status": "ask", "ask": {"question": "症状持续多久了？"}}"#;
        assert_eq!(
            parse_diagnosis_reply(reply),
            DiagnosisChatResult::Ask {
                question: "症状持续多久了？".to_string()
            }
        );
    }

    #[test]
    fn ask_without_question_uses_default() {
        let reply = r#"{"status": "ask", "ask": {}}"#;
        match parse_diagnosis_reply(reply) {
            DiagnosisChatResult::Ask { question } => {
                assert_eq!(question, DEFAULT_FOLLOW_UP_QUESTION)
            }
            other => panic!("expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn final_status_normalizes_summary() {
        let reply = r#"{"status": "final", "final": {"summary_html": "要点\n发热两天", "next_steps": ["多饮水"], "red_flags": ["持续高热"]}}"#;
        match parse_diagnosis_reply(reply) {
            DiagnosisChatResult::Final {
                summary_html,
                next_steps,
                red_flags,
            } => {
                assert!(summary_html.contains("<h3>要点</h3>"));
                assert_eq!(next_steps, vec!["多饮水"]);
                assert_eq!(red_flags, vec!["持续高热"]);
            }
            other => panic!("expected Final, got {other:?}"),
        }
    }

    #[test]
    fn final_html_summary_passes_through() {
        let reply = r#"{"status": "final", "final": {"summary_html": "<h3>要点</h3><p>已结构化</p>"}}"#;
        match parse_diagnosis_reply(reply) {
            DiagnosisChatResult::Final { summary_html, next_steps, red_flags } => {
                assert_eq!(summary_html, "<h3>要点</h3><p>已结构化</p>");
                assert!(next_steps.is_empty());
                assert!(red_flags.is_empty());
            }
            other => panic!("expected Final, got {other:?}"),
        }
    }

    #[test]
    fn fenced_json_accepted() {
        let reply = "```json\n{\"status\": \"ask\", \"ask\": {\"question\": \"哪里疼？\"}}\n```";
        assert!(matches!(
            parse_diagnosis_reply(reply),
            DiagnosisChatResult::Ask { .. }
        ));
    }

    #[test]
    fn unknown_status_treated_as_final() {
        let reply = r#"{"status": "summary", "final": {"summary_html": "<p>内容</p>"}}"#;
        assert!(matches!(
            parse_diagnosis_reply(reply),
            DiagnosisChatResult::Final { .. }
        ));
    }

    #[test]
    fn non_json_reply_becomes_unparsed_summary() {
        let reply = "## 初步判断\n考虑**上呼吸道感染**，建议多休息。";
        match parse_diagnosis_reply(reply) {
            DiagnosisChatResult::Unparsed { summary_html } => {
                assert!(!summary_html.contains("##"));
                assert!(!summary_html.contains("**"));
                assert!(summary_html.contains("上呼吸道感染"));
            }
            other => panic!("expected Unparsed, got {other:?}"),
        }
    }

    #[test]
    fn result_serializes_with_mode_tag() {
        let json = serde_json::to_value(DiagnosisChatResult::Ask {
            question: "q".into(),
        })
        .unwrap();
        assert_eq!(json["mode"], "ask");

        let json = serde_json::to_value(DiagnosisChatResult::Unparsed {
            summary_html: "<p>x</p>".into(),
        })
        .unwrap();
        assert_eq!(json["mode"], "unparsed");
    }
}
