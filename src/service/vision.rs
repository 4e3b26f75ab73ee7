//! Vision-task kind resolution and message assembly.

use serde::{Deserialize, Serialize};

use crate::completion::{ChatMessage, ContentPart, ImageUrl};

/// The three supported image-analysis tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionKind {
    /// Drug packaging / bottle.
    Drug,
    /// Lab or imaging report.
    Report,
    /// Skin / wound photo.
    Skin,
}

/// Resolve a caller-supplied kind string, tolerating common aliases.
/// Anything unrecognized resolves to `Skin`.
pub fn resolve_vision_kind(raw: &str) -> VisionKind {
    match raw.trim().to_lowercase().as_str() {
        "drug" | "medicine" | "med" | "pill" | "box" => VisionKind::Drug,
        "report" | "exam" | "check" | "lab" | "检验单" | "检验" | "检查" => VisionKind::Report,
        _ => VisionKind::Skin,
    }
}

/// Result of one vision analysis. The HTML is returned as generated — the
/// front-end renders it directly, so no markdown cleanup is applied.
#[derive(Debug, Clone, Serialize)]
pub struct VisionAnalysis {
    pub kind: VisionKind,
    pub html: String,
    pub model_used: String,
}

/// Assemble the multimodal message pair for a vision task.
pub fn build_vision_messages(
    task_prompt: &str,
    image_data_url: &str,
    note: &str,
) -> Vec<ChatMessage> {
    let mut user_text = "请基于该图片完成上面的结构化分析，并直接以HTML输出。".to_string();
    if !note.trim().is_empty() {
        user_text.push_str(&format!("\n补充说明：{}", note.trim()));
    }

    vec![
        ChatMessage::system(task_prompt),
        ChatMessage::user_parts(vec![
            ContentPart::Text { text: user_text },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_data_url.to_string(),
                },
            },
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{MessageContent, Role};

    #[test]
    fn pill_resolves_to_drug() {
        assert_eq!(resolve_vision_kind("pill"), VisionKind::Drug);
        assert_eq!(resolve_vision_kind("medicine"), VisionKind::Drug);
        assert_eq!(resolve_vision_kind("BOX"), VisionKind::Drug);
    }

    #[test]
    fn chinese_report_aliases_resolve_to_report() {
        assert_eq!(resolve_vision_kind("检验"), VisionKind::Report);
        assert_eq!(resolve_vision_kind("检验单"), VisionKind::Report);
        assert_eq!(resolve_vision_kind("lab"), VisionKind::Report);
    }

    #[test]
    fn unrecognized_kind_defaults_to_skin() {
        assert_eq!(resolve_vision_kind("auto"), VisionKind::Skin);
        assert_eq!(resolve_vision_kind(""), VisionKind::Skin);
        assert_eq!(resolve_vision_kind("随便"), VisionKind::Skin);
    }

    #[test]
    fn messages_carry_system_prompt_and_image() {
        let messages = build_vision_messages("任务提示", "data:image/png;base64,AA", "左臂");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        match &messages[1].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                match &parts[0] {
                    ContentPart::Text { text } => assert!(text.contains("补充说明：左臂")),
                    other => panic!("expected text part, got {other:?}"),
                }
                match &parts[1] {
                    ContentPart::ImageUrl { image_url } => {
                        assert_eq!(image_url.url, "data:image/png;base64,AA")
                    }
                    other => panic!("expected image part, got {other:?}"),
                }
            }
            other => panic!("expected parts content, got {other:?}"),
        }
    }

    #[test]
    fn empty_note_omitted() {
        let messages = build_vision_messages("提示", "data:image/png;base64,AA", "  ");
        match &messages[1].content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::Text { text } => assert!(!text.contains("补充说明")),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
