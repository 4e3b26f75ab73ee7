//! Diagnosis-summary normalization.
//!
//! The diagnosis-chat contract promises `<h3>`-sectioned HTML, but models
//! frequently answer in loosely formatted text with stray `>` markers.
//! `normalize_summary_html` rebuilds the structure by matching lines against
//! the fixed section-title vocabulary; text that is already HTML passes
//! through untouched.

use regex::Regex;

use super::normalize::{strip_code_fences, to_plain_text};

/// Section titles recognized when rebuilding a loosely formatted summary.
pub const SUMMARY_SECTION_TITLES: [&str; 9] = [
    "要点",
    "可能诊断",
    "建议",
    "下一步建议",
    "需要警惕",
    "体格检查",
    "辅助检查",
    "初步诊断",
    "诊疗计划",
];

/// Normalize a possibly plain-text summary into `<h3>`-sectioned HTML.
pub fn normalize_summary_html(raw: &str) -> String {
    let stray_marker = Regex::new(r"^\s*(?:\d+>\s*|>\s*)").expect("static regex");

    let txt = strip_code_fences(raw);
    let lines: Vec<String> = txt
        .lines()
        .map(|ln| stray_marker.replace(ln, "").trim().to_string())
        .collect();
    let text = lines.join("\n");

    // Already HTML — pass through.
    if text.contains("<h3") || text.contains("<p") || text.contains("<ul") || text.contains("<ol")
    {
        return text;
    }

    let mut sections: Vec<String> = Vec::new();
    let mut title: Option<String> = None;
    let mut current: Vec<String> = Vec::new();

    fn push_section(sections: &mut Vec<String>, title: &mut Option<String>, current: &mut Vec<String>) {
        if let Some(t) = title.take() {
            sections.push(format!("<h3>{t}</h3>"));
        }
        if !current.is_empty() {
            let body = current
                .drain(..)
                .filter(|c| !c.is_empty())
                .map(|c| c.replace('\u{0000}', ""))
                .collect::<Vec<_>>()
                .join("</p><p>");
            sections.push(format!("<p>{body}</p>"));
        }
    }

    for ln in text.lines() {
        if SUMMARY_SECTION_TITLES.contains(&ln) {
            push_section(&mut sections, &mut title, &mut current);
            title = Some(ln.to_string());
        } else if !ln.is_empty() {
            current.push(ln.to_string());
        }
    }
    push_section(&mut sections, &mut title, &mut current);

    if sections.is_empty() {
        to_plain_text(&text)
    } else {
        sections.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_known_titles() {
        let raw = "要点\n持续发热两天\n可能诊断\n上呼吸道感染\n建议\n多饮水，注意休息";
        let html = normalize_summary_html(raw);
        assert!(html.contains("<h3>要点</h3>"));
        assert!(html.contains("<p>持续发热两天</p>"));
        assert!(html.contains("<h3>可能诊断</h3>"));
        assert!(html.contains("<h3>建议</h3>"));
        assert!(html.contains("<p>多饮水，注意休息</p>"));
    }

    #[test]
    fn existing_html_passes_through() {
        let raw = "<h3>要点</h3><p>已是HTML</p>";
        assert_eq!(normalize_summary_html(raw), raw);
    }

    #[test]
    fn strips_stray_line_markers() {
        let raw = "3> 要点\n> 持续发热";
        let html = normalize_summary_html(raw);
        assert_eq!(html, "<h3>要点</h3><p>持续发热</p>");
    }

    #[test]
    fn unsectioned_text_becomes_single_paragraph() {
        let raw = "没有任何小节标题的一段话";
        let html = normalize_summary_html(raw);
        assert_eq!(html, "<p>没有任何小节标题的一段话</p>");
    }

    #[test]
    fn fenced_summary_unwrapped() {
        let raw = "```\n要点\n发热待查\n```";
        let html = normalize_summary_html(raw);
        assert!(html.contains("<h3>要点</h3>"));
        assert!(html.contains("<p>发热待查</p>"));
    }

    #[test]
    fn multiline_body_joined_as_paragraphs() {
        let raw = "建议\n第一条\n第二条";
        let html = normalize_summary_html(raw);
        assert_eq!(html, "<h3>建议</h3><p>第一条</p><p>第二条</p>");
    }
}
