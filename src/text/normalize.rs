//! Markdown-artifact stripping for model replies.
//!
//! Models decorate replies with headings, bold markers, list bullets, and
//! code fences regardless of instructions. `to_plain_text` flattens all of
//! it to plain prose; `strip_code_fences` unwraps fenced JSON payloads
//! before parsing.

use regex::Regex;

/// Strip markdown decoration, keeping the inner text.
///
/// Removes heading markers, `**bold**` markers (inner text kept), leading
/// list/blockquote markers, horizontal-rule lines, and backticks; trims
/// every line and collapses runs of blank lines to one. Idempotent —
/// applying it twice yields the same result as once.
pub fn to_plain_text(text: &str) -> String {
    let heading = Regex::new(r"(?m)^\s*#{1,6}\s*").expect("static regex");
    let bold = Regex::new(r"\*\*(.*?)\*\*").expect("static regex");
    let list_marker = Regex::new(r"(?m)^[\s>*•-]+").expect("static regex");
    let rule_line = Regex::new(r"\n[-*_]{3,}\n").expect("static regex");

    let t = heading.replace_all(text, "");
    let t = bold.replace_all(&t, "$1");
    let t = list_marker.replace_all(&t, "");
    let t = rule_line.replace_all(&t, "\n");
    let t = t.replace('`', "");

    // Trim each line, collapse consecutive blank lines to one.
    let mut out: Vec<&str> = Vec::new();
    let mut prev_blank = false;
    for line in t.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_blank {
                out.push("");
            }
            prev_blank = true;
        } else {
            out.push(line);
            prev_blank = false;
        }
    }
    out.join("\n").trim().to_string()
}

/// Unwrap a reply that is fully fenced in triple backticks, dropping an
/// optional leading `json` language tag (case-insensitive) and a bare
/// leading `json` token. No-op on already-plain text.
pub fn strip_code_fences(text: &str) -> String {
    let json_tag = Regex::new(r"(?i)^json\s*").expect("static regex");

    let mut t = text.trim().to_string();
    if t.starts_with("```") && t.ends_with("```") {
        t = t.trim_matches('`').to_string();
        t = json_tag.replace(&t, "").trim().to_string();
    }
    json_tag.replace(&t, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_headings_and_bold() {
        let input = "## 分析结果\n**发热**可能由感染引起";
        assert_eq!(to_plain_text(input), "分析结果\n发热可能由感染引起");
    }

    #[test]
    fn strips_list_and_quote_markers() {
        let input = "- 第一条建议\n* 第二条建议\n> 引用内容\n• 第三条";
        assert_eq!(
            to_plain_text(input),
            "第一条建议\n第二条建议\n引用内容\n第三条"
        );
    }

    #[test]
    fn removes_rule_lines_and_backticks() {
        let input = "上文\n---\n下文 `代码`";
        let out = to_plain_text(input);
        assert!(!out.contains("---"));
        assert!(!out.contains('`'));
        assert!(out.contains("代码"));
    }

    #[test]
    fn no_blank_runs_survive() {
        let input = "第一段\n\n\n\n第二段";
        let out = to_plain_text(input);
        assert!(!out.contains("\n\n\n"));
        assert!(out.starts_with("第一段"));
        assert!(out.ends_with("第二段"));
    }

    #[test]
    fn plain_text_idempotent() {
        let inputs = [
            "## 标题\n**加粗** 内容\n- 列表\n\n\n> 引用\n---\n`代码`",
            "已经是纯文本",
            "",
            "1. 有序列表\n2. 第二项",
            "混合 **bold** 与 `code` 以及\n\n#### 深层标题",
        ];
        for input in inputs {
            let once = to_plain_text(input);
            let twice = to_plain_text(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn unwraps_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn unwraps_plain_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn fence_language_tag_case_insensitive() {
        let fenced = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_leading_json_token() {
        assert_eq!(strip_code_fences("json {\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn noop_on_plain_text() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("无围栏文本"), "无围栏文本");
    }
}
