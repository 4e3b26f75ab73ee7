//! Section-level surgery on record HTML fragments.
//!
//! A section is a `<h3>标题</h3>` header plus everything up to the next
//! `<h3>` (or end of fragment). Helpers here locate, replace, insert, and
//! append sections without touching the rest of the fragment.

use regex::Regex;

pub const SECTION_CHIEF_COMPLAINT: &str = "主诉";
pub const SECTION_PRESENT_ILLNESS: &str = "现病史";
pub const SECTION_PAST_HISTORY: &str = "既往史";
pub const SECTION_ALLERGY_HISTORY: &str = "过敏史";
pub const SECTION_PHYSICAL_EXAM: &str = "体格检查";
pub const SECTION_AUXILIARY_EXAM: &str = "辅助检查";
pub const SECTION_DIAGNOSIS: &str = "初步诊断";
pub const SECTION_TREATMENT_PLAN: &str = "诊疗计划";

/// The eight record sections, in their fixed output order.
pub const SECTION_TITLES: [&str; 8] = [
    SECTION_CHIEF_COMPLAINT,
    SECTION_PRESENT_ILLNESS,
    SECTION_PAST_HISTORY,
    SECTION_ALLERGY_HISTORY,
    SECTION_PHYSICAL_EXAM,
    SECTION_AUXILIARY_EXAM,
    SECTION_DIAGNOSIS,
    SECTION_TREATMENT_PLAN,
];

fn heading_regex(title: &str) -> Regex {
    Regex::new(&format!(r"<h3>\s*{}\s*</h3>", regex::escape(title))).expect("static regex")
}

/// Span of one section: (heading start, body start, body end).
fn section_span(html: &str, title: &str) -> Option<(usize, usize, usize)> {
    let m = heading_regex(title).find(html)?;
    let body_start = m.end();
    let body_end = html[body_start..]
        .find("<h3>")
        .map(|i| body_start + i)
        .unwrap_or(html.len());
    Some((m.start(), body_start, body_end))
}

/// Does the fragment carry this section header?
pub fn has_section(html: &str, title: &str) -> bool {
    heading_regex(title).is_match(html)
}

/// Body of a section (between its header and the next `<h3>`), if present.
pub fn section_body(html: &str, title: &str) -> Option<String> {
    let (_, body_start, body_end) = section_span(html, title)?;
    Some(html[body_start..body_end].to_string())
}

/// Replace a section's body, keeping the header. No-op when the section is
/// absent.
pub fn replace_section_body(html: &str, title: &str, body: &str) -> String {
    match section_span(html, title) {
        Some((_, body_start, body_end)) => {
            format!("{}{}{}", &html[..body_start], body, &html[body_end..])
        }
        None => html.to_string(),
    }
}

/// Append a section (header + body) at the end of the fragment.
pub fn append_section(html: &str, title: &str, body: &str) -> String {
    format!("{html}<h3>{title}</h3>{body}")
}

/// Insert a new section immediately after an existing one. Falls back to
/// appending when the anchor section is absent.
pub fn insert_section_after(html: &str, after_title: &str, title: &str, body: &str) -> String {
    match section_span(html, after_title) {
        Some((_, _, body_end)) => format!(
            "{}<h3>{}</h3>{}{}",
            &html[..body_end],
            title,
            body,
            &html[body_end..]
        ),
        None => append_section(html, title, body),
    }
}
