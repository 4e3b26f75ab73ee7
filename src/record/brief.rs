//! Grounding sanitizer — the field-extraction variant.
//!
//! Instead of pattern-rewriting the generated HTML, this variant first
//! parses structured facts out of the caller's brief with fixed keyword
//! lists, then re-renders the grounding-sensitive sections strictly from
//! those facts. Exam sections survive only when the brief itself mentions
//! exam findings.

use regex::Regex;
use serde::Serialize;

use super::sections::{
    has_section, replace_section_body, SECTION_ALLERGY_HISTORY, SECTION_AUXILIARY_EXAM,
    SECTION_PAST_HISTORY, SECTION_PHYSICAL_EXAM, SECTION_PRESENT_ILLNESS,
};

/// Symptom keywords recognized in a brief.
pub const SYMPTOM_KEYWORDS: [&str; 10] = [
    "发热", "咳嗽", "咽痛", "头痛", "腹痛", "胸痛", "气促", "恶心", "呕吐", "腹泻",
];

/// Physical-exam findings that, when present in the brief, let the model's
/// physical-exam section stand.
const PHYSICAL_EXAM_KEYWORDS: [&str; 7] =
    ["体温", "脉搏", "呼吸", "血压", "肺部", "心脏", "腹部"];

/// Auxiliary-exam mentions that let the model's auxiliary-exam section
/// stand (matched against the lowercased brief).
const AUXILIARY_EXAM_KEYWORDS: [&str; 6] =
    ["血常规", "尿常规", "胸片", "ct", "b超", "心电图"];

/// Structured facts extracted from a source brief.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BriefFacts {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub symptoms: Vec<String>,
    /// `(name, value)` pairs, e.g. `("体温", "38.5℃")`.
    pub vital_signs: Vec<(String, String)>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

/// Extract facts from a brief using the fixed keyword lists.
pub fn parse_brief(brief: &str) -> BriefFacts {
    let text = brief.to_lowercase();
    let mut facts = BriefFacts::default();

    let age_re = Regex::new(r"(\d+)\s*岁").expect("static regex");
    if let Some(caps) = age_re.captures(&text) {
        facts.age = caps[1].parse().ok();
    }

    if text.contains('女') {
        facts.gender = Some("女".to_string());
    } else if text.contains('男') {
        facts.gender = Some("男".to_string());
    }

    for keyword in SYMPTOM_KEYWORDS {
        if text.contains(keyword) {
            facts.symptoms.push(keyword.to_string());
        }
    }

    if text.contains("体温") && text.contains('℃') {
        let temp_re = Regex::new(r"体温[^℃]*([0-9.]+)\s*℃").expect("static regex");
        if let Some(caps) = temp_re.captures(&text) {
            facts
                .vital_signs
                .push(("体温".to_string(), format!("{}℃", &caps[1])));
        }
    }
    if text.contains("血压") && text.contains("mmhg") {
        let bp_re = Regex::new(r"血压[^0-9]*([0-9/]+)\s*mmhg").expect("static regex");
        if let Some(caps) = bp_re.captures(&text) {
            facts
                .vital_signs
                .push(("血压".to_string(), caps[1].to_string()));
        }
    }

    if text.contains("既往") && (text.contains("体健") || text.contains("健康")) {
        facts.medical_history = Some("既往体健".to_string());
    }

    if text.contains("过敏") {
        if text.contains('无') || text.contains("否认") {
            facts.allergies = Some("无药物过敏".to_string());
        } else {
            facts.allergies = Some("有药物过敏史".to_string());
        }
    }

    facts
}

fn render_present_illness(facts: &BriefFacts) -> String {
    let symptoms_text = if facts.symptoms.is_empty() {
        "待补充".to_string()
    } else {
        facts.symptoms.join("、")
    };

    let age_gender = match (&facts.gender, facts.age) {
        (Some(g), Some(a)) => format!("{g}{a}岁"),
        (Some(g), None) => g.clone(),
        (None, Some(a)) => format!("{a}岁"),
        (None, None) => String::new(),
    };

    let mut body = String::from("<p>患者");
    if !age_gender.is_empty() {
        body.push_str(&age_gender);
        body.push('，');
    }
    body.push_str(&format!("主诉：{symptoms_text}。"));
    if !facts.vital_signs.is_empty() {
        let vitals = facts
            .vital_signs
            .iter()
            .map(|(k, v)| format!("{k}：{v}"))
            .collect::<Vec<_>>()
            .join("、");
        body.push_str(&format!("生命体征：{vitals}。"));
    }
    body.push_str("</p>");
    body
}

/// Strict sanitizer: every grounding-sensitive section is re-rendered from
/// the extracted facts; nothing the model wrote in them survives.
pub fn sanitize_record_strict(source_brief: &str, html: &str) -> String {
    if html.is_empty() {
        return html.to_string();
    }

    let lowered = source_brief.to_lowercase();
    let facts = parse_brief(source_brief);
    let mut out = html.to_string();

    if has_section(&out, SECTION_PHYSICAL_EXAM) {
        let brief_has_findings = PHYSICAL_EXAM_KEYWORDS.iter().any(|k| lowered.contains(k));
        if !brief_has_findings {
            out = replace_section_body(
                &out,
                SECTION_PHYSICAL_EXAM,
                "<p>待查（需进行详细的体格检查以评估患者状况）</p>",
            );
        }
    }

    if has_section(&out, SECTION_AUXILIARY_EXAM) {
        let brief_has_exams = AUXILIARY_EXAM_KEYWORDS.iter().any(|k| lowered.contains(k));
        if !brief_has_exams {
            out = replace_section_body(
                &out,
                SECTION_AUXILIARY_EXAM,
                "<p>待完善（建议根据病情需要完善相关检查项目）</p>",
            );
        }
    }

    if has_section(&out, SECTION_PRESENT_ILLNESS) {
        out = replace_section_body(&out, SECTION_PRESENT_ILLNESS, &render_present_illness(&facts));
    }

    if has_section(&out, SECTION_PAST_HISTORY) {
        let body = match &facts.medical_history {
            Some(h) => format!("<p>{h}。</p>"),
            None => "<p>待补充。</p>".to_string(),
        };
        out = replace_section_body(&out, SECTION_PAST_HISTORY, &body);
    }

    if has_section(&out, SECTION_ALLERGY_HISTORY) {
        let body = match &facts.allergies {
            Some(a) => format!("<p>{a}。</p>"),
            None => "<p>待补充。</p>".to_string(),
        };
        out = replace_section_body(&out, SECTION_ALLERGY_HISTORY, &body);
    }

    out
}
