//! Grounding sanitizer — the rule-table (regex substitution) variant.
//!
//! Generated records must never present fabricated clinical facts as real.
//! Each rule is a named `(matcher, rewrite)` entry; the table runs in fixed
//! order because later rules operate on the output of earlier ones (the
//! physical-exam rewrite, for instance, must win over the per-vital value
//! rewrites inside that section).

use regex::Regex;
use tracing::debug;

use super::sections::{
    append_section, has_section, insert_section_after, replace_section_body,
    SECTION_ALLERGY_HISTORY, SECTION_AUXILIARY_EXAM, SECTION_CHIEF_COMPLAINT,
    SECTION_PAST_HISTORY, SECTION_PHYSICAL_EXAM, SECTION_PRESENT_ILLNESS,
};

/// Trailing disclaimer mandatory on every generated record.
pub const RECORD_DISCLAIMER: &str =
    "<small style='color:#64748b;'>本病历仅供参考，需结合临床实际情况</small>";

/// Placeholder body for an unverified physical-exam section.
const PHYSICAL_EXAM_PLACEHOLDER: &str = "<ul>\
<li>生命体征：待查（体温/脉搏/呼吸/血压）</li>\
<li>一般状况：待查</li>\
<li>呼吸系统/心血管系统/腹部/神经系统：待查</li>\
</ul>";

/// Placeholder body for unverified auxiliary-exam results.
const AUXILIARY_EXAM_PLACEHOLDER: &str = "<p>未完善，建议根据病情完善相应检查项目。</p>";

/// Placeholder body for unmentioned history sections.
const HISTORY_PLACEHOLDER: &str = "<p>未提及，待补充。</p>";

/// Caller-supplied ground truth for one sanitization pass.
pub struct SanitizationContext<'a> {
    pub source_brief: &'a str,
}

struct SanitizeRule {
    name: &'static str,
    apply: fn(&SanitizationContext, String) -> String,
}

/// The full rule table, in evaluation order.
const RULES: &[SanitizeRule] = &[
    SanitizeRule {
        name: "vital-sign-values",
        apply: rewrite_vital_sign_values,
    },
    SanitizeRule {
        name: "result-sentences",
        apply: rewrite_result_sentences,
    },
    SanitizeRule {
        name: "auxiliary-exam-section",
        apply: rewrite_auxiliary_exam,
    },
    SanitizeRule {
        name: "physical-exam-section",
        apply: rewrite_physical_exam,
    },
    SanitizeRule {
        name: "present-illness-section",
        apply: rewrite_present_illness,
    },
    SanitizeRule {
        name: "past-history-section",
        apply: rewrite_past_history,
    },
    SanitizeRule {
        name: "allergy-history-section",
        apply: rewrite_allergy_history,
    },
];

/// Run the full rule table against a generated record.
pub fn sanitize_record_html(source_brief: &str, html: &str) -> String {
    if html.is_empty() {
        return html.to_string();
    }
    let ctx = SanitizationContext { source_brief };
    RULES.iter().fold(html.to_string(), |acc, rule| {
        let out = (rule.apply)(&ctx, acc.clone());
        if out != acc {
            debug!(rule = rule.name, "sanitization rule rewrote generated record");
        }
        out
    })
}

/// Value-level rules only (vitals + result sentences) — used on appended
/// records, where the section-rewrite rules would destroy legitimately
/// merged history.
pub fn sanitize_record_values(html: &str) -> String {
    if html.is_empty() {
        return html.to_string();
    }
    let ctx = SanitizationContext { source_brief: "" };
    let out = rewrite_vital_sign_values(&ctx, html.to_string());
    rewrite_result_sentences(&ctx, out)
}

/// Append the mandatory disclaimer when the model omitted it.
pub fn ensure_disclaimer(html: &str) -> String {
    if html.contains("本病历仅供参考") {
        html.to_string()
    } else {
        format!("{html}{RECORD_DISCLAIMER}")
    }
}

// ── Rules ───────────────────────────────────────────────────

/// Any 体温/脉搏/呼吸/血压 mention with a trailing value becomes `X：待查`,
/// whatever the model wrote — values cover colons, spaces, Chinese units,
/// mmHg and friends.
fn rewrite_vital_sign_values(_ctx: &SanitizationContext, html: String) -> String {
    let mut out = html;
    for vital in ["体温", "脉搏", "呼吸", "血压"] {
        let re = Regex::new(&format!(r"{vital}\s*[:：]?\s*[^，。<\n]*")).expect("static regex");
        out = re
            .replace_all(&out, format!("{vital}：待查"))
            .into_owned();
    }
    out
}

/// Concrete result sentences (`<test> … 示/提示/显示/见 …`) collapse to a
/// "not yet completed" recommendation.
fn rewrite_result_sentences(_ctx: &SanitizationContext, html: String) -> String {
    let re = Regex::new(
        r"(血常规|CRP|降钙素原|胸部X线|胸片|CT)[^。；;<\n]*?(示|提示|显示|见)[^。；;<\n]*",
    )
    .expect("static regex");
    re.replace_all(&html, "${1}：未完善，建议根据病情完善检查")
        .into_owned()
}

fn rewrite_auxiliary_exam(_ctx: &SanitizationContext, html: String) -> String {
    if has_section(&html, SECTION_AUXILIARY_EXAM) {
        replace_section_body(&html, SECTION_AUXILIARY_EXAM, AUXILIARY_EXAM_PLACEHOLDER)
    } else {
        html
    }
}

/// The physical exam is never trusted from the model, whatever it contains.
fn rewrite_physical_exam(_ctx: &SanitizationContext, html: String) -> String {
    if has_section(&html, SECTION_PHYSICAL_EXAM) {
        replace_section_body(&html, SECTION_PHYSICAL_EXAM, PHYSICAL_EXAM_PLACEHOLDER)
    } else {
        html
    }
}

/// Present illness quotes only the verbatim brief plus the fixed note that
/// further detail is needed — the model's elaboration is discarded.
fn rewrite_present_illness(ctx: &SanitizationContext, html: String) -> String {
    let brief = ctx.source_brief.trim();
    let safe_body = if brief.is_empty() {
        "<p>患者主述待补充。</p>".to_string()
    } else {
        format!(
            "<p>依据当前描述：{brief}</p><p>更多关键信息（起病诱因、伴随症状、病程演变、用药情况）待补充。</p>"
        )
    };

    if has_section(&html, SECTION_PRESENT_ILLNESS) {
        replace_section_body(&html, SECTION_PRESENT_ILLNESS, &safe_body)
    } else if has_section(&html, SECTION_CHIEF_COMPLAINT) {
        insert_section_after(
            &html,
            SECTION_CHIEF_COMPLAINT,
            SECTION_PRESENT_ILLNESS,
            &safe_body,
        )
    } else {
        format!("<h3>{SECTION_PRESENT_ILLNESS}</h3>{safe_body}{html}")
    }
}

fn rewrite_past_history(_ctx: &SanitizationContext, html: String) -> String {
    if has_section(&html, SECTION_PAST_HISTORY) {
        replace_section_body(&html, SECTION_PAST_HISTORY, HISTORY_PLACEHOLDER)
    } else {
        append_section(&html, SECTION_PAST_HISTORY, HISTORY_PLACEHOLDER)
    }
}

fn rewrite_allergy_history(_ctx: &SanitizationContext, html: String) -> String {
    if has_section(&html, SECTION_ALLERGY_HISTORY) {
        replace_section_body(&html, SECTION_ALLERGY_HISTORY, HISTORY_PLACEHOLDER)
    } else {
        append_section(&html, SECTION_ALLERGY_HISTORY, HISTORY_PLACEHOLDER)
    }
}
