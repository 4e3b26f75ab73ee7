//! Structured medical-record handling.
//!
//! Records are HTML fragments with eight fixed Chinese `<h3>` section
//! headers in fixed order. Everything in this module serves one invariant:
//! **no clinical datum appears in a record unless it is traceable to the
//! caller-supplied source brief** — model-invented vitals, lab results, and
//! histories are rewritten to standardized placeholders, never trusted.

pub mod brief;
pub mod sanitize;
pub mod sections;

pub use brief::{parse_brief, sanitize_record_strict, BriefFacts};
pub use sanitize::{
    ensure_disclaimer, sanitize_record_html, sanitize_record_values, SanitizationContext,
    RECORD_DISCLAIMER,
};
pub use sections::{
    append_section, has_section, insert_section_after, replace_section_body, section_body,
    SECTION_ALLERGY_HISTORY, SECTION_AUXILIARY_EXAM, SECTION_CHIEF_COMPLAINT,
    SECTION_DIAGNOSIS, SECTION_PAST_HISTORY, SECTION_PHYSICAL_EXAM, SECTION_PRESENT_ILLNESS,
    SECTION_TITLES, SECTION_TREATMENT_PLAN,
};
