//! Pure text utilities shared by every response-normalization path.

pub mod json_extract;
pub mod normalize;
pub mod summary;

pub use json_extract::extract_json;
pub use normalize::{strip_code_fences, to_plain_text};
pub use summary::normalize_summary_html;
