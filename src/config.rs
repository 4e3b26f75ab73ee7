//! Environment-driven configuration for the upstream completion API.
//!
//! All values have compiled defaults so the crate works out of the box
//! against the DashScope OpenAI-compatible endpoint; deployments override
//! via environment variables.

use std::time::Duration;

/// Crate-level constants.
pub const APP_NAME: &str = "mediq";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// OpenAI-compatible endpoint base (the `/chat/completions` path is appended
/// by the transports).
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Vision multimodal model — used for image-bearing tasks.
pub const DEFAULT_VISION_MODEL: &str = "qwen-vl-max";

/// Text model — used for plain chat/generation tasks.
pub const DEFAULT_TEXT_MODEL: &str = "qwen-plus";

/// The model every dispatch escalates to after the primary model fails
/// through both transports.
pub const FALLBACK_MODEL: &str = "qwen-plus";

/// Per-attempt bound for normal completion calls.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Bound for the streaming variant (covers the whole body read).
pub const STREAM_TIMEOUT_SECS: u64 = 300;

/// API base URL, `MEDIQ_BASE_URL` override, trailing slash trimmed.
pub fn base_url() -> String {
    std::env::var("MEDIQ_BASE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Bearer token for the upstream API. `None` when unset — the SDK-style
/// transport refuses to run without it, the raw HTTP transport still
/// attempts the call (the upstream rejects it with a proper status).
pub fn api_key() -> Option<String> {
    std::env::var("DASHSCOPE_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Text model, `QWEN_TEXT_MODEL` override.
pub fn text_model() -> String {
    std::env::var("QWEN_TEXT_MODEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string())
}

/// Vision model, `QWEN_VISION_MODEL` override.
pub fn vision_model() -> String {
    std::env::var("QWEN_VISION_MODEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string())
}

/// Per-attempt timeout as a `Duration`.
pub fn request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// Streaming timeout as a `Duration`.
pub fn stream_timeout() -> Duration {
    Duration::from_secs(STREAM_TIMEOUT_SECS)
}
