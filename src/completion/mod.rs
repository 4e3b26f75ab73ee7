//! Chat-completion resilience layer.
//!
//! One `dispatch()` call fans a request across a fixed escalation ladder —
//! primary model via the SDK-style client, primary via raw HTTP, fallback
//! model via SDK-style, fallback via raw HTTP — and returns the first
//! success. Attempts are strictly sequential (an attempt may have billing
//! side effects, so no racing), never retried with backoff, never cached.

pub mod dispatcher;
pub mod stream;
pub mod transport;
pub mod types;

pub use dispatcher::CompletionDispatcher;
pub use stream::{parse_stream_line, SseStreamTransport, StreamChunk, StreamTransport};
pub use transport::{CompletionTransport, HttpTransport, ScriptedTransport, SdkTransport};
pub use types::{
    ChatMessage, CompletionOutcome, CompletionRequest, ContentPart, ImageUrl, MessageContent,
    Role,
};

use thiserror::Error;

/// Failure of one transport attempt. Recovered locally by escalating to the
/// next tier; only surfaced (inside `CompletionError::Exhausted`) when the
/// whole ladder is spent.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Completion client is not configured — missing API key")]
    ClientUnavailable,

    #[error("Upstream returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed completion body: {0}")]
    MalformedBody(String),
}

/// Terminal dispatch failure.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("All {attempts} completion attempts exhausted — last failure: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: TransportError,
    },
}

/// Bound error bodies to a loggable size (the upstream can echo whole
/// prompts back in error messages). Char-boundary safe.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    body.chars().take(max_chars).collect()
}
