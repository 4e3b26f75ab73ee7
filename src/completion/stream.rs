//! Streaming completion path.
//!
//! The upstream emits newline-delimited `data: <json>` chunks terminated by
//! a literal `data: [DONE]`. Each chunk's incremental text sits at
//! `choices[0].delta.content`, falling back to `choices[0].message.content`
//! when the delta is absent. Lines that fail to parse are skipped — a
//! garbled chunk must not kill the stream.
//!
//! Deltas are pushed into an `mpsc::Sender<String>`; the accumulated full
//! text is returned once the stream ends. The sequence is lazy, finite, and
//! non-restartable.

use std::io::{BufRead, BufReader};
use std::sync::mpsc;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::CompletionRequest;
use super::{truncate_body, TransportError};
use crate::config;

/// One parsed line of the SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Incremental reply text.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Parse one wire line. Returns `None` for blank lines, non-`data:` lines,
/// unparseable JSON, and chunks without incremental text.
pub fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(StreamChunk::Done);
    }

    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let delta = value
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            value
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })?;

    Some(StreamChunk::Delta(delta.to_string()))
}

/// Streaming seam — lets the service layer run against a scripted stream in
/// tests the same way `CompletionTransport` seams the one-shot path.
pub trait StreamTransport: Send + Sync {
    /// Stream the request, pushing each delta into `chunk_tx`, and return
    /// the accumulated full text.
    fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<String, TransportError>;
}

/// SSE client over the OpenAI-compatible endpoint.
pub struct SseStreamTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SseStreamTransport {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Transport configured from the environment (300 s bound — streams run
    /// far longer than one-shot completions).
    pub fn from_config() -> Self {
        Self::new(&config::base_url(), config::api_key(), config::stream_timeout())
    }
}

impl StreamTransport for SseStreamTransport {
    fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<String, TransportError> {
        let mut streaming_request = request.clone();
        streaming_request.stream = Some(true);

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, "streaming chat completion");

        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.json(&streaming_request).send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(config::STREAM_TIMEOUT_SECS)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body: truncate_body(&body, 300),
            });
        }

        let mut full_text = String::new();
        let reader = BufReader::new(response);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    // Abandoned mid-stream — surface what was accumulated.
                    warn!(error = %e, "stream read error — ending stream");
                    break;
                }
            };
            match parse_stream_line(&line) {
                Some(StreamChunk::Done) => break,
                Some(StreamChunk::Delta(delta)) => {
                    full_text.push_str(&delta);
                    if chunk_tx.send(delta).is_err() {
                        // Receiver gone — the consumer stopped reading.
                        debug!("stream consumer dropped — ending stream");
                        break;
                    }
                }
                None => continue,
            }
        }

        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"你好"}}]}"#;
        assert_eq!(
            parse_stream_line(line),
            Some(StreamChunk::Delta("你好".into()))
        );
    }

    #[test]
    fn falls_back_to_message_content() {
        let line = r#"data: {"choices":[{"message":{"content":"完整"}}]}"#;
        assert_eq!(
            parse_stream_line(line),
            Some(StreamChunk::Delta("完整".into()))
        );
    }

    #[test]
    fn delta_wins_over_message() {
        let line =
            r#"data: {"choices":[{"delta":{"content":"增"},"message":{"content":"全"}}]}"#;
        assert_eq!(
            parse_stream_line(line),
            Some(StreamChunk::Delta("增".into()))
        );
    }

    #[test]
    fn done_sentinel_recognized() {
        assert_eq!(parse_stream_line("data: [DONE]"), Some(StreamChunk::Done));
        assert_eq!(parse_stream_line("data:[DONE]"), Some(StreamChunk::Done));
    }

    #[test]
    fn blank_and_foreign_lines_skipped() {
        assert_eq!(parse_stream_line(""), None);
        assert_eq!(parse_stream_line("event: ping"), None);
        assert_eq!(parse_stream_line("data:"), None);
    }

    #[test]
    fn garbage_json_skipped() {
        assert_eq!(parse_stream_line("data: {not json"), None);
    }

    #[test]
    fn empty_delta_skipped() {
        let line = r#"data: {"choices":[{"delta":{"content":""}}]}"#;
        assert_eq!(parse_stream_line(line), None);
    }

    #[test]
    fn chunk_without_choices_skipped() {
        assert_eq!(parse_stream_line(r#"data: {"id":"x"}"#), None);
    }
}
