//! Completion transports — the two mechanisms an attempt can go through.
//!
//! `SdkTransport` is the typed client path: request/response bodies are
//! serde structs and a missing API key makes the transport unavailable
//! before any network traffic. `HttpTransport` is the raw POST path: the
//! body is assembled as loose JSON, the reply is probed by pointer, and a
//! 400 status triggers one retry with the alternate content-parts message
//! encoding before the attempt counts as failed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{ChatMessage, CompletionRequest};
use super::{truncate_body, TransportError};
use crate::config;

/// Upper bound on upstream error bodies kept in error values.
const ERROR_BODY_MAX_CHARS: usize = 300;

/// One mechanism for resolving a completion request to reply text.
///
/// The trait is the dispatcher's test seam: scripted implementations stand
/// in for the network in unit tests.
pub trait CompletionTransport: Send + Sync {
    /// Short label used in logs ("sdk", "http").
    fn label(&self) -> &'static str;

    /// Resolve the request to the assistant's reply text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError>;
}

fn map_reqwest_error(err: reqwest::Error, timeout_secs: u64) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout_secs)
    } else {
        TransportError::Network(err.to_string())
    }
}

fn build_client(timeout: Duration) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

// ═══════════════════════════════════════════════════════════
// SDK-style transport
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Typed client over the OpenAI-compatible endpoint.
pub struct SdkTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SdkTransport {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Transport configured from the environment.
    pub fn from_config() -> Self {
        Self::new(&config::base_url(), config::api_key(), config::request_timeout())
    }
}

impl CompletionTransport for SdkTransport {
    fn label(&self) -> &'static str {
        "sdk"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TransportError::ClientUnavailable)?;

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, "SDK transport: chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .map_err(|e| map_reqwest_error(e, config::REQUEST_TIMEOUT_SECS))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_MAX_CHARS),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| TransportError::MalformedBody(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TransportError::MalformedBody("no choices returned".into()))
    }
}

// ═══════════════════════════════════════════════════════════
// Raw HTTP transport
// ═══════════════════════════════════════════════════════════

/// Direct HTTP POST to the endpoint, with the 400 alternate-encoding retry.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Transport configured from the environment.
    pub fn from_config() -> Self {
        Self::new(&config::base_url(), config::api_key(), config::request_timeout())
    }

    fn post(&self, request: &CompletionRequest) -> Result<reqwest::blocking::Response, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
            .json(request)
            .send()
            .map_err(|e| map_reqwest_error(e, config::REQUEST_TIMEOUT_SECS))
    }

    fn read_content(response: reqwest::blocking::Response) -> Result<String, TransportError> {
        let body: serde_json::Value = response
            .json()
            .map_err(|e| TransportError::MalformedBody(e.to_string()))?;
        body.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::MalformedBody("missing choices[0].message.content".into())
            })
    }
}

impl CompletionTransport for HttpTransport {
    fn label(&self) -> &'static str {
        "http"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        debug!(model = %request.model, "HTTP transport: chat completion");
        let response = self.post(request)?;
        let status = response.status();

        if status.as_u16() == 400 {
            // Some deployments reject scalar string content — re-encode every
            // message as a one-element content-parts array and try once more.
            let original_body =
                truncate_body(&response.text().unwrap_or_default(), ERROR_BODY_MAX_CHARS);
            warn!(
                model = %request.model,
                "HTTP transport got 400 — retrying with content-parts encoding"
            );

            let alt = request.with_parts_encoding();
            let retry = self.post(&alt).and_then(|resp| {
                let retry_status = resp.status();
                if !retry_status.is_success() {
                    let body = resp.text().unwrap_or_default();
                    return Err(TransportError::Api {
                        status: retry_status.as_u16(),
                        body: truncate_body(&body, ERROR_BODY_MAX_CHARS),
                    });
                }
                Self::read_content(resp)
            });

            return retry.map_err(|e| TransportError::Api {
                status: 400,
                body: format!("alternate encoding retry failed: {e} | original: {original_body}"),
            });
        }

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_MAX_CHARS),
            });
        }

        Self::read_content(response)
    }
}

// ═══════════════════════════════════════════════════════════
// Scripted transport for tests
// ═══════════════════════════════════════════════════════════

/// Test transport — pops one scripted outcome per call and records every
/// request it sees (model, messages, the lot).
pub struct ScriptedTransport {
    label: &'static str,
    outcomes: Mutex<VecDeque<Result<String, TransportError>>>,
    default_reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_log: Option<std::sync::Arc<Mutex<Vec<String>>>>,
}

impl ScriptedTransport {
    /// Transport that answers every call with the same reply.
    pub fn always(label: &'static str, reply: &str) -> Self {
        let mut transport = Self::with_script(label, vec![]);
        transport.default_reply = Some(reply.to_string());
        transport
    }

    /// Transport that plays back the given outcomes in order, then errors.
    pub fn with_script(
        label: &'static str,
        outcomes: Vec<Result<String, TransportError>>,
    ) -> Self {
        Self {
            label,
            outcomes: Mutex::new(outcomes.into()),
            default_reply: None,
            requests: Mutex::new(Vec::new()),
            call_log: None,
        }
    }

    /// Share a cross-transport call log — each call appends `label:model`,
    /// letting tests assert the exact escalation order.
    pub fn with_shared_log(mut self, log: std::sync::Arc<Mutex<Vec<String>>>) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Every request this transport has served.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of calls served.
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    /// System prompt of the first recorded request, for prompt-selection
    /// assertions.
    pub fn first_system_prompt(&self) -> Option<String> {
        self.requests()
            .first()
            .and_then(|r| first_system_text(&r.messages))
    }

    fn pop_outcome(&self) -> Result<String, TransportError> {
        if let Some(next) = self.outcomes.lock().expect("outcomes lock").pop_front() {
            return next;
        }
        if let Some(reply) = &self.default_reply {
            return Ok(reply.clone());
        }
        Err(TransportError::Network("script exhausted".into()))
    }
}

fn first_system_text(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == super::types::Role::System)
        .and_then(|m| m.content.as_text().map(str::to_string))
}

impl CompletionTransport for ScriptedTransport {
    fn label(&self) -> &'static str {
        self.label
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if let Some(log) = &self.call_log {
            log.lock()
                .expect("call log lock")
                .push(format!("{}:{}", self.label, request.model));
        }
        self.pop_outcome()
    }
}
