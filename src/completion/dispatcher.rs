//! Tiered-fallback completion dispatcher.
//!
//! This is a fallback policy, not a retry policy: each rung of the ladder is
//! tried exactly once, in order, with no backoff and no caching. Attempts
//! run strictly sequentially — an attempt may have side effects upstream
//! (billing), so racing them is not permitted.

use tracing::{error, warn};

use super::transport::CompletionTransport;
use super::types::{CompletionOutcome, CompletionRequest};
use super::{CompletionError, TransportError};
use crate::config;

/// Escalation ladder: `(request.model, transport[0..n])` then
/// `(fallback_model, transport[0..n])`. With the standard SDK + HTTP pair
/// that is the fixed four-attempt order:
/// primary/sdk → primary/http → fallback/sdk → fallback/http.
pub struct CompletionDispatcher {
    transports: Vec<Box<dyn CompletionTransport>>,
    fallback_model: String,
}

impl CompletionDispatcher {
    pub fn new(
        transports: Vec<Box<dyn CompletionTransport>>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            transports,
            fallback_model: fallback_model.into(),
        }
    }

    /// Standard ladder from environment configuration.
    pub fn from_config() -> Self {
        Self::new(
            vec![
                Box::new(super::transport::SdkTransport::from_config()),
                Box::new(super::transport::HttpTransport::from_config()),
            ],
            config::FALLBACK_MODEL,
        )
    }

    /// The model every request escalates to after the primary fails through
    /// every transport.
    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// Resolve the request to `(text, model_used)` through the ladder.
    ///
    /// Attempt failures are logged at `warn` until the final rung, which
    /// logs at `error`; the terminal error carries the last failure.
    pub fn dispatch(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionOutcome, CompletionError> {
        let models = [request.model.clone(), self.fallback_model.clone()];
        let total = models.len() * self.transports.len();
        let mut attempt = 0usize;
        let mut last: Option<TransportError> = None;

        for model in &models {
            let tier_request = request.with_model(model);
            for transport in &self.transports {
                attempt += 1;
                match transport.complete(&tier_request) {
                    Ok(text) => {
                        return Ok(CompletionOutcome {
                            text,
                            model_used: model.clone(),
                        })
                    }
                    Err(e) => {
                        if attempt == total {
                            error!(
                                model = %model,
                                transport = transport.label(),
                                attempt,
                                error = %e,
                                "completion attempt failed — ladder exhausted"
                            );
                        } else {
                            warn!(
                                model = %model,
                                transport = transport.label(),
                                attempt,
                                error = %e,
                                "completion attempt failed — escalating"
                            );
                        }
                        last = Some(e);
                    }
                }
            }
        }

        Err(CompletionError::Exhausted {
            attempts: attempt,
            last: last.unwrap_or(TransportError::ClientUnavailable),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::completion::transport::ScriptedTransport;
    use crate::completion::types::ChatMessage;

    fn request() -> CompletionRequest {
        CompletionRequest::new("primary-model", vec![ChatMessage::user("问题")], 0.3, 800)
    }

    fn network_err() -> TransportError {
        TransportError::Network("connection refused".into())
    }

    /// Build the standard two-transport ladder where exactly the k-th of the
    /// four attempts succeeds (k is 1-based), sharing one call log.
    fn ladder_with_success_at(
        k: usize,
        log: Arc<Mutex<Vec<String>>>,
    ) -> CompletionDispatcher {
        // Attempts 1 and 3 hit "sdk", attempts 2 and 4 hit "http".
        let outcome = |n: usize| {
            if n == k {
                Ok(format!("reply-{n}"))
            } else {
                Err(network_err())
            }
        };
        let sdk = ScriptedTransport::with_script("sdk", vec![outcome(1), outcome(3)])
            .with_shared_log(Arc::clone(&log));
        let http = ScriptedTransport::with_script("http", vec![outcome(2), outcome(4)])
            .with_shared_log(Arc::clone(&log));
        CompletionDispatcher::new(vec![Box::new(sdk), Box::new(http)], "fallback-model")
    }

    fn expected_order() -> Vec<&'static str> {
        vec![
            "sdk:primary-model",
            "http:primary-model",
            "sdk:fallback-model",
            "http:fallback-model",
        ]
    }

    #[test]
    fn first_attempt_success_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ladder_with_success_at(1, Arc::clone(&log));

        let outcome = dispatcher.dispatch(&request()).unwrap();
        assert_eq!(outcome.text, "reply-1");
        assert_eq!(outcome.model_used, "primary-model");
        assert_eq!(*log.lock().unwrap(), expected_order()[..1].to_vec());
    }

    #[test]
    fn kth_attempt_success_invokes_exactly_first_k_in_order() {
        for k in 1..=4 {
            let log = Arc::new(Mutex::new(Vec::new()));
            let dispatcher = ladder_with_success_at(k, Arc::clone(&log));

            let outcome = dispatcher.dispatch(&request()).unwrap();
            assert_eq!(outcome.text, format!("reply-{k}"));
            assert_eq!(
                *log.lock().unwrap(),
                expected_order()[..k].to_vec(),
                "success at attempt {k}"
            );
        }
    }

    #[test]
    fn fallback_success_reports_fallback_model() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ladder_with_success_at(3, Arc::clone(&log));

        let outcome = dispatcher.dispatch(&request()).unwrap();
        assert_eq!(outcome.model_used, "fallback-model");
    }

    #[test]
    fn exhaustion_attempts_each_rung_once_and_keeps_last_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sdk = ScriptedTransport::with_script(
            "sdk",
            vec![Err(network_err()), Err(network_err())],
        )
        .with_shared_log(Arc::clone(&log));
        let http = ScriptedTransport::with_script(
            "http",
            vec![
                Err(network_err()),
                Err(TransportError::Api {
                    status: 503,
                    body: "final failure".into(),
                }),
            ],
        )
        .with_shared_log(Arc::clone(&log));
        let dispatcher =
            CompletionDispatcher::new(vec![Box::new(sdk), Box::new(http)], "fallback-model");

        let err = dispatcher.dispatch(&request()).unwrap_err();
        assert_eq!(*log.lock().unwrap(), expected_order());
        match err {
            CompletionError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(last, TransportError::Api { status: 503, .. }));
            }
        }
    }

    #[test]
    fn empty_transport_list_exhausts_immediately() {
        let dispatcher = CompletionDispatcher::new(vec![], "fallback-model");
        let err = dispatcher.dispatch(&request()).unwrap_err();
        match err {
            CompletionError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 0);
                assert!(matches!(last, TransportError::ClientUnavailable));
            }
        }
    }
}
