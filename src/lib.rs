//! mediq — resilient chat-completion gateway and clinical response
//! normalization for a medical assistant backend.
//!
//! The crate wraps an OpenAI-compatible multimodal completion API behind a
//! typed service layer: a four-tier fallback dispatcher resolves each
//! request (primary/fallback model × SDK-style/raw-HTTP transport), then
//! normalization turns the arbitrary reply into a guaranteed, sanitized,
//! structurally valid result. Generated medical records are grounded —
//! nothing clinical survives sanitization unless it traces back to the
//! caller's input.
//!
//! The HTTP routing layer, flat-file persistence, and session backends are
//! external collaborators; this crate defines only their boundary contracts
//! ([`envelope`], [`session`]).

pub mod completion;
pub mod config;
pub mod envelope;
pub mod parsers;
pub mod record;
pub mod service;
pub mod session;
pub mod text;

pub use completion::{
    ChatMessage, CompletionDispatcher, CompletionError, CompletionOutcome, CompletionRequest,
};
pub use service::{MedicalAiService, ServiceError};
