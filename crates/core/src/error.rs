//! Error types for the Talkback domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Talkback operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Extraction errors ---
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    // --- Turn submission errors ---
    #[error("Turn rejected: {0}")]
    Turn(#[from] TurnError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty reply")]
    EmptyReply,
}

/// Why an uploaded artifact could not be turned into text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Unsupported attachment kind: {0}")]
    UnsupportedKind(String),

    #[error("Extraction backend {backend} failed: {reason}")]
    BackendError { backend: String, reason: String },
}

/// Submissions the orchestrator refuses outright. None of these touch history.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("Nothing to send: input is empty and no attachment was supplied")]
    InvalidInput,

    #[error("A reply is already being generated for this session")]
    Busy,

    #[error("Model '{0}' is not in the configured allow-list")]
    UnknownModel(String),
}
