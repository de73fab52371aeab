//! Error types for the document store client.

use thiserror::Error;

/// Errors that can occur when talking to the document store.
///
/// Store failures are fatal for the migration run that hit them: there is
/// no retry here, a rerun recomputes identical verdicts from a fresh scan.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request was rejected for missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Collection or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller built a request the store cannot serve.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store answered with something we cannot interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The store reported a server-side failure.
    #[error("store error ({status}): {message}")]
    Server { status: u16, message: String },
}
