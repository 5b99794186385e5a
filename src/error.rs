//! Error types for the Taikun provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Sentinel carried by the retryable post-write miss.
pub const NOT_FOUND_AFTER_CREATE_OR_UPDATE: &str = "NotFoundAfterCreateOrUpdate";

/// Everything that can go wrong between the host call and the Taikun API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Input that is not even shaped like a configuration.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Per-attribute failures, reported before any network call.
    #[error("{} attribute(s) failed validation", .0.len())]
    InvalidAttributes(Vec<Diagnostic>),

    /// An id or integer coercion failed.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The request never got an HTTP answer.
    #[error("calling {endpoint} failed: {message}")]
    Transport {
        /// Route that was called.
        endpoint: String,
        /// What the HTTP client reported.
        message: String,
    },

    /// A non-success HTTP status.
    #[error("{endpoint} answered HTTP {status}: {body}")]
    Server {
        /// Route that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, often the API's own error text.
        body: String,
    },

    /// A post-write list did not see the record yet.
    #[error("NotFoundAfterCreateOrUpdate")]
    NotFoundAfterCreateOrUpdate {
        /// The id that was just written.
        id: String,
    },

    /// The API broke one of its own guarantees.
    #[error("broken API invariant: {0}")]
    Invariant(String),

    /// No object has the requested id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The host cancelled the operation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The operation ran past its deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The provider block is unusable, or the provider is not configured yet.
    #[error("provider configuration: {0}")]
    Configuration(String),

    /// No resource or data source is registered under this name.
    #[error("unknown resource or data source type {0}")]
    UnknownResource(String),

    /// The provider does not implement the call.
    #[error("not supported: {0}")]
    Unimplemented(String),

    /// A JSON body or state did not decode.
    #[error("malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether the host should repeat the step that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFoundAfterCreateOrUpdate { .. })
    }

    /// Convert the error into host diagnostics.
    ///
    /// Validation failures keep their per-attribute diagnostics; everything
    /// else becomes a single error diagnostic.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::InvalidAttributes(diagnostics) => diagnostics,
            other => vec![Diagnostic::from(other)],
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::Server { body, .. } if !body.is_empty() => {
                let detail = body.clone();
                Diagnostic::error(err.to_string()).with_detail(detail)
            },
            _ => Diagnostic::error(err.to_string()),
        }
    }
}
