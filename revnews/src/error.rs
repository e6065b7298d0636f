//! Error types for the RevNews pipeline.
//!
//! Propagation policy: failures inside the generation pipeline are swallowed
//! with user-safe fallback text at every stage that can be non-fatal; only
//! precondition violations (missing owner identity) and feed-level retrieval
//! failures bubble up for the caller to render an error or empty state.

use thiserror::Error;

/// Main error type for RevNews operations
#[derive(Error, Debug)]
pub enum Error {
    /// No API key configured for a capability. Consumers degrade to fixed
    /// fallback strings; this variant never reaches the end user.
    #[error("capability credential is not configured")]
    CredentialMissing,

    /// The search or completion upstream returned a non-success status or
    /// was unreachable.
    #[error("upstream {service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    /// Free-text model output did not match the expected structure. The
    /// public parsers default instead of surfacing this.
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    /// An owner-scoped operation was invoked without an owning identity.
    /// This is the one class that propagates as a hard failure.
    #[error("operation requires an authenticated owner")]
    Unauthorized,

    /// Session/preference/article store failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn search_unavailable(reason: impl ToString) -> Self {
        Error::UpstreamUnavailable {
            service: "search",
            reason: reason.to_string(),
        }
    }

    pub fn completion_unavailable(reason: impl ToString) -> Self {
        Error::UpstreamUnavailable {
            service: "completion",
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
