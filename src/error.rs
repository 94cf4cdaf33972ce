//! Error taxonomy for stream resolution.
//!
//! Only structural failures live here. Expected outcomes such as missing
//! credentials, geo-locks or a site without a manifest are reported through
//! [`DeferredReason`](crate::stream::DeferredReason) on the result instead.

use thiserror::Error;

/// Errors raised to the caller of the resolver.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The request itself is unusable (programmer error).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A pattern match or structured field lookup failed on a site payload.
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A page did not contain the identifier needed to continue.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or unusable HTTP status.
    #[error("Transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResolveError {
    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_url_and_reason() {
        let err = ResolveError::malformed("https://api.example/x", "missing field `data`");
        assert_eq!(
            err.to_string(),
            "Malformed response from https://api.example/x: missing field `data`"
        );
    }

    #[test]
    fn transport_formats_source_error() {
        let err = ResolveError::transport("https://cdn/x.m3u8", "timed out");
        assert!(matches!(err, ResolveError::Transport { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
