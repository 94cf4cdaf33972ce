//! Stream resolution for channel videos
//!
//! Supports GoPlay, Dplay and VRT NU with DRM detection, DASH/HLS
//! weighting, SSAI fallback and a single auth renewal per resolution.

pub mod auth;
pub mod fetcher;
pub mod manifest;
pub mod metadata;
pub mod providers;
pub mod resolver;
pub mod scrape;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthError, AuthProvider, Credentials, SessionAuth, Token};
pub use fetcher::{FetchRequest, FetchResponse, PayloadFetcher};
pub use metadata::{StreamDescriptor, StreamMetadata};
pub use providers::Channel;
pub use resolver::{ResolverOptions, StreamResolver};
pub use scrape::{request_for_url, PageRecovery};
pub use types::{DeferredReason, Protocol, ResolutionRequest, ResolutionResult, StreamCandidate};
