//! `chanres` - channel stream resolver
//!
//! # Features
//!
//! - **Channels**: GoPlay, Dplay, VRT NU and Kijk playback metadata mapping
//! - **Resolution**: DRM short-circuit, DASH/HLS weighting, SSAI fallback
//! - **Geo-locks**: manifest URL markers and site lock messages
//! - **Authentication**: Cognito sessions with a single renewal retry, rotated
//!   refresh tokens kept in a [`TokenStore`]
//! - **Manifests**: optional HLS/DASH probing for variants and tracks
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chanres::{Channel, HttpFetcher, ResolutionRequest, ResolverConfig, StreamResolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::load()?;
//!     let fetcher = Arc::new(HttpFetcher::new(&config)?);
//!     let resolver = StreamResolver::new(fetcher, config.resolver_options());
//!
//!     let request = ResolutionRequest::new(
//!         Channel::VrtNu,
//!         "pbs-pub-1234",
//!         "https://mediazone.vrt.be/api/v1/vrtvideo/assets/pbs-pub-1234",
//!     );
//!     let result = resolver.resolve(&request).await?;
//!     if let Some(best) = result.best() {
//!         println!("{} {}", best.protocol, best.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod stream;
pub mod token_store;

pub use config::ResolverConfig;
pub use error::{ResolveError, Result};
pub use http_client::HttpFetcher;
pub use token_store::TokenStore;
pub use stream::{
    Channel, DeferredReason, PayloadFetcher, Protocol, ResolutionRequest, ResolutionResult,
    StreamCandidate, StreamResolver,
};

/// Version of chanres
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
