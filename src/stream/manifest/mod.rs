//! Manifest parsers.
//!
//! A [`ManifestParser`] turns manifest text into an ordered list of
//! [`ManifestVariant`]s plus any audio or subtitle track it advertises.
//! Parsers are pure; fetching the manifest is the resolver's job.

pub mod dash;
pub mod hls;

pub use dash::DashManifestParser;
pub use hls::HlsPlaylistParser;

use crate::error::Result;
use crate::stream::types::ManifestVariant;

/// Everything a manifest says about its representations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    /// Variants in manifest order.
    pub variants: Vec<ManifestVariant>,
    /// First (or default) separate audio track.
    pub audio_url: Option<String>,
    /// First WebVTT/subtitle track.
    pub subtitle_url: Option<String>,
    /// DRM license server advertised by the manifest.
    pub license_url: Option<String>,
}

/// Parses one manifest format.
pub trait ManifestParser: Send + Sync {
    /// Short lowercase format name (`"hls"`, `"dash"`).
    fn name(&self) -> &'static str;

    /// Parse `body`, resolving relative URIs against `manifest_url`.
    fn parse(&self, manifest_url: &str, body: &str) -> Result<ParsedManifest>;
}

/// Resolve `reference` against `base`, keeping absolute URLs untouched.
pub(crate) fn resolve_url(base: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    url::Url::parse(base)
        .and_then(|base| base.join(reference))
        .map_or_else(|_| reference.to_string(), |joined| joined.to_string())
}
