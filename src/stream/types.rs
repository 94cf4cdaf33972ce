//! Request, candidate and result types for stream resolution.
//!
//! A [`ResolutionRequest`] is built fresh for every playback attempt and a
//! [`ResolutionResult`] is handed back exactly once; neither is cached.

use std::fmt;

use serde::Serialize;

use crate::error::{ResolveError, Result};
use crate::stream::metadata::StreamMetadata;
use crate::stream::providers::Channel;

/// Preference weight of a DASH candidate when Widevine playback is preferred.
pub const WEIGHT_DASH_WIDEVINE: u32 = 1550;
/// Preference weight of a DASH candidate when Widevine is not preferred.
pub const WEIGHT_DASH: u32 = 1450;
/// Preference weight of an HLS candidate.
pub const WEIGHT_HLS: u32 = 1500;
/// Preference weight of a server-side-ad-insertion stream (last resort).
pub const WEIGHT_SSAI: u32 = 0;

/// Transport protocol of a stream representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Hls,
    Dash,
}

impl Protocol {
    /// Parse the protocol names used by site APIs (`hls`, `dash`, `mpeg_dash`).
    pub fn from_site_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hls" => Some(Self::Hls),
            "dash" | "mpeg_dash" => Some(Self::Dash),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Hls => write!(f, "HLS"),
            Protocol::Dash => write!(f, "DASH"),
        }
    }
}

/// One quality variant found inside a probed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestVariant {
    pub url: String,
    /// Bits per second, 0 when the manifest does not declare it.
    pub bandwidth: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// A playable representation of the selected video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCandidate {
    pub protocol: Protocol,
    pub url: String,
    /// Higher is preferred. Order in the result does not imply preference.
    pub weight: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
    /// Only filled when manifest probing is enabled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ManifestVariant>,
    /// License server found while probing the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    /// Bearer token the license server expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_token: Option<String>,
}

impl StreamCandidate {
    pub fn new(protocol: Protocol, url: impl Into<String>, weight: u32) -> Self {
        Self {
            protocol,
            url: url.into(),
            weight,
            audio_url: None,
            subtitle_url: None,
            variants: Vec::new(),
            license_url: None,
            license_token: None,
        }
    }
}

/// Why a resolution ended without a playable candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredReason {
    /// No stored credentials and no refresh token.
    MissingCredentials,
    /// Stored credentials were refused by the identity provider.
    InvalidCredentials,
    /// The site refused the request again after one token renewal.
    AuthRejected,
    /// No descriptor, no SSAI identifiers and no site message.
    NoManifestFound,
    /// Playback needs an external DRM license flow.
    DrmProtected,
    /// The site's own explanation, passed through verbatim.
    SiteMessage(String),
}

impl fmt::Display for DeferredReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredReason::MissingCredentials => write!(f, "missing_credentials"),
            DeferredReason::InvalidCredentials => write!(f, "invalid_credentials"),
            DeferredReason::AuthRejected => write!(f, "auth_rejected"),
            DeferredReason::NoManifestFound => write!(f, "no_manifest"),
            DeferredReason::DrmProtected => write!(f, "drm_protected"),
            DeferredReason::SiteMessage(message) => write!(f, "{message}"),
        }
    }
}

impl Serialize for DeferredReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Input to a single resolution attempt.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// Opaque item identifier, used for logging only.
    pub item_id: String,
    /// URL returning the item's playback metadata.
    pub resolve_url: String,
    /// Site whose payload shape applies.
    pub channel: Channel,
    /// Whether the metadata endpoint needs a bearer token.
    pub requires_auth: bool,
    /// Metadata that is already known; skips authentication and the primary fetch.
    pub prefetched: Option<StreamMetadata>,
}

impl ResolutionRequest {
    /// Build a request whose auth requirement follows the channel's rules.
    pub fn new(channel: Channel, item_id: impl Into<String>, resolve_url: impl Into<String>) -> Self {
        let resolve_url = resolve_url.into();
        Self {
            item_id: item_id.into(),
            requires_auth: channel.requires_auth(&resolve_url),
            resolve_url,
            channel,
            prefetched: None,
        }
    }

    #[must_use]
    pub fn with_prefetched(mut self, metadata: StreamMetadata) -> Self {
        self.prefetched = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Reject requests that can never be resolved.
    pub fn validate(&self) -> Result<()> {
        if self.item_id.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("empty item id".to_string()));
        }

        let parsed = url::Url::parse(&self.resolve_url).map_err(|e| {
            ResolveError::InvalidRequest(format!("resolve url {:?}: {e}", self.resolve_url))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResolveError::InvalidRequest(format!(
                "unsupported scheme in resolve url {:?}",
                self.resolve_url
            )));
        }

        Ok(())
    }
}

/// Output of a single resolution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// True iff at least one candidate was produced.
    pub complete: bool,
    pub geo_locked: bool,
    pub drm_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drm_key: Option<String>,
    pub candidates: Vec<StreamCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred_reason: Option<DeferredReason>,
}

impl ResolutionResult {
    /// An incomplete result carrying only a reason.
    pub fn deferred(reason: DeferredReason) -> Self {
        Self {
            deferred_reason: Some(reason),
            ..Self::default()
        }
    }

    /// A DRM item: flagged, keyed, and never playable directly.
    pub fn drm(key: impl Into<String>) -> Self {
        Self {
            geo_locked: true,
            drm_required: true,
            drm_key: Some(key.into()),
            deferred_reason: Some(DeferredReason::DrmProtected),
            ..Self::default()
        }
    }

    /// Highest-weight candidate; the first one listed wins ties.
    pub fn best(&self) -> Option<&StreamCandidate> {
        self.candidates
            .iter()
            .rev()
            .max_by_key(|candidate| candidate.weight)
    }

    pub(crate) fn push(&mut self, candidate: StreamCandidate) {
        self.candidates.push(candidate);
        self.complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_from_site_names() {
        assert_eq!(Protocol::from_site_name("hls"), Some(Protocol::Hls));
        assert_eq!(Protocol::from_site_name("HLS"), Some(Protocol::Hls));
        assert_eq!(Protocol::from_site_name("mpeg_dash"), Some(Protocol::Dash));
        assert_eq!(Protocol::from_site_name("hls_aes"), None);
    }

    #[test]
    fn deferred_reason_strings() {
        assert_eq!(DeferredReason::MissingCredentials.to_string(), "missing_credentials");
        assert_eq!(DeferredReason::NoManifestFound.to_string(), "no_manifest");
        assert_eq!(
            DeferredReason::SiteMessage("Locked".to_string()).to_string(),
            "Locked"
        );
    }

    #[test]
    fn best_prefers_weight_then_listing_order() {
        let mut result = ResolutionResult::default();
        result.push(StreamCandidate::new(Protocol::Hls, "https://cdn/a.m3u8", WEIGHT_HLS));
        result.push(StreamCandidate::new(Protocol::Dash, "https://cdn/a.mpd", WEIGHT_DASH_WIDEVINE));
        result.push(StreamCandidate::new(Protocol::Dash, "https://cdn/b.mpd", WEIGHT_DASH_WIDEVINE));

        let best = result.best().unwrap();
        assert_eq!(best.url, "https://cdn/a.mpd");
        assert!(result.complete);
    }

    #[test]
    fn drm_result_has_no_candidates() {
        let result = ResolutionResult::drm("key-1");
        assert!(result.drm_required);
        assert!(result.geo_locked);
        assert!(!result.complete);
        assert!(result.candidates.is_empty());
        assert_eq!(result.deferred_reason, Some(DeferredReason::DrmProtected));
    }

    #[test]
    fn validate_rejects_bad_requests() {
        let ok = ResolutionRequest::new(Channel::Dplay, "42", "https://disco-api.dplay.se/x/42");
        assert!(ok.validate().is_ok());

        let empty_id = ResolutionRequest::new(Channel::Dplay, " ", "https://disco-api.dplay.se/x");
        assert!(matches!(empty_id.validate(), Err(ResolveError::InvalidRequest(_))));

        let relative = ResolutionRequest::new(Channel::Dplay, "42", "/videos/42");
        assert!(matches!(relative.validate(), Err(ResolveError::InvalidRequest(_))));

        let ftp = ResolutionRequest::new(Channel::Dplay, "42", "ftp://host/42");
        assert!(matches!(ftp.validate(), Err(ResolveError::InvalidRequest(_))));
    }

    #[test]
    fn result_serializes_reason_as_string() {
        let result = ResolutionResult::deferred(DeferredReason::SiteMessage("Locked".into()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["deferred_reason"], "Locked");
        assert_eq!(json["complete"], false);
    }
}
