//! Page-scrape recovery.
//!
//! Some channels only expose a web page for a video. One extra fetch of
//! that page yields the id of the real API resource, the playback metadata
//! itself embedded as JSON in the markup, or a bare manifest link.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ResolveError, Result};
use crate::stream::fetcher::{FetchRequest, PayloadFetcher};
use crate::stream::metadata::{StreamDescriptor, StreamMetadata};
use crate::stream::providers::Channel;
use crate::stream::types::{Protocol, ResolutionRequest};

/// How to get from a page URL to something resolvable.
#[derive(Debug, Clone)]
pub enum PageRecovery {
    /// Fetch `fetch_url`, capture an id and substitute it for `{id}` in `target`.
    RedirectId {
        fetch_url: String,
        pattern: Regex,
        target: &'static str,
    },
    /// Fetch `fetch_url`, capture a JSON document and take the value at `pointer`.
    EmbeddedJson {
        fetch_url: String,
        pattern: Regex,
        pointer: &'static str,
    },
    /// Fetch `fetch_url` (an embed player) and capture a manifest URL,
    /// possibly JSON-escaped.
    ManifestLink {
        fetch_url: String,
        pattern: Regex,
        protocol: Protocol,
        referer: Option<String>,
    },
}

/// Outcome of a successful recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered {
    /// The API URL to resolve instead of the page.
    ResolveUrl { id: String, url: String },
    /// Playback metadata taken straight from the page.
    Metadata(Value),
    /// A manifest linked from the page.
    Descriptor(StreamDescriptor),
}

impl PageRecovery {
    pub fn fetch_url(&self) -> &str {
        match self {
            PageRecovery::RedirectId { fetch_url, .. }
            | PageRecovery::EmbeddedJson { fetch_url, .. }
            | PageRecovery::ManifestLink { fetch_url, .. } => fetch_url,
        }
    }

    fn pattern(&self) -> &Regex {
        match self {
            PageRecovery::RedirectId { pattern, .. }
            | PageRecovery::EmbeddedJson { pattern, .. }
            | PageRecovery::ManifestLink { pattern, .. } => pattern,
        }
    }

    /// Perform the single page fetch and extract what the page holds.
    #[instrument(skip(self, fetcher), fields(url = %self.fetch_url()))]
    pub async fn recover(&self, fetcher: &dyn PayloadFetcher) -> Result<Recovered> {
        let url = self.fetch_url();
        let mut request = FetchRequest::get(url);
        if let PageRecovery::ManifestLink {
            referer: Some(referer),
            ..
        } = self
        {
            request = request.header("Referer", referer.as_str());
        }

        let response = fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(ResolveError::transport(
                url,
                format!("page returned {}", response.status),
            ));
        }

        let captured = self
            .pattern()
            .captures(&response.body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                ResolveError::NotFound(format!("pattern {} on {url}", self.pattern().as_str()))
            })?;

        match self {
            PageRecovery::RedirectId { target, .. } => {
                let id = captured.to_string();
                let url = target.replace("{id}", &urlencoding::encode(&id));
                debug!(%id, %url, "Recovered resolve URL from page");
                Ok(Recovered::ResolveUrl { id, url })
            }
            PageRecovery::EmbeddedJson { pointer, .. } => {
                let document: Value = serde_json::from_str(captured).map_err(|e| {
                    debug!(payload = captured, "Embedded JSON did not parse");
                    ResolveError::malformed(url, format!("embedded JSON: {e}"))
                })?;
                let value = document.pointer(pointer).cloned().ok_or_else(|| {
                    debug!(payload = captured, pointer, "Embedded JSON lacks pointer");
                    ResolveError::malformed(url, format!("embedded JSON has no {pointer}"))
                })?;
                Ok(Recovered::Metadata(value))
            }
            PageRecovery::ManifestLink { protocol, .. } => {
                let manifest = captured.replace('\\', "");
                debug!(%manifest, "Recovered manifest link from page");
                Ok(Recovered::Descriptor(StreamDescriptor::new(*protocol, manifest)))
            }
        }
    }
}

/// Turn a user-facing URL into a [`ResolutionRequest`], recovering through
/// the page when the channel needs it.
pub async fn request_for_url(
    fetcher: &dyn PayloadFetcher,
    channel: Channel,
    url: &str,
) -> Result<ResolutionRequest> {
    let Some(recovery) = channel.page_recovery(url) else {
        let resolve_url = channel.resolve_url_for(url);
        let item_id = item_id_from_url(&resolve_url);
        return Ok(ResolutionRequest::new(channel, item_id, resolve_url));
    };

    match recovery.recover(fetcher).await? {
        Recovered::ResolveUrl { id, url } => Ok(ResolutionRequest::new(channel, id, url)),
        Recovered::Metadata(value) => {
            let metadata = channel.metadata_from_json(&value, url)?;
            Ok(ResolutionRequest::new(channel, item_id_from_url(url), url).with_prefetched(metadata))
        }
        Recovered::Descriptor(descriptor) => {
            let metadata = StreamMetadata {
                descriptors: vec![descriptor],
                ..StreamMetadata::default()
            };
            Ok(ResolutionRequest::new(channel, item_id_from_url(url), url).with_prefetched(metadata))
        }
    }
}

/// Last non-empty path segment, falling back to the whole URL.
fn item_id_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| url.to_string())
}
