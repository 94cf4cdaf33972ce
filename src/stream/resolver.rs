//! On-demand stream resolution.
//!
//! [`StreamResolver::resolve`] turns one [`ResolutionRequest`] into a
//! [`ResolutionResult`]. Each step is awaited in order on the caller's task:
//!
//! 1. authenticate when the request needs it
//! 2. fetch and map the channel's playback metadata (one auth retry on 401)
//! 3. stop at a DRM key
//! 4. weight every declared descriptor, flagging geo-fenced URLs
//! 5. when nothing was declared, scrape the channel's embed page if it names one
//! 6. then fall back to SSAI stitching
//! 7. otherwise report the site's message (lock messages mark geo-locks)

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{ResolveError, Result};
use crate::stream::auth::{AuthError, AuthProvider, Token};
use crate::stream::fetcher::{FetchRequest, FetchResponse, PayloadFetcher};
use crate::stream::manifest::{DashManifestParser, HlsPlaylistParser, ManifestParser};
use crate::stream::metadata::{str_at, SsaiIdentifiers, StreamDescriptor, StreamMetadata};
use crate::stream::providers::Channel;
use crate::stream::scrape::Recovered;
use crate::stream::types::{
    DeferredReason, Protocol, ResolutionRequest, ResolutionResult, StreamCandidate, WEIGHT_DASH,
    WEIGHT_DASH_WIDEVINE, WEIGHT_HLS, WEIGHT_SSAI,
};

/// Google DAI stitching endpoint used for SSAI-only items.
pub const DEFAULT_SSAI_ENDPOINT: &str =
    "https://dai.google.com/ondemand/dash/content/{content_source_id}/vid/{video_id}/streams";

/// Tunables of a [`StreamResolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Prefer DASH (Widevine capable player) over HLS.
    pub prefer_widevine: bool,
    /// Substring of a manifest URL that marks a geo-fenced stream.
    pub geo_marker: String,
    /// Site messages that mean "not available in your region".
    pub lock_messages: Vec<String>,
    /// Fetch and parse every manifest to attach its variants.
    ///
    /// Probing is best effort: a manifest that fails to fetch (including a
    /// timeout) or to parse is logged at warn level and its candidate is
    /// kept without variants, so these errors never reach the caller.
    pub probe_manifests: bool,
    /// Template with `{content_source_id}` and `{video_id}` placeholders.
    pub ssai_endpoint: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            prefer_widevine: true,
            geo_marker: "/geo/".to_string(),
            lock_messages: vec!["Locked".to_string()],
            probe_manifests: false,
            ssai_endpoint: DEFAULT_SSAI_ENDPOINT.to_string(),
        }
    }
}

/// Outcome of the authenticated metadata fetch.
enum Fetched {
    Metadata(StreamMetadata),
    Deferred(DeferredReason),
}

/// Resolves playable candidates for channel videos.
pub struct StreamResolver {
    fetcher: Arc<dyn PayloadFetcher>,
    auth: Option<Arc<dyn AuthProvider>>,
    parsers: Vec<Box<dyn ManifestParser>>,
    options: ResolverOptions,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<dyn PayloadFetcher>, options: ResolverOptions) -> Self {
        Self {
            fetcher,
            auth: None,
            parsers: vec![
                Box::new(HlsPlaylistParser::new()),
                Box::new(DashManifestParser::new()),
            ],
            options,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Register a parser, replacing any parser with the same name.
    #[must_use]
    pub fn with_parser(mut self, parser: Box<dyn ManifestParser>) -> Self {
        self.parsers.retain(|p| p.name() != parser.name());
        self.parsers.push(parser);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve one request. Expected failures come back as a deferred result.
    #[instrument(skip(self, request), fields(item = %request.item_id, channel = %request.channel))]
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolutionResult> {
        request.validate()?;

        let metadata = if let Some(prefetched) = &request.prefetched {
            debug!("Using prefetched metadata");
            prefetched.clone()
        } else {
            match self.fetch_metadata(request).await? {
                Fetched::Metadata(metadata) => metadata,
                Fetched::Deferred(reason) => {
                    info!(%reason, "Resolution deferred");
                    return Ok(ResolutionResult::deferred(reason));
                }
            }
        };

        let result = self.resolve_metadata(request.channel, &metadata).await?;
        debug!(
            complete = result.complete,
            geo_locked = result.geo_locked,
            candidates = result.candidates.len(),
            "Resolution finished"
        );
        Ok(result)
    }

    async fn fetch_metadata(&self, request: &ResolutionRequest) -> Result<Fetched> {
        let mut token = None;
        if request.requires_auth {
            match self.token().await? {
                Ok(t) => token = Some(t),
                Err(reason) => return Ok(Fetched::Deferred(reason)),
            }
        }

        let mut renewed = false;
        loop {
            let mut fetch = FetchRequest::get(&request.resolve_url)
                .headers(request.channel.extra_headers().iter().copied());
            if let Some(token) = &token {
                fetch = fetch.header("Authorization", token.bearer());
            }

            let response = self.fetcher.fetch(&fetch).await?;

            if request.requires_auth && response.is_auth_rejected() {
                if renewed {
                    warn!("Token rejected again after renewal");
                    return Ok(Fetched::Deferred(DeferredReason::AuthRejected));
                }
                info!("Token rejected, renewing once");
                renewed = true;
                if let (Some(auth), Some(rejected)) = (&self.auth, &token) {
                    auth.invalidate(rejected).await;
                }
                match self.token().await? {
                    Ok(t) => token = Some(t),
                    Err(reason) => return Ok(Fetched::Deferred(reason)),
                }
                continue;
            }

            return Self::map_payload(request, &response).map(Fetched::Metadata);
        }
    }

    /// A token, or the reason there is none. Transport failures propagate.
    async fn token(&self) -> Result<std::result::Result<Token, DeferredReason>> {
        let Some(auth) = &self.auth else {
            warn!("Authentication required but no provider configured");
            return Ok(Err(DeferredReason::MissingCredentials));
        };

        match auth.ensure_token().await {
            Ok(token) => Ok(Ok(token)),
            Err(AuthError::MissingCredentials) => Ok(Err(DeferredReason::MissingCredentials)),
            Err(AuthError::InvalidCredentials) => Ok(Err(DeferredReason::InvalidCredentials)),
            Err(AuthError::Transport(e)) => Err(e),
        }
    }

    fn map_payload(request: &ResolutionRequest, response: &FetchResponse) -> Result<StreamMetadata> {
        let url = &request.resolve_url;
        let value: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) if response.is_success() => {
                debug!(payload = %response.body, "Playback payload is not JSON");
                return Err(ResolveError::malformed(url, format!("invalid JSON: {e}")));
            }
            Err(_) => {
                return Err(ResolveError::transport(
                    url,
                    format!("metadata endpoint returned {}", response.status),
                ))
            }
        };

        if !response.is_success() {
            debug!(status = response.status, "Mapping error payload");
        }
        request.channel.metadata_from_json(&value, url)
    }

    async fn resolve_metadata(
        &self,
        channel: Channel,
        metadata: &StreamMetadata,
    ) -> Result<ResolutionResult> {
        if let Some(key) = &metadata.drm_key {
            info!("Found DRM enabled item");
            return Ok(ResolutionResult::drm(key.clone()));
        }

        let mut result = ResolutionResult::default();

        for descriptor in &metadata.descriptors {
            self.push_descriptor(&mut result, descriptor).await;
        }

        if !metadata.descriptors.is_empty() {
            return Ok(result);
        }

        if let Some(page) = &metadata.embed_page {
            if let Some(descriptor) = self.scrape_embed_page(channel, page).await? {
                self.push_descriptor(&mut result, &descriptor).await;
                return Ok(result);
            }
        }

        if let Some(ssai) = &metadata.ssai {
            info!("No stream data found, trying SSAI data");
            result.push(self.stitch_ssai(ssai).await?);
            return Ok(result);
        }

        result.deferred_reason = Some(match &metadata.message {
            Some(message) => {
                if self.is_lock_message(message) {
                    result.geo_locked = true;
                }
                info!(%message, "No stream manifest found");
                DeferredReason::SiteMessage(message.clone())
            }
            None => DeferredReason::NoManifestFound,
        });
        Ok(result)
    }

    async fn push_descriptor(&self, result: &mut ResolutionResult, descriptor: &StreamDescriptor) {
        if descriptor.geo_fenced || self.is_geo_fenced(&descriptor.url) {
            debug!(url = %descriptor.url, "Geo-fenced manifest");
            result.geo_locked = true;
        }
        let candidate = self.candidate_for(descriptor).await;
        result.push(candidate);
    }

    /// One fetch of the channel's embed player. A page without a manifest
    /// link falls through to the remaining fallbacks.
    async fn scrape_embed_page(
        &self,
        channel: Channel,
        page: &str,
    ) -> Result<Option<StreamDescriptor>> {
        let Some(recovery) = channel.page_recovery(page) else {
            debug!(page, "Channel has no recovery for embed page");
            return Ok(None);
        };

        match recovery.recover(self.fetcher.as_ref()).await {
            Ok(Recovered::Descriptor(descriptor)) => Ok(Some(descriptor)),
            Ok(_) => Ok(None),
            Err(ResolveError::NotFound(reason)) => {
                info!(%reason, "No manifest on embed page");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn candidate_for(&self, descriptor: &StreamDescriptor) -> StreamCandidate {
        let weight = match descriptor.protocol {
            Protocol::Dash if self.options.prefer_widevine => WEIGHT_DASH_WIDEVINE,
            Protocol::Dash => WEIGHT_DASH,
            Protocol::Hls => WEIGHT_HLS,
        };
        let mut candidate = StreamCandidate::new(descriptor.protocol, &descriptor.url, weight);
        candidate.license_token = descriptor.play_token.clone();

        if self.options.probe_manifests {
            if let Err(e) = self.probe(&mut candidate).await {
                warn!(url = %candidate.url, error = %e, "Manifest probe failed, keeping bare candidate");
            }
        }

        candidate
    }

    async fn probe(&self, candidate: &mut StreamCandidate) -> Result<()> {
        let name = match candidate.protocol {
            Protocol::Hls => "hls",
            Protocol::Dash => "dash",
        };
        let Some(parser) = self.parsers.iter().find(|p| p.name() == name) else {
            return Ok(());
        };

        let response = self.fetcher.fetch(&FetchRequest::get(&candidate.url)).await?;
        if !response.is_success() {
            return Err(ResolveError::transport(
                &candidate.url,
                format!("manifest returned {}", response.status),
            ));
        }

        let parsed = parser.parse(&candidate.url, &response.body)?;
        candidate.variants = parsed.variants;
        candidate.audio_url = parsed.audio_url;
        candidate.subtitle_url = parsed.subtitle_url;
        candidate.license_url = parsed.license_url;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stitch_ssai(&self, ssai: &SsaiIdentifiers) -> Result<StreamCandidate> {
        let url = self
            .options
            .ssai_endpoint
            .replace(
                "{content_source_id}",
                &urlencoding::encode(&ssai.content_source_id),
            )
            .replace("{video_id}", &urlencoding::encode(&ssai.video_id));

        let request = FetchRequest::post(&url, json!({ "api-key": "null" }).to_string())
            .header("Content-Type", "application/json");
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(ResolveError::transport(
                &url,
                format!("stitching endpoint returned {}", response.status),
            ));
        }

        let value: Value = serde_json::from_str(&response.body).map_err(|e| {
            debug!(payload = %response.body, "Stitching payload is not JSON");
            ResolveError::malformed(&url, format!("invalid JSON: {e}"))
        })?;
        let manifest = str_at(&value, "/stream_manifest")
            .ok_or_else(|| ResolveError::malformed(&url, "missing stream_manifest"))?;

        Ok(StreamCandidate::new(Protocol::Dash, manifest, WEIGHT_SSAI))
    }

    fn is_geo_fenced(&self, manifest_url: &str) -> bool {
        let marker = self.options.geo_marker.to_ascii_lowercase();
        !marker.is_empty() && manifest_url.to_ascii_lowercase().contains(&marker)
    }

    fn is_lock_message(&self, message: &str) -> bool {
        let message = message.trim();
        self.options
            .lock_messages
            .iter()
            .any(|lock| lock.eq_ignore_ascii_case(message))
    }
}
