//! HLS playlist parser
//!
//! Handles:
//! - Master playlists (`#EXT-X-STREAM-INF` variants, sorted as listed)
//! - Media playlists (the playlist itself is the only variant)
//! - `#EXT-X-MEDIA` audio groups mapped onto their variants
//! - `#EXT-X-MEDIA` subtitle tracks
//! - Propagation of the manifest's query string (CDN tokens) to variants

use std::collections::HashMap;

use tracing::debug;

use super::{resolve_url, ManifestParser, ParsedManifest};
use crate::error::{ResolveError, Result};
use crate::stream::types::ManifestVariant;

/// Parser for HLS (`.m3u8`) playlists.
#[derive(Debug, Clone, Default)]
pub struct HlsPlaylistParser;

impl HlsPlaylistParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        let mut chars = attr_str.chars().peekable();

        while chars.peek().is_some() {
            let key: String = chars.by_ref().take_while(|&c| c != '=').collect();

            if key.is_empty() {
                break;
            }

            let value = if chars.peek() == Some(&'"') {
                chars.next(); // opening quote
                let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
                chars.next(); // trailing comma
                v
            } else {
                chars.by_ref().take_while(|&c| c != ',').collect()
            };

            attrs.insert(key.trim().to_string(), value.trim().to_string());
        }

        attrs
    }

    /// Append the manifest's query string when the variant has none of its own.
    fn with_query(url: String, query: Option<&str>) -> String {
        match query {
            Some(q) if !url.contains('?') => format!("{url}?{q}"),
            _ => url,
        }
    }
}

impl ManifestParser for HlsPlaylistParser {
    fn name(&self) -> &'static str {
        "hls"
    }

    fn parse(&self, manifest_url: &str, body: &str) -> Result<ParsedManifest> {
        if !body.trim_start_matches('\u{feff}').trim_start().starts_with("#EXTM3U") {
            return Err(ResolveError::malformed(manifest_url, "missing #EXTM3U header"));
        }

        let query = manifest_url.split_once('?').map(|(_, q)| q).filter(|q| !q.is_empty());
        let resolve = |uri: &str| Self::with_query(resolve_url(manifest_url, uri), query);

        if !body.contains("#EXT-X-STREAM-INF:") {
            debug!("Media playlist, using it as the only variant");
            return Ok(ParsedManifest {
                variants: vec![ManifestVariant {
                    url: manifest_url.to_string(),
                    bandwidth: 0,
                    audio_url: None,
                }],
                ..ParsedManifest::default()
            });
        }

        let mut audio_groups: HashMap<String, String> = HashMap::new();
        let mut default_audio = None;
        let mut subtitle_url = None;

        for line in body.lines() {
            let Some(rest) = line.strip_prefix("#EXT-X-MEDIA:") else {
                continue;
            };
            let attrs = Self::parse_attributes(rest);
            let Some(uri) = attrs.get("URI") else {
                continue;
            };
            let uri = resolve(uri.as_str());

            match attrs.get("TYPE").map(String::as_str) {
                Some("AUDIO") => {
                    let is_default = attrs.get("DEFAULT").is_some_and(|d| d == "YES");
                    if let Some(group) = attrs.get("GROUP-ID") {
                        audio_groups.entry(group.clone()).or_insert_with(|| uri.clone());
                    }
                    if is_default || default_audio.is_none() {
                        default_audio = Some(uri);
                    }
                }
                Some("SUBTITLES") if subtitle_url.is_none() => subtitle_url = Some(uri),
                _ => {}
            }
        }

        let mut variants = Vec::new();
        let mut lines = body.lines().peekable();

        // `#EXT-X-I-FRAME-STREAM-INF` lines are trick-play only and never match.
        while let Some(line) = lines.next() {
            let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
                continue;
            };
            let attrs = Self::parse_attributes(rest);
            let bandwidth = attrs
                .get("BANDWIDTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let audio_url = attrs.get("AUDIO").and_then(|g| audio_groups.get(g)).cloned();

            if let Some(uri_line) = lines.peek() {
                if !uri_line.starts_with('#') && !uri_line.trim().is_empty() {
                    variants.push(ManifestVariant {
                        url: resolve(uri_line.trim()),
                        bandwidth,
                        audio_url,
                    });
                    lines.next();
                }
            }
        }

        debug!(variants = variants.len(), "Parsed HLS master playlist");

        Ok(ParsedManifest {
            variants,
            audio_url: default_audio,
            subtitle_url,
            license_url: None,
        })
    }
}
