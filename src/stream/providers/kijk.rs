//! Kijk (Netherlands): SBS6, Net5, Veronica, SBS9
//!
//! The embed API answers with a DASH entitlement (manifest plus license
//! play token) and a plain HLS playlist. Brightcove-hosted items only get a
//! placeholder playlist; their manifest is scraped from the embed player.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::stream::metadata::{str_at, StreamDescriptor, StreamMetadata};
use crate::stream::scrape::PageRecovery;
use crate::stream::types::Protocol;

pub const VIDEO_API: &str = "https://embed.kijk.nl/api/video/";
const EMBED_PLAYER: &str = "https://embed.kijk.nl/video/";
const PLACEHOLDER_PLAYLIST: &str = "https://embed.kijk.nl/api/playlist/.m3u8";

/// Without this media type the API hands out empty Brightcove playlists.
pub(super) const EXTRA_HEADERS: &[(&str, &str)] =
    &[("Accept", "application/vnd.sbs.ovp+json; version=2.0")];

static EMBED_M3U8: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(https:[^"]+\.m3u8)"#).expect("valid regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayEntitlement {
    media_locator: String,
    #[serde(default)]
    play_token: Option<String>,
}

pub(super) fn matches(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "kijk.nl" || h.ends_with(".kijk.nl")))
        .unwrap_or(false)
}

pub(super) fn page_recovery(url: &str) -> Option<PageRecovery> {
    if !url.starts_with(EMBED_PLAYER) {
        return None;
    }
    let referer = url.split('?').next().unwrap_or(url).to_string();
    Some(PageRecovery::ManifestLink {
        fetch_url: url.to_string(),
        pattern: EMBED_M3U8.clone(),
        protocol: Protocol::Hls,
        referer: Some(referer),
    })
}

/// Video API URL for a kijk.nl page or video id.
pub(super) fn resolve_url_for(url: &str) -> String {
    if url.starts_with(VIDEO_API) {
        return url.to_string();
    }
    let id = url
        .split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    format!(
        "{VIDEO_API}{}?id=kijkapp&format=DASH&drm=CENC",
        urlencoding::encode(id)
    )
}

fn is_placeholder(playlist: &str) -> bool {
    playlist == PLACEHOLDER_PLAYLIST || playlist.contains("hostingervice=brightcove")
}

pub(super) fn metadata_from_json(value: &Value, source_url: &str) -> Result<StreamMetadata> {
    let mut metadata = StreamMetadata::default();

    if let Some(raw) = value.pointer("/entitlements/play").filter(|v| !v.is_null()) {
        let play: PlayEntitlement = serde_json::from_value(raw.clone())
            .map_err(|e| ResolveError::malformed(source_url, format!("entitlements.play: {e}")))?;

        let url = if play.media_locator.starts_with("//") {
            format!("https:{}", play.media_locator)
        } else {
            play.media_locator
        };
        let mut descriptor = StreamDescriptor::new(Protocol::Dash, url);
        if let Some(token) = play.play_token.filter(|t| !t.is_empty()) {
            descriptor = descriptor.with_play_token(token);
        }
        metadata.descriptors.push(descriptor);
    }

    match str_at(value, "/playlist") {
        Some(playlist) if is_placeholder(playlist) => {
            debug!(playlist, "Placeholder playlist, using the embed player");
            metadata.embed_page = str_at(value, "/vpakey")
                .map(|key| format!("{EMBED_PLAYER}{}?width=868&height=491", urlencoding::encode(key)));
        }
        Some(playlist) => metadata.descriptors.push((Protocol::Hls, playlist).into()),
        None => {}
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entitlement_dash_then_playlist() {
        let metadata = metadata_from_json(
            &json!({
                "entitlements": {"play": {
                    "mediaLocator": "//vod.kijk.nl/abc/manifest.mpd",
                    "playToken": "pt-1"
                }},
                "playlist": "https://vod.kijk.nl/abc/master.m3u8"
            }),
            VIDEO_API,
        )
        .unwrap();

        assert_eq!(metadata.descriptors.len(), 2);
        assert_eq!(metadata.descriptors[0].protocol, Protocol::Dash);
        assert_eq!(metadata.descriptors[0].url, "https://vod.kijk.nl/abc/manifest.mpd");
        assert_eq!(metadata.descriptors[0].play_token.as_deref(), Some("pt-1"));
        assert_eq!(metadata.descriptors[1].protocol, Protocol::Hls);
        assert!(metadata.embed_page.is_none());
    }

    #[test]
    fn placeholder_playlist_points_at_embed_player() {
        for playlist in [
            PLACEHOLDER_PLAYLIST,
            "https://embed.kijk.nl/api/playlist/x.m3u8?hostingervice=brightcove&id=1",
        ] {
            let metadata = metadata_from_json(
                &json!({"playlist": playlist, "vpakey": "ab12"}),
                VIDEO_API,
            )
            .unwrap();
            assert!(metadata.descriptors.is_empty());
            assert_eq!(
                metadata.embed_page.as_deref(),
                Some("https://embed.kijk.nl/video/ab12?width=868&height=491")
            );
        }
    }

    #[test]
    fn entitlement_without_locator_is_malformed() {
        let err = metadata_from_json(&json!({"entitlements": {"play": {"playToken": "x"}}}), VIDEO_API)
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedResponse { .. }));
    }

    #[test]
    fn urls_and_recovery() {
        assert!(matches("https://www.kijk.nl/programmas/utopia/Zq1xB"));
        assert!(!matches("https://kijk.nl.example.com/x"));
        assert_eq!(
            resolve_url_for("https://www.kijk.nl/video/Zq1xB/"),
            "https://embed.kijk.nl/api/video/Zq1xB?id=kijkapp&format=DASH&drm=CENC"
        );
        assert!(page_recovery(VIDEO_API).is_none());
        match page_recovery("https://embed.kijk.nl/video/ab12?width=868&height=491") {
            Some(PageRecovery::ManifestLink { referer, protocol, .. }) => {
                assert_eq!(referer.as_deref(), Some("https://embed.kijk.nl/video/ab12"));
                assert_eq!(protocol, Protocol::Hls);
            }
            other => panic!("unexpected recovery {other:?}"),
        }
    }
}
