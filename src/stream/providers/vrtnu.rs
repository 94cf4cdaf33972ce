//! VRT NU (Belgium)
//!
//! Video pages carry a companion `.securevideo.json` document whose `mzid`
//! points at a mediazone asset; the asset lists the target URLs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::stream::metadata::{str_at, StreamDescriptor, StreamMetadata};
use crate::stream::scrape::PageRecovery;
use crate::stream::types::Protocol;

static MZID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""mzid"\s*:\s*"([^"]+)""#).expect("valid regex"));

#[derive(Debug, Deserialize)]
struct TargetUrl {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

pub(super) fn matches(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "vrt.be" || h.ends_with(".vrt.be")))
        .unwrap_or(false)
}

pub(super) fn page_recovery(url: &str) -> Option<PageRecovery> {
    if url.contains("mediazone.vrt.be") {
        return None;
    }
    Some(PageRecovery::RedirectId {
        fetch_url: format!("{}.securevideo.json", url.trim_end_matches('/')),
        pattern: MZID.clone(),
        target: "https://mediazone.vrt.be/api/v1/vrtvideo/assets/{id}",
    })
}

pub(super) fn metadata_from_json(value: &Value, source_url: &str) -> Result<StreamMetadata> {
    let mut metadata = StreamMetadata {
        drm_key: str_at(value, "/drm").map(str::to_string),
        message: str_at(value, "/message").map(str::to_string),
        ..StreamMetadata::default()
    };

    if let Some(raw) = value.get("targetUrls").filter(|v| !v.is_null()) {
        let targets: Vec<TargetUrl> = serde_json::from_value(raw.clone())
            .map_err(|e| ResolveError::malformed(source_url, format!("targetUrls: {e}")))?;

        for target in targets {
            match Protocol::from_site_name(&target.kind) {
                Some(protocol) if !target.url.is_empty() => metadata
                    .descriptors
                    .push(StreamDescriptor::new(protocol, https_url(&target.url))),
                _ => debug!(kind = %target.kind, "Skipping target URL"),
            }
        }
    }

    Ok(metadata)
}

/// Protocol-relative (`//host/...`) URLs become https.
fn https_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// One video tile as listed on a programme page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoTile {
    pub title: String,
    pub url: Option<String>,
    pub thumb: Option<String>,
}

/// A playable entry produced from a page listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub title: String,
    pub url: String,
    pub thumb: Option<String>,
}

/// Turn a page's tiles into entries.
///
/// A tile without a URL is the page's single video and plays from the
/// page itself, but only while no other video has been produced; after
/// that it duplicates an entry already listed.
pub fn fold_video_tiles(tiles: &[VideoTile], page_url: &str) -> Vec<VideoEntry> {
    let (entries, _seen_video) = tiles.iter().fold(
        (Vec::with_capacity(tiles.len()), false),
        |(mut entries, seen_video), tile| {
            let url = match tile.url.as_deref() {
                Some(url) => https_url(url),
                None if seen_video => {
                    debug!(title = %tile.title, "Single video tile duplicates a listed video");
                    return (entries, seen_video);
                }
                None => page_url.to_string(),
            };
            entries.push(VideoEntry {
                title: tile.title.trim().to_string(),
                url,
                thumb: tile.thumb.as_deref().map(https_url),
            });
            (entries, true)
        },
    );
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tile(title: &str, url: Option<&str>) -> VideoTile {
        VideoTile {
            title: title.to_string(),
            url: url.map(str::to_string),
            thumb: Some("//images.vrt.be/x.jpg".to_string()),
        }
    }

    #[test]
    fn target_urls_in_order() {
        let metadata = metadata_from_json(
            &json!({"targetUrls": [
                {"type": "HLS", "url": "https://cdn/vrt.m3u8"},
                {"type": "hls_aes", "url": "https://cdn/aes.m3u8"},
                {"type": "MPEG_DASH", "url": "//cdn/vrt.mpd"}
            ]}),
            "https://mediazone.vrt.be/api/v1/vrtvideo/assets/1",
        )
        .unwrap();
        assert_eq!(metadata.descriptors.len(), 2);
        assert_eq!(metadata.descriptors[1].protocol, Protocol::Dash);
        assert_eq!(metadata.descriptors[1].url, "https://cdn/vrt.mpd");
    }

    #[test]
    fn drm_and_message() {
        let metadata = metadata_from_json(
            &json!({"drm": "vualto-key", "message": "Locked", "targetUrls": null}),
            "https://mediazone.vrt.be/api/v1/vrtvideo/assets/1",
        )
        .unwrap();
        assert_eq!(metadata.drm_key.as_deref(), Some("vualto-key"));
        assert_eq!(metadata.message.as_deref(), Some("Locked"));
    }

    #[test]
    fn secure_video_recovery() {
        let Some(PageRecovery::RedirectId { fetch_url, pattern, target }) =
            page_recovery("https://www.vrt.be/vrtnu/a-z/pano/2019/pano-s2019a1/")
        else {
            panic!("expected redirect recovery");
        };
        assert_eq!(
            fetch_url,
            "https://www.vrt.be/vrtnu/a-z/pano/2019/pano-s2019a1.securevideo.json"
        );
        let body = r#"{"/content/dam/vrt/pano": {"mzid" : "pbs-pub-1234"}}"#;
        assert_eq!(&pattern.captures(body).unwrap()[1], "pbs-pub-1234");
        assert!(target.contains("{id}"));
    }

    #[test]
    fn single_video_tile_uses_page_url() {
        let entries = fold_video_tiles(&[tile("  pano  ", None)], "https://www.vrt.be/vrtnu/pano/");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "pano");
        assert_eq!(entries[0].url, "https://www.vrt.be/vrtnu/pano/");
        assert_eq!(entries[0].thumb.as_deref(), Some("https://images.vrt.be/x.jpg"));
    }

    #[test]
    fn single_video_tile_dropped_after_real_tiles() {
        let entries = fold_video_tiles(
            &[
                tile("ep 1", Some("//www.vrt.be/vrtnu/pano/1/")),
                tile("pano", None),
                tile("ep 2", Some("https://www.vrt.be/vrtnu/pano/2/")),
            ],
            "https://www.vrt.be/vrtnu/pano/",
        );
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://www.vrt.be/vrtnu/pano/1/", "https://www.vrt.be/vrtnu/pano/2/"]
        );
    }

    #[test]
    fn fold_state_does_not_leak_between_pages() {
        let first = fold_video_tiles(&[tile("a", Some("https://x/a"))], "https://x/");
        let second = fold_video_tiles(&[tile("b", None)], "https://y/");
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].url, "https://y/");
    }
}
