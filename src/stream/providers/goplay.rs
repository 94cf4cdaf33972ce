//! GoPlay (Belgium)
//!
//! Long-form videos come from an authenticated JSON API; pages under
//! `/video/` embed the NextJS stream collection directly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::stream::metadata::{id_at, str_at, SsaiIdentifiers, StreamDescriptor, StreamMetadata};
use crate::stream::scrape::PageRecovery;
use crate::stream::types::Protocol;

pub const LONG_FORM_API: &str = "https://api.goplay.be/web/v1/videos/long-form/";

/// Cognito user pool backing GoPlay accounts.
pub const COGNITO_POOL_ID: &str = "eu-west-1_dViSsKM5Y";
/// App client of the GoPlay web player.
///
/// Password logins go through `USER_PASSWORD_AUTH`, which only works while
/// this client has that flow enabled. The web player itself logs in with
/// SRP (`USER_SRP_AUTH`); if the pool rejects plain password auth, seed a
/// refresh token in the config instead, renewal uses `REFRESH_TOKEN_AUTH`.
pub const COGNITO_CLIENT_ID: &str = "6s1h851s8uplco5h6mqh1jac8m";

pub(super) const EXTRA_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

static LIST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"listId":"([^"]+)""#).expect("valid regex"));
static NEXTJS_VIDEO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\{"video":\{.+?\})\]\}\],"#).expect("valid regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamCollection {
    #[serde(default)]
    drm_key: Option<String>,
    #[serde(default)]
    streams: Vec<CollectionStream>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CollectionStream {
    protocol: String,
    url: String,
}

pub(super) fn matches(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "goplay.be" || h.ends_with(".goplay.be")))
        .unwrap_or(false)
}

pub(super) fn requires_auth(resolve_url: &str) -> bool {
    resolve_url.starts_with(LONG_FORM_API)
}

pub(super) fn page_recovery(url: &str) -> Option<PageRecovery> {
    if url.starts_with(LONG_FORM_API) {
        return None;
    }

    if url.contains("goplay.be/video/") {
        Some(PageRecovery::EmbeddedJson {
            fetch_url: url.to_string(),
            pattern: NEXTJS_VIDEO.clone(),
            pointer: "/video",
        })
    } else {
        Some(PageRecovery::RedirectId {
            fetch_url: url.to_string(),
            pattern: LIST_ID.clone(),
            target: "https://api.goplay.be/web/v1/videos/long-form/{id}",
        })
    }
}

/// Handles both the long-form API payload and the NextJS `video` object.
pub(super) fn metadata_from_json(value: &Value, source_url: &str) -> Result<StreamMetadata> {
    let mut metadata = StreamMetadata {
        message: str_at(value, "/message").map(str::to_string),
        ..StreamMetadata::default()
    };

    if let Some(url) = str_at(value, "/manifestUrls/hls") {
        metadata.descriptors.push((Protocol::Hls, url).into());
    }
    if let Some(url) = str_at(value, "/manifestUrls/dash") {
        metadata.descriptors.push((Protocol::Dash, url).into());
    }

    if let (Some(content_source_id), Some(video_id)) = (
        id_at(value, "/ssai/contentSourceID"),
        id_at(value, "/ssai/videoID"),
    ) {
        metadata.ssai = Some(SsaiIdentifiers {
            content_source_id,
            video_id,
        });
    }

    if let Some(raw) = value.get("streamCollection").filter(|v| !v.is_null()) {
        let collection: StreamCollection = serde_json::from_value(raw.clone())
            .map_err(|e| ResolveError::malformed(source_url, format!("streamCollection: {e}")))?;

        metadata.drm_key = collection.drm_key.filter(|k| !k.is_empty());
        metadata.duration_seconds = collection
            .duration
            .filter(|d| *d > 0.0)
            .map(whole_seconds);
        metadata.descriptors.extend(collection.streams.into_iter().filter_map(|stream| {
            Protocol::from_site_name(&stream.protocol)
                .filter(|_| !stream.url.is_empty())
                .map(|protocol| {
                    // collection URLs carry a bare `/geo` segment prefix (`/geoblocked/`)
                    let fenced = stream.url.contains("/geo");
                    StreamDescriptor::new(protocol, stream.url).geo_fenced(fenced)
                })
        }));
    }

    Ok(metadata)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(duration: f64) -> u64 {
    duration.round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_urls_hls_then_dash() {
        let metadata = metadata_from_json(
            &json!({"manifestUrls": {"dash": "https://cdn/x.mpd", "hls": "https://cdn/x.m3u8"}}),
            "https://api",
        )
        .unwrap();
        assert_eq!(metadata.descriptors.len(), 2);
        assert_eq!(metadata.descriptors[0].protocol, Protocol::Hls);
        assert_eq!(metadata.descriptors[1].url, "https://cdn/x.mpd");
        assert!(metadata.ssai.is_none());
    }

    #[test]
    fn ssai_and_message() {
        let metadata = metadata_from_json(
            &json!({
                "manifestUrls": {},
                "ssai": {"contentSourceID": 2500000, "videoID": "V1"},
                "message": "Locked"
            }),
            "https://api",
        )
        .unwrap();
        assert!(metadata.descriptors.is_empty());
        assert_eq!(
            metadata.ssai,
            Some(SsaiIdentifiers {
                content_source_id: "2500000".to_string(),
                video_id: "V1".to_string(),
            })
        );
        assert_eq!(metadata.message.as_deref(), Some("Locked"));
    }

    #[test]
    fn stream_collection_drm_and_streams() {
        let metadata = metadata_from_json(
            &json!({
                "uuid": "abc",
                "streamCollection": {
                    "drmKey": "drm-1",
                    "duration": 1523.6,
                    "streams": [
                        {"protocol": "dash", "url": "https://cdn/geo/a.mpd"},
                        {"protocol": "hls", "url": "https://cdn/a.m3u8"},
                        {"protocol": "smooth", "url": "https://cdn/a.ism"}
                    ]
                }
            }),
            "https://www.goplay.be/video/x",
        )
        .unwrap();
        assert_eq!(metadata.drm_key.as_deref(), Some("drm-1"));
        assert_eq!(metadata.duration_seconds, Some(1524));
        assert_eq!(metadata.descriptors.len(), 2);
        assert_eq!(metadata.descriptors[0].protocol, Protocol::Dash);
        assert!(metadata.descriptors[0].geo_fenced);
        assert!(!metadata.descriptors[1].geo_fenced);
    }

    #[test]
    fn collection_geo_prefix_without_trailing_slash() {
        let metadata = metadata_from_json(
            &json!({"streamCollection": {"streams": [
                {"protocol": "hls", "url": "https://cdn/geoblocked/a.m3u8"}
            ]}}),
            "https://www.goplay.be/video/x",
        )
        .unwrap();
        assert!(metadata.descriptors[0].geo_fenced);

        let api = metadata_from_json(
            &json!({"manifestUrls": {"hls": "https://cdn/geoblocked/a.m3u8"}}),
            LONG_FORM_API,
        )
        .unwrap();
        assert!(!api.descriptors[0].geo_fenced);
    }

    #[test]
    fn empty_drm_key_is_ignored() {
        let metadata = metadata_from_json(
            &json!({"streamCollection": {"drmKey": "", "streams": []}}),
            "https://www.goplay.be/video/x",
        )
        .unwrap();
        assert!(metadata.drm_key.is_none());
    }

    #[test]
    fn bad_stream_collection_is_malformed() {
        let err = metadata_from_json(
            &json!({"streamCollection": {"streams": "nope"}}),
            "https://www.goplay.be/video/x",
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedResponse { .. }));
    }

    #[test]
    fn recovery_per_page_kind() {
        assert!(page_recovery("https://api.goplay.be/web/v1/videos/long-form/123").is_none());
        assert!(matches!(
            page_recovery("https://www.goplay.be/video/de-container-cup/s1/ep3"),
            Some(PageRecovery::EmbeddedJson { .. })
        ));
        assert!(matches!(
            page_recovery("https://www.goplay.be/de-container-cup"),
            Some(PageRecovery::RedirectId { .. })
        ));
    }

    #[test]
    fn nextjs_pattern_captures_video_object() {
        let page = r#"self.__next_f.push([1,[{"video":{"uuid":"u1","streamCollection":null}}]}],"x"])"#;
        let captured = NEXTJS_VIDEO.captures(page).unwrap().get(1).unwrap().as_str();
        let value: Value = serde_json::from_str(captured).unwrap();
        assert_eq!(value["video"]["uuid"], "u1");
    }

    #[test]
    fn only_long_form_api_needs_auth() {
        assert!(requires_auth("https://api.goplay.be/web/v1/videos/long-form/123"));
        assert!(!requires_auth("https://www.goplay.be/video/x"));
        assert!(matches("https://www.goplay.be/x"));
        assert!(!matches("https://notgoplay.be.evil.example/x"));
    }
}
