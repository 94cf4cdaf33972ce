//! Normalized playback metadata.
//!
//! Every site describes its streams differently; the per-channel mapping
//! functions in [`providers`](super::providers) turn those payloads into a
//! [`StreamMetadata`] the resolver can reason about.

use serde_json::Value;

use crate::stream::types::Protocol;

/// A declared stream: transport plus manifest URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub protocol: Protocol,
    pub url: String,
    /// Set by channels that know a stream is geo-fenced from its own rules,
    /// independent of the resolver's URL marker.
    pub geo_fenced: bool,
    /// Bearer token for the stream's DRM license requests.
    pub play_token: Option<String>,
}

impl StreamDescriptor {
    pub fn new(protocol: Protocol, url: impl Into<String>) -> Self {
        Self {
            protocol,
            url: url.into(),
            geo_fenced: false,
            play_token: None,
        }
    }

    #[must_use]
    pub fn geo_fenced(mut self, geo_fenced: bool) -> Self {
        self.geo_fenced = geo_fenced;
        self
    }

    #[must_use]
    pub fn with_play_token(mut self, token: impl Into<String>) -> Self {
        self.play_token = Some(token.into());
        self
    }
}

impl<S: Into<String>> From<(Protocol, S)> for StreamDescriptor {
    fn from((protocol, url): (Protocol, S)) -> Self {
        Self::new(protocol, url)
    }
}

/// Identifiers for a server-side ad insertion stitching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaiIdentifiers {
    pub content_source_id: String,
    pub video_id: String,
}

/// What a site says about one video's playback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub drm_key: Option<String>,
    /// In the order the site lists them.
    pub descriptors: Vec<StreamDescriptor>,
    pub ssai: Option<SsaiIdentifiers>,
    /// Explanation given by the site when no stream is offered.
    pub message: Option<String>,
    pub duration_seconds: Option<u64>,
    /// Embed page to scrape for a manifest when nothing else is declared.
    pub embed_page: Option<String>,
}

impl StreamMetadata {
    pub fn with_descriptor(mut self, protocol: Protocol, url: impl Into<String>) -> Self {
        self.descriptors.push(StreamDescriptor::new(protocol, url));
        self
    }
}

/// Non-empty string at a JSON pointer.
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Non-empty string or number at a JSON pointer, as text.
pub(crate) fn id_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_at_skips_empty_and_non_strings() {
        let value = json!({"a": {"b": "x", "empty": "", "num": 3}});
        assert_eq!(str_at(&value, "/a/b"), Some("x"));
        assert_eq!(str_at(&value, "/a/empty"), None);
        assert_eq!(str_at(&value, "/a/num"), None);
        assert_eq!(str_at(&value, "/missing"), None);
    }

    #[test]
    fn id_at_accepts_numbers() {
        let value = json!({"id": 1234, "slug": "abc", "nil": null});
        assert_eq!(id_at(&value, "/id").as_deref(), Some("1234"));
        assert_eq!(id_at(&value, "/slug").as_deref(), Some("abc"));
        assert_eq!(id_at(&value, "/nil"), None);
    }
}
