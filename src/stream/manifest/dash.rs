//! DASH (MPD) manifest parser.
//!
//! The MPD is deserialized into a small typed tree covering only
//! `Period/AdaptationSet/Representation` and their `BaseURL`s. Segment
//! templates are left to the player, so a representation without a
//! `BaseURL` of its own (or of its set) is reported with the manifest URL.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::debug;

use super::{resolve_url, ManifestParser, ParsedManifest};
use crate::error::{ResolveError, Result};
use crate::stream::types::ManifestVariant;

#[derive(Debug, Deserialize)]
struct Mpd {
    #[serde(rename = "BaseURL", default)]
    base_urls: Vec<BaseUrl>,
    #[serde(rename = "Period", default)]
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
struct Period {
    #[serde(rename = "BaseURL", default)]
    base_urls: Vec<BaseUrl>,
    #[serde(rename = "AdaptationSet", default)]
    adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Deserialize)]
struct AdaptationSet {
    #[serde(rename = "@contentType")]
    content_type: Option<String>,
    #[serde(rename = "@mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "@codecs")]
    codecs: Option<String>,
    #[serde(rename = "BaseURL", default)]
    base_urls: Vec<BaseUrl>,
    #[serde(rename = "Representation", default)]
    representations: Vec<Representation>,
}

#[derive(Debug, Deserialize)]
struct Representation {
    #[serde(rename = "@mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "@codecs")]
    codecs: Option<String>,
    #[serde(rename = "@bandwidth")]
    bandwidth: Option<u64>,
    #[serde(rename = "BaseURL", default)]
    base_urls: Vec<BaseUrl>,
}

#[derive(Debug, Deserialize)]
struct BaseUrl {
    #[serde(rename = "$text", default)]
    url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Video,
    Audio,
    Text,
}

impl ContentKind {
    fn from_hints(hint: Option<&str>, codecs: Option<&str>) -> Option<Self> {
        let hint = hint.unwrap_or_default();
        let codecs = codecs.unwrap_or_default();

        if hint.starts_with("audio") {
            Some(Self::Audio)
        } else if hint.starts_with("video") {
            Some(Self::Video)
        } else if hint.starts_with("text") || codecs == "wvtt" || codecs == "stpp" {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// First non-empty `BaseURL` text.
fn first_base(base_urls: &[BaseUrl]) -> Option<&str> {
    base_urls
        .iter()
        .map(|b| b.url.trim())
        .find(|url| !url.is_empty())
}

/// Parser for DASH `.mpd` manifests.
#[derive(Debug, Clone, Default)]
pub struct DashManifestParser;

impl DashManifestParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Local name of the document element, `None` when there is none.
    fn root_element(body: &str) -> Option<String> {
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e)) => {
                    return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Ok(Event::Eof) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// First `licenseUrl` attribute anywhere in the document (ContentProtection extensions).
    fn license_url(body: &str) -> Option<String> {
        let mut reader = Reader::from_str(body);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e)) => {
                    let found = e.attributes().flatten().find_map(|attr| {
                        (attr.key.local_name().as_ref() == b"licenseUrl")
                            .then(|| attr.unescape_value().ok())
                            .flatten()
                            .map(|value| value.trim().to_string())
                            .filter(|value| !value.is_empty())
                    });
                    if found.is_some() {
                        return found;
                    }
                }
                Ok(Event::Eof) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }
}

impl ManifestParser for DashManifestParser {
    fn name(&self) -> &'static str {
        "dash"
    }

    fn parse(&self, manifest_url: &str, body: &str) -> Result<ParsedManifest> {
        if Self::root_element(body).as_deref() != Some("MPD") {
            return Err(ResolveError::malformed(manifest_url, "not a DASH manifest"));
        }

        let mpd: Mpd = quick_xml::de::from_str(body).map_err(|e| {
            debug!(payload = body, "MPD did not deserialize");
            ResolveError::malformed(manifest_url, format!("invalid MPD: {e}"))
        })?;

        let mpd_base = first_base(&mpd.base_urls)
            .map_or_else(|| manifest_url.to_string(), |b| resolve_url(manifest_url, b));

        let mut video = Vec::new();
        let mut audio_url = None;
        let mut subtitle_url = None;
        let mut loose_vtt = None;

        for period in &mpd.periods {
            let period_base = first_base(&period.base_urls)
                .map_or_else(|| mpd_base.clone(), |b| resolve_url(&mpd_base, b));

            for set in &period.adaptation_sets {
                let set_kind = ContentKind::from_hints(
                    set.content_type.as_deref().or(set.mime_type.as_deref()),
                    set.codecs.as_deref(),
                );
                let set_base = first_base(&set.base_urls).map(|b| resolve_url(&period_base, b));

                if let Some(base) = &set_base {
                    if loose_vtt.is_none() && base.ends_with(".vtt") {
                        loose_vtt = Some(base.clone());
                    }
                }

                for rep in &set.representations {
                    let kind = ContentKind::from_hints(rep.mime_type.as_deref(), rep.codecs.as_deref())
                        .or(set_kind)
                        .unwrap_or(ContentKind::Video);

                    let url = match (first_base(&rep.base_urls), &set_base) {
                        (Some(own), Some(set)) => resolve_url(set, own),
                        (Some(own), None) => resolve_url(&period_base, own),
                        (None, Some(set)) => set.clone(),
                        (None, None) => manifest_url.to_string(),
                    };

                    match kind {
                        ContentKind::Video => video.push((url, rep.bandwidth.unwrap_or(0))),
                        ContentKind::Audio if audio_url.is_none() && url != manifest_url => {
                            audio_url = Some(url);
                        }
                        ContentKind::Text if subtitle_url.is_none() && url != manifest_url => {
                            subtitle_url = Some(url);
                        }
                        _ if loose_vtt.is_none() && url.ends_with(".vtt") => loose_vtt = Some(url),
                        _ => {}
                    }
                }
            }
        }

        let variants = video
            .into_iter()
            .map(|(url, bandwidth)| ManifestVariant {
                url,
                bandwidth,
                audio_url: audio_url.clone(),
            })
            .collect::<Vec<_>>();

        debug!(variants = variants.len(), "Parsed DASH manifest");

        Ok(ParsedManifest {
            variants,
            audio_url,
            subtitle_url: subtitle_url.or(loose_vtt),
            license_url: Self::license_url(body),
        })
    }
}
