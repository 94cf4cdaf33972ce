//! Supported channels.
//!
//! Each site is one [`Channel`] variant backed by a module holding its URL
//! rules and the mapping from its playback payload to [`StreamMetadata`].

pub mod dplay;
pub mod goplay;
pub mod kijk;
pub mod vrtnu;

use std::fmt;

use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::stream::metadata::StreamMetadata;
use crate::stream::scrape::PageRecovery;

/// A website whose videos can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// GoPlay (VIER, VIJF, ZES), Belgium
    GoPlay,
    /// Dplay Sweden (Kanal 5, Kanal 9, Kanal 11)
    Dplay,
    /// VRT NU, Belgium
    VrtNu,
    /// Kijk (SBS6, Net5, Veronica, SBS9), Netherlands
    Kijk,
}

impl Channel {
    pub const fn all() -> [Channel; 4] {
        [Channel::GoPlay, Channel::Dplay, Channel::VrtNu, Channel::Kijk]
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::GoPlay => "goplay",
            Channel::Dplay => "dplay",
            Channel::VrtNu => "vrtnu",
            Channel::Kijk => "kijk",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Channel::GoPlay => "GoPlay (VIER, VIJF, ZES)",
            Channel::Dplay => "Dplay Sweden",
            Channel::VrtNu => "VRT NU",
            Channel::Kijk => "Kijk (SBS6, Net5, Veronica, SBS9)",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|channel| channel.name().eq_ignore_ascii_case(name))
    }

    /// First channel whose URL rules claim `url`.
    pub fn detect(url: &str) -> Option<Self> {
        Self::all().into_iter().find(|channel| channel.matches(url))
    }

    pub fn matches(self, url: &str) -> bool {
        match self {
            Channel::GoPlay => goplay::matches(url),
            Channel::Dplay => dplay::matches(url),
            Channel::VrtNu => vrtnu::matches(url),
            Channel::Kijk => kijk::matches(url),
        }
    }

    /// Whether fetching `resolve_url` needs a bearer token.
    pub fn requires_auth(self, resolve_url: &str) -> bool {
        match self {
            Channel::GoPlay => goplay::requires_auth(resolve_url),
            Channel::Dplay => dplay::requires_auth(resolve_url),
            Channel::VrtNu | Channel::Kijk => false,
        }
    }

    /// Headers sent with every metadata fetch.
    pub fn extra_headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Channel::GoPlay => goplay::EXTRA_HEADERS,
            Channel::Kijk => kijk::EXTRA_HEADERS,
            Channel::Dplay | Channel::VrtNu => &[],
        }
    }

    /// Recovery needed to get from a page URL to something resolvable.
    pub fn page_recovery(self, url: &str) -> Option<PageRecovery> {
        match self {
            Channel::GoPlay => goplay::page_recovery(url),
            Channel::Dplay => None,
            Channel::VrtNu => vrtnu::page_recovery(url),
            Channel::Kijk => kijk::page_recovery(url),
        }
    }

    /// API URL to fetch for a URL that needs no page recovery.
    pub fn resolve_url_for(self, url: &str) -> String {
        match self {
            Channel::Dplay => dplay::resolve_url_for(url),
            Channel::Kijk => kijk::resolve_url_for(url),
            Channel::GoPlay | Channel::VrtNu => url.to_string(),
        }
    }

    /// Map the site's playback payload. `source_url` is only used in errors.
    pub fn metadata_from_json(self, value: &Value, source_url: &str) -> Result<StreamMetadata> {
        if !value.is_object() {
            return Err(ResolveError::malformed(
                source_url,
                "playback payload is not a JSON object",
            ));
        }
        match self {
            Channel::GoPlay => goplay::metadata_from_json(value, source_url),
            Channel::Dplay => Ok(dplay::metadata_from_json(value)),
            Channel::VrtNu => vrtnu::metadata_from_json(value, source_url),
            Channel::Kijk => kijk::metadata_from_json(value, source_url),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for channel in Channel::all() {
            assert_eq!(Channel::from_name(channel.name()), Some(channel));
        }
        assert_eq!(Channel::from_name("GoPlay"), Some(Channel::GoPlay));
        assert_eq!(Channel::from_name("KIJK"), Some(Channel::Kijk));
        assert_eq!(Channel::from_name("npo"), None);
    }

    #[test]
    fn detect_by_url() {
        assert_eq!(
            Channel::detect("https://www.goplay.be/video/de-slimste-mens/s1/ep1"),
            Some(Channel::GoPlay)
        );
        assert_eq!(
            Channel::detect("https://disco-api.dplay.se/playback/videoPlaybackInfo/1"),
            Some(Channel::Dplay)
        );
        assert_eq!(
            Channel::detect("https://www.vrt.be/vrtnu/a-z/pano/2019/pano-s2019a1/"),
            Some(Channel::VrtNu)
        );
        assert_eq!(
            Channel::detect("https://www.kijk.nl/programmas/utopia/Zq1xB"),
            Some(Channel::Kijk)
        );
        assert_eq!(Channel::detect("https://example.com/video"), None);
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let err = Channel::GoPlay
            .metadata_from_json(&serde_json::json!([1, 2]), "https://api/x")
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedResponse { .. }));
    }
}
