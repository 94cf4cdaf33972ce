//! Resolver configuration loaded from `~/.config/chanres/config.toml`.
//!
//! Every field is optional; a missing file yields the defaults.
//!
//! ```toml
//! prefer_widevine = false
//! lock_messages = ["Locked", "Geo-blocked"]
//! timeout_secs = 20
//!
//! [credentials.goplay]
//! username = "viewer@example.com"
//! password = "hunter2"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::stream::auth::Credentials;
use crate::stream::providers::Channel;
use crate::stream::resolver::{ResolverOptions, DEFAULT_SSAI_ENDPOINT};

/// Contents of `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    pub prefer_widevine: bool,
    pub geo_marker: String,
    pub lock_messages: Vec<String>,
    pub probe_manifests: bool,
    /// Per-request timeout for every HTTP call.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub ssai_endpoint: String,
    /// Keyed by channel name (`goplay`, `dplay`, `vrtnu`, `kijk`).
    pub credentials: HashMap<String, Credentials>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let options = ResolverOptions::default();
        Self {
            prefer_widevine: options.prefer_widevine,
            geo_marker: options.geo_marker,
            lock_messages: options.lock_messages,
            probe_manifests: options.probe_manifests,
            timeout_secs: 30,
            user_agent: format!("chanres/{}", env!("CARGO_PKG_VERSION")),
            ssai_endpoint: DEFAULT_SSAI_ENDPOINT.to_string(),
            credentials: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Load from the default location.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] if the file exists but cannot be read
    /// or is not valid.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] on unreadable or invalid files.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolveError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content).map_err(|e| match e {
            ResolveError::Config(reason) => {
                ResolveError::Config(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Config`] for invalid TOML or values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ResolveError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ResolveError::Config("timeout_secs must be positive".to_string()));
        }
        if !self.ssai_endpoint.contains("{content_source_id}")
            || !self.ssai_endpoint.contains("{video_id}")
        {
            return Err(ResolveError::Config(
                "ssai_endpoint needs {content_source_id} and {video_id} placeholders".to_string(),
            ));
        }
        if let Some(unknown) = self
            .credentials
            .keys()
            .find(|name| Channel::from_name(name).is_none())
        {
            return Err(ResolveError::Config(format!(
                "credentials for unknown channel {unknown:?}"
            )));
        }
        Ok(())
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            prefer_widevine: self.prefer_widevine,
            geo_marker: self.geo_marker.clone(),
            lock_messages: self.lock_messages.clone(),
            probe_manifests: self.probe_manifests,
            ssai_endpoint: self.ssai_endpoint.clone(),
        }
    }

    /// Stored credentials for `channel`, empty when none are configured.
    pub fn credentials_for(&self, channel: Channel) -> Credentials {
        self.credentials
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(channel.name()))
            .map(|(_, credentials)| credentials.clone())
            .unwrap_or_default()
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chanres")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = ResolverConfig::from_toml("").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert!(config.prefer_widevine);
        assert_eq!(config.geo_marker, "/geo/");
        assert_eq!(config.lock_messages, vec!["Locked"]);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn overrides_and_credentials() {
        let config = ResolverConfig::from_toml(
            r#"
prefer_widevine = false
probe_manifests = true
lock_messages = ["Locked", "Geo-blocked"]

[credentials.goplay]
username = "viewer@example.com"
password = "hunter2"

[credentials.dplay]
refresh_token = "r-1"
"#,
        )
        .unwrap();

        let options = config.resolver_options();
        assert!(!options.prefer_widevine);
        assert!(options.probe_manifests);
        assert_eq!(options.lock_messages.len(), 2);

        let goplay = config.credentials_for(Channel::GoPlay);
        assert_eq!(goplay.username.as_deref(), Some("viewer@example.com"));
        assert_eq!(
            config.credentials_for(Channel::Dplay).refresh_token.as_deref(),
            Some("r-1")
        );
        assert_eq!(config.credentials_for(Channel::VrtNu), Credentials::default());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ResolverConfig::from_toml("timeout_secs = 0"),
            Err(ResolveError::Config(_))
        ));
        assert!(matches!(
            ResolverConfig::from_toml(r#"ssai_endpoint = "https://dai.example/streams""#),
            Err(ResolveError::Config(_))
        ));
        assert!(matches!(
            ResolverConfig::from_toml("[credentials.npo]\nusername = \"x\""),
            Err(ResolveError::Config(_))
        ));
        assert!(matches!(
            ResolverConfig::from_toml("prefer_widevine = \"yes\""),
            Err(ResolveError::Config(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("chanres-{}.toml", uuid::Uuid::new_v4()));
        let config = ResolverConfig::load_from(&path).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("chanres-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "geo_marker = \"/geoblocked/\"\ntimeout_secs = 5\n").unwrap();
        let config = ResolverConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.geo_marker, "/geoblocked/");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn config_path_ends_with_file_name() {
        assert!(config_path().ends_with("chanres/config.toml"));
    }
}
