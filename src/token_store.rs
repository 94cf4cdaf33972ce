//! Refresh tokens persisted between runs in `~/.local/share/chanres/tokens.json`.
//!
//! Identity providers rotate refresh tokens; keeping the latest one lets the
//! next run renew silently instead of logging in with the password again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::stream::providers::Channel;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStore {
    /// Keyed by channel name.
    #[serde(default)]
    refresh_tokens: BTreeMap<String, String>,
    #[serde(skip)]
    path: PathBuf,
}

impl TokenStore {
    /// Load from `path`; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No token store yet");
            return Ok(Self {
                path: path.to_path_buf(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolveError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut store: Self = serde_json::from_str(&content)
            .map_err(|e| ResolveError::Config(format!("{}: {e}", path.display())))?;
        store.path = path.to_path_buf();
        Ok(store)
    }

    pub fn refresh_token(&self, channel: Channel) -> Option<&str> {
        self.refresh_tokens.get(channel.name()).map(String::as_str)
    }

    /// Record `token`; returns whether it differs from the stored one.
    pub fn set_refresh_token(&mut self, channel: Channel, token: &str) -> bool {
        if self.refresh_token(channel) == Some(token) {
            return false;
        }
        self.refresh_tokens
            .insert(channel.name().to_string(), token.to_string());
        true
    }

    /// Write the store back, readable by the owner only.
    pub fn save(&self) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ResolveError::Config(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ResolveError::Config(format!("failed to encode tokens: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| ResolveError::Config(format!("failed to write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
                ResolveError::Config(format!("failed to restrict {}: {e}", path.display()))
            })?;
        }

        debug!(path = %path.display(), "Saved token store");
        Ok(())
    }
}

/// Return the path to the token store.
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chanres")
        .join("tokens.json")
}
