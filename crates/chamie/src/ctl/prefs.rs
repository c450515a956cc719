//! Persisted terminal-client preferences.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Small TOML file under the user config dir.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// The one-time hint about continuing truncated answers was dismissed.
    pub continue_hint_dismissed: bool,
}

impl Prefs {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chamie").join("prefs.toml"))
    }

    /// Load preferences; missing or unreadable files fall back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|err| {
                debug!(error = %err, "ignoring malformed prefs file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path().context("no user config directory")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize prefs")?;
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))
    }
}
