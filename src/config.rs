use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::editor::{EditorSettings, RunMergePolicy};

/// User settings read from `~/.config/outline/config.toml`.
///
/// Every field has a default, so a partial file only overrides what it
/// names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How pasted runs meet host runs of another format.
    pub run_merge_policy: RunMergePolicy,
    /// Turn `- `, `* ` and `1. ` typed at the start of a paragraph into lists.
    pub markdown_shortcuts: bool,
    /// Split typed `#word` tokens into hashtag runs.
    pub recognize_hashtags: bool,
    /// Mirror copies to the system clipboard and paste from it.
    pub sync_system_clipboard: bool,
    /// Wrap width of the text column; `0` uses the whole terminal.
    pub max_line_width: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_merge_policy: RunMergePolicy::KeepSeparate,
            markdown_shortcuts: true,
            recognize_hashtags: true,
            sync_system_clipboard: true,
            max_line_width: 100,
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|mut path| {
            path.push(".config");
            path.push("outline");
            path.push("config.toml");
            path
        })
    }

    /// Loads the user's configuration. Anything that goes wrong falls back
    /// to the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "ignoring configuration");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to encode configuration")?;
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            run_merge_policy: self.run_merge_policy,
            markdown_shortcuts: self.markdown_shortcuts,
            recognize_hashtags: self.recognize_hashtags,
        }
    }

    /// Text column width for a terminal `available` cells wide.
    pub fn wrap_width(&self, available: u16) -> u16 {
        if self.max_line_width == 0 {
            available
        } else {
            available.min(self.max_line_width)
        }
    }
}
