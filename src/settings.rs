// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent user settings and application paths.
//!
//! Settings are loaded once at startup into a [`Settings`] value that is
//! passed by reference to whatever needs it. The file is only rewritten when
//! the user runs one of the `setting.<name>=<value>` commands.
//!
//! ```text
//! ~/.pldl/
//! ├── settings.json        key, plFolder, maxResults, progStyle
//! └── Playlist/
//!     ├── <playlistId>.json  in-progress manifest
//!     └── <playlistId>.lock
//! ```

use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the application home directory.
pub const HOME_ENV: &str = "PLDL_HOME";

/// Accepted values for `setting.progStyle`.
pub const PROGRESS_STYLE_RANGE: RangeInclusive<u8> = 1..=8;

/// Accepted values for `setting.maxResults`. YouTube caps playlists at 5000 items.
pub const MAX_RESULTS_RANGE: RangeInclusive<u32> = 1..=5000;

const SETTINGS_FILE: &str = "settings.json";
const MANIFEST_DIR: &str = "Playlist";

/// Resolved locations of everything pldl keeps outside the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    home: PathBuf,
}

impl AppPaths {
    /// Locate the application home: `$PLDL_HOME`, else `~/.pldl`.
    pub fn discover() -> Result<Self> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::at(dir));
        }
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::at(home.join(".pldl")))
    }

    /// Use an explicit home directory.
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    /// Directory holding the per-playlist manifests.
    pub fn manifest_dir(&self) -> PathBuf {
        self.home.join(MANIFEST_DIR)
    }

    /// Manifest file keyed by playlist id.
    pub fn manifest_file(&self, playlist_id: &str) -> PathBuf {
        self.manifest_dir().join(format!("{}.json", playlist_id))
    }
}

/// User settings persisted in `settings.json`.
///
/// Field names on disk match the historical settings document so existing
/// files keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// YouTube Data API key
    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Put each playlist's videos in a folder named after the playlist
    #[serde(rename = "plFolder", default)]
    pub playlist_folder: bool,
    /// Stop listing after this many videos (unbounded when unset)
    #[serde(rename = "maxResults", default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    /// Progress bar glyph style, 1-8
    #[serde(rename = "progStyle", default = "default_progress_style")]
    pub progress_style: u8,
}

fn default_progress_style() -> u8 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            playlist_folder: false,
            max_results: None,
            progress_style: default_progress_style(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))?;
        Ok(settings)
    }

    /// Write settings to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings to JSON")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", path))?;
        Ok(())
    }

    /// The API key, if one has been saved and is not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// A `setting.<name>=<value>` command from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    ApiKey(String),
    PlaylistFolder(bool),
    MaxResults(u32),
    ProgressStyle(u8),
}

/// Why a setting command was rejected. Nothing is written when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingError {
    /// `setting.<name>` with no `=value`
    MissingValue(String),
    /// `setting.<name>` that pldl does not know
    Unknown(String),
    /// Value not numeric or outside the accepted range
    OutOfRange {
        name: &'static str,
        value: String,
        min: u32,
        max: u32,
    },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(name) => {
                write!(f, "Missing value for setting \"{}\". Use setting.{}=<value>", name, name)
            }
            Self::Unknown(name) => write!(f, "Unknown setting \"{}\"", name),
            Self::OutOfRange { name, value, min, max } => write!(
                f,
                "Invalid {} value \"{}\". Allowed values are {}-{}.",
                name, value, min, max
            ),
        }
    }
}

impl std::error::Error for SettingError {}

impl SettingChange {
    /// Parse a command-line argument.
    ///
    /// Returns `Ok(None)` when the argument is not a setting command at all.
    pub fn parse(arg: &str) -> std::result::Result<Option<Self>, SettingError> {
        let Some(rest) = arg.strip_prefix("setting.") else {
            return Ok(None);
        };

        let Some((name, value)) = rest.split_once('=') else {
            return Err(SettingError::MissingValue(rest.to_string()));
        };
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');

        let change = match name {
            "key" => Self::ApiKey(value.to_string()),
            "plFolder" => Self::PlaylistFolder(value == "true"),
            "maxResults" => {
                let n = parse_in_range(value, MAX_RESULTS_RANGE).ok_or_else(|| {
                    SettingError::OutOfRange {
                        name: "maxResults",
                        value: value.to_string(),
                        min: *MAX_RESULTS_RANGE.start(),
                        max: *MAX_RESULTS_RANGE.end(),
                    }
                })?;
                Self::MaxResults(n)
            }
            "progStyle" => {
                let range = u32::from(*PROGRESS_STYLE_RANGE.start())..=u32::from(*PROGRESS_STYLE_RANGE.end());
                let n = parse_in_range(value, range.clone()).ok_or_else(|| {
                    SettingError::OutOfRange {
                        name: "progress bar style",
                        value: value.to_string(),
                        min: *range.start(),
                        max: *range.end(),
                    }
                })?;
                // In range 1..=8, so the narrowing cannot truncate
                Self::ProgressStyle(n as u8)
            }
            other => return Err(SettingError::Unknown(other.to_string())),
        };

        Ok(Some(change))
    }

    /// Apply the change to a settings value.
    pub fn apply(&self, settings: &mut Settings) {
        match self {
            Self::ApiKey(key) => settings.api_key = Some(key.clone()),
            Self::PlaylistFolder(on) => settings.playlist_folder = *on,
            Self::MaxResults(n) => settings.max_results = Some(*n),
            Self::ProgressStyle(style) => settings.progress_style = *style,
        }
    }

    /// Message shown after the change has been saved.
    pub fn confirmation(&self) -> String {
        match self {
            Self::ApiKey(_) => "API key saved successfully!".to_string(),
            Self::PlaylistFolder(on) => {
                format!("Setting \"plFolder\" saved successfully! New value: {}", on)
            }
            Self::MaxResults(n) => {
                format!("Setting \"maxResults\" saved successfully! New value: {}", n)
            }
            Self::ProgressStyle(_) => "Progress bar style saved successfully!".to_string(),
        }
    }
}

fn parse_in_range(value: &str, range: RangeInclusive<u32>) -> Option<u32> {
    value.parse::<u32>().ok().filter(|n| range.contains(n))
}

/// Load, change and save settings in one step.
///
/// The file is left untouched if loading fails.
pub fn apply_change(path: &Path, change: &SettingChange) -> Result<Settings> {
    let mut settings = Settings::load(path)?;
    change.apply(&mut settings);
    settings.save(path)?;
    tracing::info!("Saved setting change to {:?}", path);
    Ok(settings)
}
