//! Timeline settings, read from a JSON file.

use crate::parser::SubCategory;
use crate::timeline::{Palette, Rgba};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid color for '{key}': {value} (expected #RRGGBB)")]
    InvalidColor { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Height of one depth level, in surface units
    pub row_height: f64,

    /// Rectangles narrower than this are not drawn
    pub min_rect_width: f64,

    /// Smallest time span (ns) the full width may be zoomed to
    pub min_visible_ns: u64,

    /// Zoom/pan fraction for a single wheel notch
    pub wheel_step: f64,

    /// Rectangles at least this wide get a text label
    pub label_min_width: f64,

    /// Minimum distance between axis ticks
    pub tick_gap: f64,

    /// Fill colors keyed by group label ("Method", "SOQL", ...)
    pub colors: BTreeMap<String, String>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            row_height: 1.0,
            min_rect_width: 0.05,
            min_visible_ns: 1_000,
            wheel_step: 0.1,
            label_min_width: 8.0,
            tick_gap: 16.0,
            colors: BTreeMap::new(),
        }
    }
}

impl TimelineConfig {
    /// `<config dir>/tracetree-tui/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tracetree-tui").join("config.json"))
    }

    /// Load from `path`, or from the default location when it exists.
    ///
    /// An explicit path must be readable; a missing default file just means
    /// defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.palette()?;
        Ok(config)
    }

    /// Resolve color overrides on top of the default palette
    pub fn palette(&self) -> ConfigResult<Palette> {
        let mut overrides = Vec::new();
        for (key, value) in &self.colors {
            let color = Rgba::parse_hex(value).ok_or_else(|| ConfigError::InvalidColor {
                key: key.clone(),
                value: value.clone(),
            })?;
            match SubCategory::from_label(key) {
                Some(sub_category) => overrides.push((sub_category, color)),
                None => log::warn!("Ignoring color for unknown group '{}'", key),
            }
        }
        Ok(Palette::new(overrides))
    }
}
