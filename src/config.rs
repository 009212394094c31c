use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::estimate::SearchOptions;
use crate::pipeline::Settings;
use crate::rank::PpParams;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the file is optional.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Player score database (beatoraja `score.db`).
    pub score_db: Option<PathBuf>,
    /// Chart reference table (CSV).
    pub chart_table: Option<PathBuf>,
    /// Display level category to calibrate against.
    pub level_prefix: String,
    /// Default report path.
    pub output: PathBuf,
    pub estimate: EstimateConfig,
    pub rating: RatingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            score_db: None,
            chart_table: None,
            level_prefix: "sl".to_string(),
            output: PathBuf::from(format!("{}.html", crate::APP_NAME)),
            estimate: EstimateConfig::default(),
            rating: RatingConfig::default(),
        }
    }
}

/// Skill search settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EstimateConfig {
    pub lower: f64,
    pub upper: f64,
    pub xatol: f64,
    pub max_evals: usize,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        let opts = SearchOptions::default();
        Self {
            lower: opts.lower,
            upper: opts.upper,
            xatol: opts.xatol,
            max_evals: opts.max_evals,
        }
    }
}

/// Performance point settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RatingConfig {
    /// Number of clears kept in the ranked list.
    pub top_n: usize,
    pub pp_offset: f64,
    pub pp_scale: f64,
    /// Weight ratio between consecutive entries.
    pub decay: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        let pp = PpParams::default();
        Self {
            top_n: pp.top_n,
            pp_offset: pp.offset,
            pp_scale: pp.scale,
            decay: pp.decay,
        }
    }
}

impl AppConfig {
    /// Load config from the platform config dir (`~/.config/lampfit/config.toml`).
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load for rewriting. A missing file gives defaults, but a file that
    /// can't be read or parsed is an error so it is never overwritten.
    pub fn load_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Store new input paths in the config file at `path`, keeping every
    /// other setting already in it. Returns false when there is nothing to store.
    pub fn save_inputs(
        path: &Path,
        score_db: Option<PathBuf>,
        chart_table: Option<PathBuf>,
    ) -> Result<bool> {
        if score_db.is_none() && chart_table.is_none() {
            log::warn!("--save given without --scores or --charts, nothing to store");
            return Ok(false);
        }
        let mut stored = Self::load_existing(path)
            .with_context(|| format!("Not saving over {}", path.display()))?;
        if score_db.is_some() {
            stored.score_db = score_db;
        }
        if chart_table.is_some() {
            stored.chart_table = chart_table;
        }
        stored.save_to(path)?;
        Ok(true)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Pipeline settings derived from this config.
    pub fn settings(&self) -> Settings {
        Settings {
            prefix: self.level_prefix.clone(),
            search: SearchOptions {
                lower: self.estimate.lower,
                upper: self.estimate.upper,
                xatol: self.estimate.xatol,
                max_evals: self.estimate.max_evals,
            },
            pp: PpParams {
                offset: self.rating.pp_offset,
                scale: self.rating.pp_scale,
                decay: self.rating.decay,
                top_n: self.rating.top_n,
            },
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
