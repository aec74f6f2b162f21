//! Preset management for the equalizer
//!
//! This module provides:
//! - Serializable band/preset structs with TOML persistence
//! - Preset manager for listing, loading, saving and deleting presets
//! - Hot-reload support via file system watcher
//!
//! Presets feed the control surface; values are clamped on conversion so a
//! hand-edited file can never push invalid parameters toward the audio path.

use crate::domain::params::{BandParams, CutKind, ShelfShape};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during preset operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid preset: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Band role as written in preset files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandMode {
    LowCut,
    LowShelf,
    Peak,
    HighShelf,
    HighCut,
}

/// One band as stored in a preset file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    pub mode: BandMode,
    pub frequency: f32,
    pub quality: f32,
    /// Only meaningful for gain-bearing bands
    #[serde(default)]
    pub gain_db: f32,
    /// Only meaningful for cut bands (order N = 6N dB/octave)
    #[serde(default = "default_order")]
    pub order: u8,
    #[serde(default)]
    pub bypassed: bool,
}

fn default_order() -> u8 {
    2
}

impl BandConfig {
    /// Convert to runtime parameters, clamping out-of-range values
    pub fn to_params(&self) -> BandParams {
        let mut params = match self.mode {
            BandMode::LowCut => {
                BandParams::cut(self.frequency, self.quality, self.order, CutKind::LowCut)
            }
            BandMode::HighCut => {
                BandParams::cut(self.frequency, self.quality, self.order, CutKind::HighCut)
            }
            BandMode::LowShelf => BandParams::peaking(
                self.frequency,
                self.quality,
                self.gain_db,
                ShelfShape::LowShelf,
            ),
            BandMode::Peak => {
                BandParams::peaking(self.frequency, self.quality, self.gain_db, ShelfShape::Peak)
            }
            BandMode::HighShelf => BandParams::peaking(
                self.frequency,
                self.quality,
                self.gain_db,
                ShelfShape::HighShelf,
            ),
        };
        params.set_bypassed(self.bypassed);
        params
    }
}

impl From<&BandParams> for BandConfig {
    fn from(params: &BandParams) -> Self {
        match *params {
            BandParams::Peaking {
                frequency,
                quality,
                gain_db,
                bypassed,
                shape,
            } => Self {
                mode: match shape {
                    ShelfShape::LowShelf => BandMode::LowShelf,
                    ShelfShape::Peak => BandMode::Peak,
                    ShelfShape::HighShelf => BandMode::HighShelf,
                },
                frequency,
                quality,
                gain_db,
                order: default_order(),
                bypassed,
            },
            BandParams::CutSlope {
                frequency,
                quality,
                order,
                bypassed,
                kind,
            } => Self {
                mode: match kind {
                    CutKind::LowCut => BandMode::LowCut,
                    CutKind::HighCut => BandMode::HighCut,
                },
                frequency,
                quality,
                gain_db: 0.0,
                order,
                bypassed,
            },
        }
    }
}

/// Complete equalizer preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqPreset {
    pub name: String,

    /// Smoothing ramp duration in milliseconds
    #[serde(default = "default_ramp_ms")]
    pub ramp_ms: f32,

    pub bands: Vec<BandConfig>,
}

fn default_ramp_ms() -> f32 {
    50.0
}

impl Default for EqPreset {
    fn default() -> Self {
        Self {
            name: "flat".to_string(),
            ramp_ms: default_ramp_ms(),
            bands: Vec::new(),
        }
    }
}

impl EqPreset {
    /// Runtime parameter sets for all bands, in band order
    pub fn band_params(&self) -> Vec<BandParams> {
        self.bands.iter().map(BandConfig::to_params).collect()
    }

    /// Ramp duration in seconds
    pub fn ramp_seconds(&self) -> f32 {
        self.ramp_ms.max(0.0) / 1_000.0
    }

    /// Load a preset from a TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading preset");

        let contents = fs::read_to_string(path).await?;
        let preset: Self = toml::from_str(&contents)?;

        debug!(bands = preset.bands.len(), "Preset loaded successfully");
        Ok(preset)
    }

    /// Save a preset to a TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving preset");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Preset saved successfully");
        Ok(())
    }

    /// Factory default: lowcut, two peaking bands, high shelf
    pub fn factory_default() -> Self {
        Self {
            name: "default".to_string(),
            ramp_ms: default_ramp_ms(),
            bands: vec![
                BandConfig {
                    mode: BandMode::LowCut,
                    frequency: 40.0,
                    quality: 0.707,
                    gain_db: 0.0,
                    order: 2,
                    bypassed: false,
                },
                BandConfig {
                    mode: BandMode::Peak,
                    frequency: 250.0,
                    quality: 1.0,
                    gain_db: 0.0,
                    order: 2,
                    bypassed: false,
                },
                BandConfig {
                    mode: BandMode::Peak,
                    frequency: 2_500.0,
                    quality: 1.0,
                    gain_db: 0.0,
                    order: 2,
                    bypassed: false,
                },
                BandConfig {
                    mode: BandMode::HighShelf,
                    frequency: 8_000.0,
                    quality: 0.707,
                    gain_db: 0.0,
                    order: 2,
                    bypassed: false,
                },
            ],
        }
    }
}

/// Default preset directory
///
/// Returns `~/.config/madrigal/presets` on Linux/macOS,
/// `%APPDATA%\madrigal\presets` on Windows.
pub fn default_preset_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("madrigal").join("presets"))
        .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
}

/// File system watcher for preset hot-reload
pub struct PresetWatcher {
    _watcher: notify::RecommendedWatcher,
    preset_tx: broadcast::Sender<PathBuf>,
}

impl PresetWatcher {
    /// Watch a preset directory for created or modified TOML files
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (preset_tx, _preset_rx) = broadcast::channel(32);

        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = preset_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                            if let Err(e) = tx_clone.send(path) {
                                error!("Failed to send preset change event: {}", e);
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::Recursive)?;

        info!(
            path = %preset_dir.display(),
            "Preset watcher started"
        );

        Ok(Self {
            _watcher: watcher,
            preset_tx,
        })
    }

    /// Subscribe to preset change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.preset_tx.subscribe()
    }
}

/// Preset manager
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    if let Some(name_str) = name.to_str() {
                        presets.push(name_str.to_string());
                    }
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<EqPreset> {
        let path = self.preset_dir.join(format!("{}.toml", name));

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        EqPreset::load_from_file(&path).await
    }

    /// Save a preset by name
    #[instrument(skip(self, preset))]
    pub async fn save_preset(&self, name: &str, preset: &EqPreset) -> Result<()> {
        let path = self.preset_dir.join(format!("{}.toml", name));
        preset.save_to_file(&path).await
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_dir.join(format!("{}.toml", name));

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset exists
    pub async fn preset_exists(&self, name: &str) -> bool {
        let path = self.preset_dir.join(format!("{}.toml", name));
        path.exists()
    }
}
