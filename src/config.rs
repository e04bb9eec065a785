use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::scale::KeyboardLayout;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
/// CLI flags override whatever the file provides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Input anomaly table (year + 12 monthly values per data line).
    pub input_path: PathBuf,
    /// Output MIDI file path (relative paths resolve against `output_dir`).
    pub output_midi_path: PathBuf,
    /// Directory receiving the chart PNGs and the MIDI file.
    pub output_dir: PathBuf,
    /// Prefix prepended to every chart filename (e.g. "crutem4_").
    pub output_prefix: String,
    /// Keyboard the anomaly scale maps onto (88 or 108 keys).
    pub layout: KeyboardLayout,
    /// Octaves of anomaly covered either side of zero.
    pub span: f64,
    /// Playback tempo in beats per minute.
    pub tempo_bpm: u32,
    /// Note velocity, 0-127.
    pub velocity: u8,
    /// Note duration in beats.
    pub duration_beats: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("crutem4.6.0.0-2019-12.global.txt"),
            output_midi_path: PathBuf::from("crutem4.midi"),
            output_dir: PathBuf::from("."),
            output_prefix: String::new(),
            layout: KeyboardLayout::Grand88,
            span: 2.0,
            tempo_bpm: 120,
            velocity: 127,
            duration_beats: 1,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/climatune/config.toml`, or from an
    /// explicit override path. Returns default config if no file exists.
    /// Logs a warning if a file exists but can't be parsed.
    pub fn load(override_path: Option<&Path>) -> Self {
        if let Some(path) = override_path {
            if !path.exists() {
                log::warn!("Config file {} not found. Using defaults.", path.display());
                return Self::default();
            }
            return Self::read_file(path);
        }

        match Self::config_path() {
            Some(path) if path.exists() => Self::read_file(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve the MIDI output path against `output_dir`.
    pub fn midi_path(&self) -> PathBuf {
        if self.output_midi_path.is_absolute() {
            self.output_midi_path.clone()
        } else {
            self.output_dir.join(&self.output_midi_path)
        }
    }

    fn read_file(path: &Path) -> Self {
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

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
