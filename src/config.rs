//! Configuration loading and defaults for osdwatchd.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// sysfs class directory scanned for display backlights.
pub const BACKLIGHT_CLASS_DIR: &str = "/sys/class/backlight";

/// sysfs class directory scanned for keyboard (and other) LEDs.
pub const LEDS_CLASS_DIR: &str = "/sys/class/leds";

/// Colour scheme the popup follows.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SystemTheme {
    /// Follow the desktop preference (default).
    #[default]
    System,
    Light,
    Dark,
}

/// Main configuration for osdwatchd.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorsConfig,
    pub appearance: AppearanceConfig,
}

/// Per-source monitor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorsConfig {
    pub display: BrightnessConfig,
    pub keyboard: BrightnessConfig,
    pub power: PowerConfig,
    pub pulseaudio: PulseAudioConfig,
}

impl Default for MonitorsConfig {
    fn default() -> Self {
        Self {
            display: BrightnessConfig::default(),
            keyboard: BrightnessConfig {
                levels: 3,
                ..BrightnessConfig::default()
            },
            power: PowerConfig::default(),
            pulseaudio: PulseAudioConfig::default(),
        }
    }
}

/// Settings for a file-backed brightness monitor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    /// Whether to watch this device (default: true).
    pub enabled: bool,

    /// Number of indicator segments (default: 16).
    pub levels: u32,

    /// Display curve; segments fill as `value^(1/exponent)` (default: 1.0).
    pub exponent: f64,

    /// Path to the device's `brightness` file.
    /// If unset, the sysfs class directory is scanned.
    pub device: Option<PathBuf>,

    /// Device maximum. If unset, read from `max_brightness` next to `device`.
    pub max_brightness: Option<u64>,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            levels: 16,
            exponent: 1.0,
            device: None,
            max_brightness: None,
        }
    }
}

/// Resolved brightness device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrightnessProvider {
    /// Path of the watched `brightness` file.
    pub brightness_file: PathBuf,
    pub max_brightness: u64,
    /// Name of the sysfs device directory.
    pub source: String,
}

impl BrightnessConfig {
    /// Resolve the device to watch.
    ///
    /// An explicit `device` wins; otherwise `class_dir` is scanned for the
    /// device with the largest `max_brightness`. Returns `None` when nothing
    /// usable exists.
    pub fn resolve(&self, class_dir: &Path) -> Result<Option<BrightnessProvider>> {
        let Some(ref device) = self.device else {
            return guess_brightness_provider(class_dir);
        };

        let max_brightness = match self.max_brightness {
            Some(max) => max,
            None => {
                let max_file = device.with_file_name("max_brightness");
                read_sysfs_u64(&max_file)?
            }
        };

        let source = device
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Some(BrightnessProvider {
            brightness_file: device.clone(),
            max_brightness,
            source,
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub enabled: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PulseAudioConfig {
    pub enabled: bool,

    /// Number of volume indicator segments (default: 16).
    pub levels: u32,
}

impl Default for PulseAudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            levels: 16,
        }
    }
}

/// Popup appearance and timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Indicator icon size in pixels (default: 88).
    pub icon_size: u32,

    pub system_theme: SystemTheme,

    /// Distance from the bottom screen edge in pixels (default: 0).
    pub bottom_margin: u32,

    /// How long the popup stays up after the last change (default: 1000).
    pub dwell_ms: u64,

    pub animation: AnimationConfig,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            icon_size: 88,
            system_theme: SystemTheme::default(),
            bottom_margin: 0,
            dwell_ms: 1000,
            animation: AnimationConfig::default(),
        }
    }
}

impl AppearanceConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub reveal: AnimationStep,
    pub hide: AnimationStep,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationStep {
    /// Fade length in milliseconds; 0 disables the fade (default: 200).
    pub duration: u64,
}

impl Default for AnimationStep {
    fn default() -> Self {
        Self { duration: 200 }
    }
}

impl AnimationStep {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("osdwatchd").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }
}

/// Scan a sysfs class directory for the device with the largest maximum.
pub fn guess_brightness_provider(class_dir: &Path) -> Result<Option<BrightnessProvider>> {
    if !class_dir.is_dir() {
        debug!("No brightness class directory at {}", class_dir.display());
        return Ok(None);
    }

    let entries = std::fs::read_dir(class_dir)
        .with_context(|| format!("Failed to list {}", class_dir.display()))?;

    let mut best: Option<BrightnessProvider> = None;
    for entry in entries.flatten() {
        let dir = entry.path();
        let max_file = dir.join("max_brightness");
        let brightness_file = dir.join("brightness");
        if !max_file.is_file() || !brightness_file.is_file() {
            continue;
        }

        let max_brightness = match read_sysfs_u64(&max_file) {
            Ok(max) => max,
            Err(e) => {
                warn!("Skipping {}: {:#}", dir.display(), e);
                continue;
            }
        };

        if best
            .as_ref()
            .is_none_or(|b| max_brightness > b.max_brightness)
        {
            best = Some(BrightnessProvider {
                brightness_file,
                max_brightness,
                source: entry.file_name().to_string_lossy().into_owned(),
            });
        }
    }

    Ok(best)
}

/// Read a decimal sysfs attribute.
fn read_sysfs_u64(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .trim()
        .parse()
        .with_context(|| format!("Invalid number in {}", path.display()))
}
