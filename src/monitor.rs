//! Status sources.
//!
//! Each monitor watches one OS status source and publishes it through
//! [`StatusModel`]s. The set of sources is closed: adding one means adding a
//! [`Monitor`] variant with its own acquire/release/query logic.

mod brightness;
mod power;
mod pulseaudio;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use brightness::{BrightnessMonitor, FileEvent};
pub use power::{DeviceKind, PowerMonitor, battery_icon_name};
pub use pulseaudio::{
    AudioState, PulseAudioMonitor, SinkInfo, SinkQuery, audio_icon_name, flat_volume,
    volume_icon_name,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{BACKLIGHT_CLASS_DIR, BrightnessConfig, Config, LEDS_CLASS_DIR};
use crate::status::StatusModel;

/// Errors raised by monitors.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A model was requested before `start()` succeeded.
    #[error("{0} monitor has not been started")]
    NotStarted(String),

    #[error("Invalid brightness value in {path}: {content:?}")]
    Parse { path: PathBuf, content: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watch failed: {0}")]
    Watch(#[from] nix::errno::Errno),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("No {0} power device found")]
    DeviceNotFound(&'static str),

    #[error("Audio server error: {0}")]
    Audio(String),

    #[error("PulseAudio error: {0}")]
    Pulse(#[from] libpulse_binding::error::PAErr),
}

/// A status source with a start/close lifecycle.
#[derive(Debug)]
pub enum Monitor {
    Brightness(BrightnessMonitor),
    Power(PowerMonitor),
    PulseAudio(PulseAudioMonitor),
}

impl Monitor {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Brightness(_) => "brightness",
            Self::Power(_) => "power",
            Self::PulseAudio(_) => "pulseaudio",
        }
    }

    /// Indicator granularity (0 = icon only).
    pub fn levels(&self) -> u32 {
        match self {
            Self::Brightness(m) => m.levels(),
            Self::Power(m) => m.levels(),
            Self::PulseAudio(m) => m.levels(),
        }
    }

    /// Acquire OS resources. Must run inside the tokio runtime.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        match self {
            Self::Brightness(m) => m.start(),
            Self::Power(m) => m.start().await,
            Self::PulseAudio(m) => m.start(),
        }
    }

    /// Release OS resources.
    pub fn close(&mut self) {
        match self {
            Self::Brightness(m) => m.close(),
            Self::Power(m) => m.close(),
            Self::PulseAudio(m) => m.close(),
        }
    }

    pub fn is_started(&self) -> bool {
        match self {
            Self::Brightness(m) => m.is_started(),
            Self::Power(m) => m.is_started(),
            Self::PulseAudio(m) => m.is_started(),
        }
    }

    /// Create a model bound to this monitor.
    ///
    /// Fails with [`MonitorError::NotStarted`] unless `is_started()`.
    pub fn new_model(&self) -> Result<Arc<StatusModel>, MonitorError> {
        match self {
            Self::Brightness(m) => m.new_model(),
            Self::Power(m) => m.new_model(),
            Self::PulseAudio(m) => m.new_model(),
        }
    }
}

/// Build the monitors enabled in `config`, in display order.
///
/// Brightness devices that cannot be resolved are logged and skipped.
pub fn create_monitors(config: &Config) -> Vec<Monitor> {
    let mut monitors = Vec::new();
    let sources = &config.monitor;

    if sources.display.enabled
        && let Some(monitor) = brightness_monitor(
            "display-brightness-symbolic",
            &sources.display,
            Path::new(BACKLIGHT_CLASS_DIR),
        )
    {
        monitors.push(Monitor::Brightness(monitor));
    }

    if sources.keyboard.enabled
        && let Some(monitor) = brightness_monitor(
            "keyboard-brightness-symbolic",
            &sources.keyboard,
            Path::new(LEDS_CLASS_DIR),
        )
    {
        monitors.push(Monitor::Brightness(monitor));
    }

    if sources.power.enabled {
        monitors.push(Monitor::Power(PowerMonitor::new()));
    }

    if sources.pulseaudio.enabled {
        monitors.push(Monitor::PulseAudio(PulseAudioMonitor::new(
            sources.pulseaudio.levels,
        )));
    }

    monitors
}

fn brightness_monitor(
    icon: &str,
    config: &BrightnessConfig,
    class_dir: &Path,
) -> Option<BrightnessMonitor> {
    match config.resolve(class_dir) {
        Ok(Some(provider)) => {
            info!(
                "Using brightness device {} (max {})",
                provider.source, provider.max_brightness
            );
            Some(BrightnessMonitor::new(
                icon,
                provider.brightness_file,
                provider.max_brightness,
                config.levels,
                config.exponent,
            ))
        }
        Ok(None) => {
            warn!("No brightness device under {}", class_dir.display());
            None
        }
        Err(e) => {
            error!("Failed to resolve brightness device for {}: {:#}", icon, e);
            None
        }
    }
}
