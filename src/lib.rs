//! osdwatchd - on-screen display daemon for brightness, power and volume.
//!
//! Watches OS status sources, publishes them as observable models and drives
//! a transient popup whenever one of them changes.

pub mod config;
pub mod debounce;
pub mod indicator;
pub mod instance;
pub mod monitor;
pub mod popup;
pub mod status;
pub mod transition;
