//! Observable status model published by monitors.
//!
//! A [`StatusModel`] holds the value and icon one indicator displays. Its owning
//! monitor mutates it; everyone else registers observers with
//! [`StatusModel::connect`] and is called back synchronously on every mutation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Suffix carried by symbolic (monochrome) icon names.
const SYMBOLIC_SUFFIX: &str = "-symbolic";

/// Themed icon reference (newtype over the icon name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Icon {
    name: String,
    default_fallbacks: bool,
}

impl Icon {
    /// Icon resolved by exact name only.
    pub fn themed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_fallbacks: false,
        }
    }

    /// Icon that falls back to progressively shorter names when the theme
    /// lacks the exact one.
    pub fn with_default_fallbacks(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_fallbacks: true,
        }
    }

    /// Get the primary icon name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Candidate names in lookup order.
    ///
    /// `battery-level-80-symbolic` expands to `battery-level-80-symbolic`,
    /// `battery-level-symbolic`, `battery-symbolic`, then the same chain
    /// without the symbolic suffix.
    pub fn lookup_names(&self) -> Vec<String> {
        if !self.default_fallbacks {
            return vec![self.name.clone()];
        }

        let (base, symbolic) = match self.name.strip_suffix(SYMBOLIC_SUFFIX) {
            Some(base) => (base, true),
            None => (self.name.as_str(), false),
        };

        let mut chain = vec![base.to_string()];
        let mut rest = base;
        while let Some((head, _)) = rest.rsplit_once('-') {
            chain.push(head.to_string());
            rest = head;
        }

        let mut names = Vec::with_capacity(chain.len() * 2);
        if symbolic {
            names.extend(chain.iter().map(|n| format!("{n}{SYMBOLIC_SUFFIX}")));
        }
        names.extend(chain);
        names
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Property of a [`StatusModel`] that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Value,
    Icon,
}

/// Point-in-time copy of a model's mutable state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    /// Current value; above 1.0 signals an over-range condition.
    pub value: f64,
    /// Current icon, if one has been published.
    pub icon: Option<Icon>,
}

type Observer = Arc<dyn Fn(&StatusModel, Property) + Send + Sync>;

/// Value + icon pair observed by the popup.
pub struct StatusModel {
    name: String,
    levels: u32,
    exponent: f64,
    state: Mutex<StatusSnapshot>,
    observers: Mutex<Vec<Observer>>,
}

impl StatusModel {
    /// Create a model with a linear display curve.
    pub fn new(name: impl Into<String>, levels: u32) -> Arc<Self> {
        Self::with_exponent(name, levels, 1.0)
    }

    /// Create a model whose indicator warps values by `v^(1/exponent)`.
    pub fn with_exponent(name: impl Into<String>, levels: u32, exponent: f64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            levels,
            exponent,
            state: Mutex::new(StatusSnapshot::default()),
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Indicator identity, used by the popup to switch pages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of indicator segments (0 = icon only).
    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    pub fn icon(&self) -> Option<Icon> {
        self.state.lock().icon.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.lock().clone()
    }

    /// Register an observer, called synchronously after each mutation.
    pub fn connect<F>(&self, observer: F)
    where
        F: Fn(&StatusModel, Property) + Send + Sync + 'static,
    {
        self.observers.lock().push(Arc::new(observer));
    }

    /// Publish a new value.
    pub fn set_value(&self, value: f64) {
        self.state.lock().value = value;
        self.notify(Property::Value);
    }

    /// Publish a new icon.
    pub fn set_icon(&self, icon: Icon) {
        self.state.lock().icon = Some(icon);
        self.notify(Property::Icon);
    }

    fn notify(&self, property: Property) {
        // Observers may read the model; call them without holding any lock.
        let observers: Vec<Observer> = self.observers.lock().clone();
        for observer in observers {
            observer(self, property);
        }
    }
}

impl fmt::Debug for StatusModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusModel")
            .field("name", &self.name)
            .field("levels", &self.levels)
            .field("exponent", &self.exponent)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_model_defaults() {
        let model = StatusModel::new("pulse", 16);
        assert_eq!(model.name(), "pulse");
        assert_eq!(model.levels(), 16);
        assert!((model.exponent() - 1.0).abs() < f64::EPSILON);
        assert_eq!(model.snapshot(), StatusSnapshot::default());
    }

    #[test]
    fn test_observers_called_on_every_mutation() {
        let model = StatusModel::new("ac", 0);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let seen = calls.clone();
        model.connect(move |model, property| {
            seen.lock().push((property, model.value()));
        });

        model.set_value(0.5);
        model.set_value(0.5);
        model.set_icon(Icon::themed("battery-level-80-symbolic"));

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (Property::Value, 0.5));
        assert_eq!(calls[2].0, Property::Icon);
    }

    #[test]
    fn test_observer_can_read_model() {
        let model = StatusModel::new("brightness", 10);
        let icons = Arc::new(AtomicUsize::new(0));

        let counter = icons.clone();
        model.connect(move |model, _| {
            if model.icon().is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        model.set_icon(Icon::themed("display-brightness-symbolic"));
        assert_eq!(icons.load(Ordering::SeqCst), 1);
        assert_eq!(
            model.icon().map(|i| i.as_str().to_string()),
            Some("display-brightness-symbolic".to_string())
        );
    }

    #[test]
    fn test_icon_without_fallbacks() {
        let icon = Icon::themed("display-brightness-symbolic");
        assert_eq!(icon.lookup_names(), vec!["display-brightness-symbolic"]);
    }

    #[test]
    fn test_icon_default_fallbacks_symbolic() {
        let icon = Icon::with_default_fallbacks("audio-volume-high-symbolic");
        assert_eq!(
            icon.lookup_names(),
            vec![
                "audio-volume-high-symbolic",
                "audio-volume-symbolic",
                "audio-symbolic",
                "audio-volume-high",
                "audio-volume",
                "audio",
            ]
        );
    }

    #[test]
    fn test_icon_default_fallbacks_plain() {
        let icon = Icon::with_default_fallbacks("battery-full");
        assert_eq!(icon.lookup_names(), vec!["battery-full", "battery"]);
    }
}
