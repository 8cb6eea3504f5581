//! Transient popup: reveal on change, switch to the changed indicator, hide
//! after a dwell.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::AppearanceConfig;
use crate::indicator::Indicator;
use crate::status::StatusModel;
use crate::transition::Transition;

/// Opacity the popup starts its reveal from.
const HIDDEN_OPACITY: f64 = 0.01;
const SHOWN_OPACITY: f64 = 1.0;

/// Presentation layer the popup drives.
pub trait Surface: Send + Sync + 'static {
    fn set_visible(&self, visible: bool);

    fn set_opacity(&self, opacity: f64);

    /// Bring the named indicator to the front.
    fn switch_to(&self, name: &str);

    /// Refresh an indicator's content.
    fn update(&self, indicator: &Indicator);
}

/// Armed hide timer.
struct HideTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Popup controller shared by every model observer.
pub struct Popup<S: Surface> {
    surface: Arc<S>,
    visibility: Transition<bool>,
    dwell: Duration,
    hide_timer: Mutex<Option<HideTimer>>,
    generation: Mutex<u64>,
}

impl<S: Surface> Popup<S> {
    pub fn new(surface: Arc<S>, appearance: &AppearanceConfig) -> Arc<Self> {
        let reveal = appearance.animation.reveal.duration();
        let hide = appearance.animation.hide.duration();

        let on_visible = Arc::clone(&surface);
        let on_opacity = Arc::clone(&surface);
        let visibility = Transition::new(
            move |visible: &bool| on_visible.set_visible(*visible),
            move |opacity| on_opacity.set_opacity(opacity),
            |visible: &bool| *visible,
            HIDDEN_OPACITY,
            SHOWN_OPACITY,
        )
        .with_duration_fn(move |visible: &bool| if *visible { reveal } else { hide });

        Arc::new(Self {
            surface,
            visibility,
            dwell: appearance.dwell(),
            hide_timer: Mutex::new(None),
            generation: Mutex::new(0),
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Show the popup whenever `model` changes.
    pub fn attach(self: &Arc<Self>, model: &StatusModel) {
        self.surface.update(&Indicator::from_model(model));

        let popup = Arc::clone(self);
        model.connect(move |model, property| {
            trace!("{} changed ({:?})", model.name(), property);
            popup.notify(model);
        });
    }

    /// Handle a model change. Must run inside the tokio runtime.
    pub fn notify(self: &Arc<Self>, model: &StatusModel) {
        let mut timer = self.hide_timer.lock();
        match timer.take() {
            Some(pending) => pending.task.abort(),
            None => {
                debug!("Revealing popup for {}", model.name());
                self.visibility.call(true);
            }
        }

        self.surface.update(&Indicator::from_model(model));
        self.surface.switch_to(model.name());

        let generation = {
            let mut generation = self.generation.lock();
            *generation += 1;
            *generation
        };

        let popup = Arc::clone(self);
        let dwell = self.dwell;
        let task = tokio::spawn(async move {
            tokio::time::sleep(dwell).await;

            let mut timer = popup.hide_timer.lock();
            if timer.as_ref().is_some_and(|t| t.generation == generation) {
                timer.take();
                debug!("Hiding popup");
                popup.visibility.call(false);
            }
        });

        *timer = Some(HideTimer { generation, task });
    }

    /// Whether a hide is pending, i.e. the popup is up.
    pub fn is_shown(&self) -> bool {
        self.hide_timer.lock().is_some()
    }
}

/// Surface that reports through logs and, optionally, stdout.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    print: bool,
    visible: AtomicBool,
    current: Mutex<Option<String>>,
}

impl TerminalSurface {
    pub fn new(print: bool) -> Self {
        Self {
            print,
            ..Self::default()
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }
}

impl Surface for TerminalSurface {
    fn set_visible(&self, visible: bool) {
        let previous = self.visible.swap(visible, Ordering::Relaxed);
        if previous != visible {
            info!("OSD {}", if visible { "shown" } else { "hidden" });
        }
    }

    fn set_opacity(&self, opacity: f64) {
        trace!("OSD opacity {:.2}", opacity);
    }

    fn switch_to(&self, name: &str) {
        *self.current.lock() = Some(name.to_string());
    }

    fn update(&self, indicator: &Indicator) {
        let line = indicator.render();
        debug!("{}", line);
        if self.print && self.is_visible() {
            println!("[OSD] | {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Icon;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Visible(bool),
        Switch(String),
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Mutex<Vec<Call>>,
        opacity: Mutex<f64>,
        updates: Mutex<Vec<Indicator>>,
    }

    impl RecordingSurface {
        fn visible_calls(&self) -> Vec<bool> {
            self.calls
                .lock()
                .iter()
                .filter_map(|c| match c {
                    Call::Visible(v) => Some(*v),
                    Call::Switch(_) => None,
                })
                .collect()
        }
    }

    impl Surface for RecordingSurface {
        fn set_visible(&self, visible: bool) {
            self.calls.lock().push(Call::Visible(visible));
        }

        fn set_opacity(&self, opacity: f64) {
            *self.opacity.lock() = opacity;
        }

        fn switch_to(&self, name: &str) {
            self.calls.lock().push(Call::Switch(name.to_string()));
        }

        fn update(&self, indicator: &Indicator) {
            self.updates.lock().push(indicator.clone());
        }
    }

    fn popup() -> Arc<Popup<RecordingSurface>> {
        Popup::new(
            Arc::new(RecordingSurface::default()),
            &AppearanceConfig::default(),
        )
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_reveals_then_hides_after_dwell() {
        let popup = popup();
        let model = StatusModel::new("pulse", 16);
        popup.attach(&model);

        model.set_value(0.4);
        assert!(popup.is_shown());
        assert_eq!(
            *popup.surface().calls.lock(),
            vec![Call::Visible(true), Call::Switch("pulse".to_string())]
        );

        advance(999).await;
        assert!(popup.is_shown());

        // Dwell ends at 1000 ms, then a 200 ms fade.
        advance(100).await;
        assert!(!popup.is_shown());
        assert_eq!(popup.surface().visible_calls(), vec![true]);

        advance(200).await;
        assert_eq!(popup.surface().visible_calls(), vec![true, false]);
        assert!((*popup.surface().opacity.lock() - HIDDEN_OPACITY).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_during_dwell_rearms_hide() {
        let popup = popup();
        let volume = StatusModel::new("pulse", 16);
        let power = StatusModel::new("ac", 0);
        popup.attach(&volume);
        popup.attach(&power);

        volume.set_value(0.4);
        advance(500).await;
        power.set_icon(Icon::with_default_fallbacks("battery-level-80-charging-symbolic"));

        advance(700).await;
        // 1200 ms after the first change, 700 ms after the second.
        assert!(popup.is_shown());
        assert_eq!(popup.surface().visible_calls(), vec![true]);

        advance(600).await;
        assert!(!popup.is_shown());
        assert_eq!(popup.surface().visible_calls(), vec![true, false]);

        let calls = popup.surface().calls.lock().clone();
        assert!(calls.contains(&Call::Switch("ac".to_string())));
        assert_eq!(calls.last(), Some(&Call::Visible(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_during_fade_out_reveals_again() {
        let popup = popup();
        let model = StatusModel::new("pulse", 16);
        popup.attach(&model);

        model.set_value(0.4);
        advance(1100).await;
        assert!(!popup.is_shown());

        // Mid fade-out: the hide ramp is cancelled before it hides.
        model.set_value(0.5);
        advance(1500).await;
        assert_eq!(popup.surface().visible_calls(), vec![true, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_carry_indicator_state() {
        let popup = popup();
        let model = StatusModel::with_exponent("brightness-test", 16, 2.0);
        popup.attach(&model);

        model.set_value(128.0 / 255.0);
        let updates = popup.surface().updates.lock().clone();
        let last = updates.last().unwrap();
        assert_eq!(last.name, "brightness-test");
        assert_eq!(last.filled, 11);
        assert!(!last.warning);
    }

    #[test]
    fn test_terminal_surface_tracks_state() {
        let surface = TerminalSurface::new(false);
        assert!(!surface.is_visible());
        surface.set_visible(true);
        surface.switch_to("ac");
        assert!(surface.is_visible());
        assert_eq!(surface.current().as_deref(), Some("ac"));
    }
}
