//! Eased value ramp wrapped around a state-changing action.
//!
//! A [`Transition`] fades something (window opacity, typically) between two
//! bounds while running an action either before the ramp (reveal) or after
//! it (hide).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Frame interval of a running ramp (~60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Default ramp length.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(200);

/// Maps linear time progress in `[0, 1]` to eased progress in `[0, 1]`.
pub type Easing = fn(f64) -> f64;

/// Cubic ease-out: fast start, gentle landing.
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

pub fn linear(t: f64) -> f64 {
    t
}

/// Ramp length, fixed or derived from the call arguments.
pub enum TransitionDuration<A> {
    Fixed(Duration),
    Computed(Arc<dyn Fn(&A) -> Duration + Send + Sync>),
}

impl<A> TransitionDuration<A> {
    fn resolve(&self, args: &A) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Computed(f) => f(args),
        }
    }
}

/// Scheduled ramp, tagged so a finished ramp only clears its own slot.
struct Ramp {
    generation: u64,
    task: JoinHandle<()>,
}

/// Animated wrapper around `method`.
///
/// When `before(args)` is true the ramp goes `initial -> target` and `method`
/// runs first; otherwise the ramp goes `target -> initial` and `method` runs
/// once the ramp completes. At most one ramp is in flight per instance.
pub struct Transition<A> {
    initial: f64,
    target: f64,
    duration: TransitionDuration<A>,
    easing: Easing,
    before: Arc<dyn Fn(&A) -> bool + Send + Sync>,
    setter: Arc<dyn Fn(f64) + Send + Sync>,
    method: Arc<dyn Fn(&A) + Send + Sync>,
    timer: Arc<Mutex<Option<Ramp>>>,
    generation: AtomicU64,
}

impl<A> Transition<A>
where
    A: Send + 'static,
{
    /// Create a transition with the default duration and cubic ease-out.
    pub fn new<M, S, B>(method: M, setter: S, before: B, initial: f64, target: f64) -> Self
    where
        M: Fn(&A) + Send + Sync + 'static,
        S: Fn(f64) + Send + Sync + 'static,
        B: Fn(&A) -> bool + Send + Sync + 'static,
    {
        Self {
            initial,
            target,
            duration: TransitionDuration::Fixed(DEFAULT_DURATION),
            easing: ease_out_cubic,
            before: Arc::new(before),
            setter: Arc::new(setter),
            method: Arc::new(method),
            timer: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = TransitionDuration::Fixed(duration);
        self
    }

    /// Derive the ramp length from each call's arguments.
    #[must_use]
    pub fn with_duration_fn<F>(mut self, duration: F) -> Self
    where
        F: Fn(&A) -> Duration + Send + Sync + 'static,
    {
        self.duration = TransitionDuration::Computed(Arc::new(duration));
        self
    }

    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Run the wrapped action with its ramp.
    ///
    /// Must be called from within a tokio runtime when the resolved duration
    /// is non-zero.
    pub fn call(&self, args: A) {
        let before = (self.before)(&args);
        let duration = self.duration.resolve(&args);

        let (initial, target) = if before {
            (self.initial, self.target)
        } else {
            (self.target, self.initial)
        };

        if duration.is_zero() {
            self.cancel();
            (self.setter)(target);
            (self.method)(&args);
            return;
        }

        if before {
            (self.setter)(initial);
            (self.method)(&args);
        }

        let setter = self.setter.clone();
        let method = self.method.clone();
        let easing = self.easing;
        let slot = Arc::clone(&self.timer);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            trace!("Cancelling in-flight transition");
            previous.task.abort();
        }

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let delta = target - initial;

            loop {
                tokio::time::sleep(FRAME_INTERVAL).await;

                let t = (start.elapsed().as_secs_f64() / duration.as_secs_f64()).min(1.0);
                if t < 1.0 {
                    setter(initial + delta * easing(t));
                    continue;
                }

                setter(target);
                {
                    let mut timer = slot.lock();
                    if timer.as_ref().is_some_and(|ramp| ramp.generation == generation) {
                        timer.take();
                    }
                }
                if !before {
                    method(&args);
                }
                break;
            }
        });
        *timer = Some(Ramp { generation, task });
    }

    /// Whether a ramp is currently scheduled.
    pub fn is_animating(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Abort the in-flight ramp, if any, leaving the last applied value.
    pub fn cancel(&self) {
        if let Some(ramp) = self.timer.lock().take() {
            ramp.task.abort();
        }
    }
}

impl<A> Drop for Transition<A> {
    fn drop(&mut self) {
        if let Some(ramp) = self.timer.lock().take() {
            ramp.task.abort();
        }
    }
}
