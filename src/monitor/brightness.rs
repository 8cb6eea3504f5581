//! Backlight/LED brightness via inotify on the sysfs `brightness` file.

use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent};
use parking_lot::Mutex;
use tokio::io::unix::AsyncFd;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::MonitorError;
use crate::status::{Icon, StatusModel};

/// What a watch notification means for the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    /// A writer is still busy with the file.
    Changed,
    /// A writer closed the file; contents are final.
    ChangesDone,
    Other,
}

impl FileEvent {
    pub fn classify(mask: AddWatchFlags) -> Self {
        if mask.contains(AddWatchFlags::IN_CLOSE_WRITE) {
            Self::ChangesDone
        } else if mask.contains(AddWatchFlags::IN_MODIFY) {
            Self::Changed
        } else {
            Self::Other
        }
    }
}

/// Inotify instance registered with the tokio reactor.
struct InotifyFd(Inotify);

impl AsRawFd for InotifyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_fd().as_raw_fd()
    }
}

/// State shared with the watch task.
#[derive(Debug)]
struct Shared {
    file: PathBuf,
    max_brightness: u64,
    brightness: Mutex<f64>,
    models: Mutex<Vec<Arc<StatusModel>>>,
}

impl Shared {
    fn on_change(&self, data: &str) -> Result<f64, MonitorError> {
        let raw: u64 = data.trim().parse().map_err(|_| MonitorError::Parse {
            path: self.file.clone(),
            content: data.to_string(),
        })?;

        #[allow(clippy::cast_precision_loss)]
        let brightness = raw as f64 / self.max_brightness.max(1) as f64;
        *self.brightness.lock() = brightness;

        let models = self.models.lock().clone();
        for model in models {
            model.set_value(brightness);
        }

        Ok(brightness)
    }

    fn reload(&self) -> Result<f64, MonitorError> {
        let data = std::fs::read_to_string(&self.file)?;
        self.on_change(&data)
    }
}

/// Watches one device's `brightness` file.
#[derive(Debug)]
pub struct BrightnessMonitor {
    icon: String,
    levels: u32,
    exponent: f64,
    shared: Arc<Shared>,
    watcher: Option<JoinHandle<()>>,
}

impl BrightnessMonitor {
    pub fn new(
        icon: impl Into<String>,
        file: PathBuf,
        max_brightness: u64,
        levels: u32,
        exponent: f64,
    ) -> Self {
        Self {
            icon: icon.into(),
            levels,
            exponent,
            shared: Arc::new(Shared {
                file,
                max_brightness,
                brightness: Mutex::new(0.0),
                models: Mutex::new(Vec::new()),
            }),
            watcher: None,
        }
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn file(&self) -> &Path {
        &self.shared.file
    }

    /// Current `raw / max` ratio.
    pub fn brightness(&self) -> f64 {
        *self.shared.brightness.lock()
    }

    /// Parse new file contents and publish the resulting ratio.
    pub fn on_change(&self, data: &str) -> Result<f64, MonitorError> {
        self.shared.on_change(data)
    }

    /// Start watching. Calling it on a started monitor is a no-op.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
        inotify.add_watch(
            &self.shared.file,
            AddWatchFlags::IN_MODIFY | AddWatchFlags::IN_CLOSE_WRITE,
        )?;
        let fd = AsyncFd::new(InotifyFd(inotify))?;

        if let Err(e) = self.shared.reload() {
            warn!("Failed to read initial brightness: {}", e);
        }

        info!("Watching {}", self.shared.file.display());
        self.watcher = Some(tokio::spawn(watch(fd, Arc::clone(&self.shared))));
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            debug!("Stopping watch on {}", self.shared.file.display());
            watcher.abort();
        }
    }

    pub fn is_started(&self) -> bool {
        self.watcher.is_some()
    }

    /// Model whose value follows `brightness`.
    pub fn new_model(&self) -> Result<Arc<StatusModel>, MonitorError> {
        let path = self.shared.file.display().to_string();
        if !self.is_started() {
            return Err(MonitorError::NotStarted(format!("brightness ({path})")));
        }

        let model =
            StatusModel::with_exponent(format!("brightness-{path}"), self.levels, self.exponent);
        model.set_icon(Icon::themed(self.icon.clone()));
        model.set_value(self.brightness());
        self.shared.models.lock().push(Arc::clone(&model));
        Ok(model)
    }
}

impl Drop for BrightnessMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Watch task: reload on every completed write.
async fn watch(fd: AsyncFd<InotifyFd>, shared: Arc<Shared>) {
    loop {
        let events = match read_events(&fd).await {
            Ok(events) => events,
            Err(e) => {
                error!("Brightness watch on {} failed: {}", shared.file.display(), e);
                return;
            }
        };

        let done = events
            .iter()
            .map(|event| FileEvent::classify(event.mask))
            .any(|kind| kind == FileEvent::ChangesDone);
        if !done {
            trace!("Ignoring in-progress write to {}", shared.file.display());
            continue;
        }

        match shared.reload() {
            Ok(brightness) => debug!("Brightness changed: {:.3}", brightness),
            // The previous value stays published; the next write retries.
            Err(e) => error!("{}", e),
        }
    }
}

async fn read_events(fd: &AsyncFd<InotifyFd>) -> std::io::Result<Vec<InotifyEvent>> {
    loop {
        let mut guard = fd.readable().await?;
        match guard.try_io(|inner| inner.get_ref().0.read_events().map_err(std::io::Error::from)) {
            Ok(result) => return result,
            Err(_would_block) => {}
        }
    }
}
