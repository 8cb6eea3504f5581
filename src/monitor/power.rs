//! AC/battery status via UPower on the system bus.

use std::pin::pin;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use zbus::Connection;
use zbus::zvariant::OwnedObjectPath;

use super::MonitorError;
use crate::status::{Icon, StatusModel};

/// `DBus` service and paths for UPower.
const UPOWER_SERVICE: &str = "org.freedesktop.UPower";
const UPOWER_PATH: &str = "/org/freedesktop/UPower";
const UPOWER_INTERFACE: &str = "org.freedesktop.UPower";
const DEVICE_INTERFACE: &str = "org.freedesktop.UPower.Device";

/// UPower device class, from the `Type` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    LinePower,
    Battery,
    Other(u32),
}

impl DeviceKind {
    pub fn from_type(code: u32) -> Self {
        match code {
            1 => Self::LinePower,
            2 => Self::Battery,
            other => Self::Other(other),
        }
    }
}

/// Keeps the first AC adapter and first battery offered.
#[derive(Debug)]
struct DeviceSelection<T> {
    ac: Option<T>,
    battery: Option<T>,
}

impl<T> Default for DeviceSelection<T> {
    fn default() -> Self {
        Self {
            ac: None,
            battery: None,
        }
    }
}

impl<T> DeviceSelection<T> {
    /// Offer a device; returns true once both slots are filled.
    fn offer(&mut self, kind: DeviceKind, device: T) -> bool {
        match kind {
            DeviceKind::LinePower if self.ac.is_none() => self.ac = Some(device),
            DeviceKind::Battery if self.battery.is_none() => self.battery = Some(device),
            _ => {}
        }
        self.is_complete()
    }

    fn is_complete(&self) -> bool {
        self.ac.is_some() && self.battery.is_some()
    }
}

/// Battery icon for a charge level, with a charging variant while on AC.
pub fn battery_icon_name(connected: bool, percentage: f64) -> String {
    let level = if percentage >= 95.0 {
        100
    } else if percentage >= 75.0 {
        80
    } else if percentage >= 55.0 {
        60
    } else if percentage >= 35.0 {
        40
    } else if percentage >= 15.0 {
        20
    } else {
        10
    };

    if connected {
        format!("battery-level-{level}-charging-symbolic")
    } else {
        format!("battery-level-{level}-symbolic")
    }
}

/// State shared with the `Online` listener.
#[derive(Debug, Default)]
struct Shared {
    connected: Mutex<bool>,
    percentage: Mutex<f64>,
    models: Mutex<Vec<Arc<StatusModel>>>,
}

impl Shared {
    fn icon(&self) -> Icon {
        Icon::with_default_fallbacks(battery_icon_name(
            *self.connected.lock(),
            *self.percentage.lock(),
        ))
    }

    /// Record a new AC state and refresh every bound model's icon.
    fn set_connected(&self, connected: bool, percentage: f64) {
        *self.connected.lock() = connected;
        *self.percentage.lock() = percentage;

        let icon = self.icon();
        debug!("Power state: connected={}, icon={}", connected, icon);
        let models = self.models.lock().clone();
        for model in models {
            model.set_icon(icon.clone());
        }
    }
}

/// Proxies for the devices this monitor reads.
#[derive(Debug, Clone)]
struct PowerDevices {
    ac: zbus::Proxy<'static>,
    battery: zbus::Proxy<'static>,
}

/// Tracks AC adapter presence and battery level.
#[derive(Debug, Default)]
pub struct PowerMonitor {
    shared: Arc<Shared>,
    devices: Option<PowerDevices>,
    listener: Option<JoinHandle<()>>,
}

impl PowerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power has no gradation; the icon carries the level.
    pub fn levels(&self) -> u32 {
        0
    }

    pub fn connected(&self) -> bool {
        *self.shared.connected.lock()
    }

    /// Discover devices and subscribe to `Online` changes.
    ///
    /// A missing bus, adapter or battery leaves the monitor unstarted.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        if self.devices.is_some() {
            return Ok(());
        }

        let conn = Connection::system().await?;
        let devices = find_devices(&conn).await?;

        let connected = devices.ac.get_property::<bool>("Online").await.unwrap_or(false);
        let percentage = battery_percentage(&devices.battery).await;
        *self.shared.connected.lock() = connected;
        *self.shared.percentage.lock() = percentage;
        info!(
            "Power monitor started (online={}, battery={:.0}%)",
            connected, percentage
        );

        self.listener = Some(tokio::spawn(listen(
            devices.clone(),
            Arc::clone(&self.shared),
        )));
        self.devices = Some(devices);
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.devices = None;
    }

    pub fn is_started(&self) -> bool {
        self.devices.is_some()
    }

    /// Icon-only model following AC state and battery level.
    pub fn new_model(&self) -> Result<Arc<StatusModel>, MonitorError> {
        if !self.is_started() {
            return Err(MonitorError::NotStarted("power".to_string()));
        }

        let model = StatusModel::new("ac", 0);
        model.set_icon(self.shared.icon());
        self.shared.models.lock().push(Arc::clone(&model));
        Ok(model)
    }
}

impl Drop for PowerMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Enumerate UPower devices and keep the first AC adapter and battery.
async fn find_devices(conn: &Connection) -> Result<PowerDevices, MonitorError> {
    let upower = zbus::Proxy::new(conn, UPOWER_SERVICE, UPOWER_PATH, UPOWER_INTERFACE).await?;
    let paths: Vec<OwnedObjectPath> = upower.call("EnumerateDevices", &()).await?;

    let mut selection = DeviceSelection::default();
    for path in paths {
        let device =
            zbus::Proxy::new(conn, UPOWER_SERVICE, path.to_string(), DEVICE_INTERFACE).await?;

        let kind = match device.get_property::<u32>("Type").await {
            Ok(code) => DeviceKind::from_type(code),
            Err(e) => {
                trace!("Skipping {}: {}", path.as_str(), e);
                continue;
            }
        };
        trace!("UPower device {} is {:?}", path.as_str(), kind);

        if selection.offer(kind, device) {
            break;
        }
    }

    let ac = selection.ac.ok_or(MonitorError::DeviceNotFound("AC"))?;
    let battery = selection
        .battery
        .ok_or(MonitorError::DeviceNotFound("battery"))?;
    Ok(PowerDevices { ac, battery })
}

async fn battery_percentage(battery: &zbus::Proxy<'static>) -> f64 {
    match battery.get_property::<f64>("Percentage").await {
        Ok(percentage) => percentage,
        Err(e) => {
            debug!("Battery percentage unavailable: {}", e);
            0.0
        }
    }
}

/// Follow `Online` on the AC device until aborted.
async fn listen(devices: PowerDevices, shared: Arc<Shared>) {
    let mut changes = pin!(devices.ac.receive_property_changed::<bool>("Online").await);

    while let Some(change) = changes.next().await {
        match change.get().await {
            Ok(online) => {
                let percentage = battery_percentage(&devices.battery).await;
                shared.set_connected(online, percentage);
            }
            Err(e) => warn!("Failed to read Online change: {}", e),
        }
    }

    debug!("UPower Online stream ended");
}
