//! osdwatchd - on-screen display daemon.
//!
//! Shows a short-lived indicator whenever display brightness, keyboard
//! brightness, AC power or audio volume changes.

use anyhow::{Context, Result};
use clap::Parser;
use osdwatchd::config::Config;
use osdwatchd::instance::{self, Activation, InstanceGuard};
use osdwatchd::monitor::{Monitor, create_monitors};
use osdwatchd::popup::{Popup, TerminalSurface};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// On-screen display daemon.
///
/// Pops up an indicator when brightness, power or volume changes.
#[derive(Parser, Debug)]
#[command(name = "osdwatchd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print indicator updates to stdout while the popup is shown.
    #[arg(long)]
    print_events: bool,

    /// Override the single-instance socket path.
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    let socket = match args.socket {
        Some(path) => path,
        None => instance::default_socket_path()?,
    };
    let guard = match instance::acquire(&socket).await? {
        Activation::Primary(guard) => guard,
        Activation::Remote => {
            info!("osdwatchd is already running; activated existing instance");
            return Ok(());
        }
    };

    info!("osdwatchd v{} starting", env!("CARGO_PKG_VERSION"));

    let config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    let appearance = &config.appearance;
    debug!(
        "Appearance: icon_size={}, theme={:?}, bottom_margin={}, dwell={:?}",
        appearance.icon_size,
        appearance.system_theme,
        appearance.bottom_margin,
        appearance.dwell()
    );

    run_daemon(&config, &guard, args.print_events).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("osdwatchd={}", level))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Start monitors and wait for shutdown.
async fn run_daemon(config: &Config, guard: &InstanceGuard, print_events: bool) -> Result<()> {
    let surface = Arc::new(TerminalSurface::new(print_events));
    let popup = Popup::new(Arc::clone(&surface), &config.appearance);

    let mut monitors = create_monitors(config);
    let mut active = 0;
    for monitor in &mut monitors {
        if let Err(e) = start_monitor(monitor, &popup).await {
            warn!("Skipping {} monitor: {}", monitor.kind(), e);
            monitor.close();
            continue;
        }
        active += 1;
    }

    if active == 0 {
        warn!("No status source could be started");
    }
    info!("Daemon started with {} monitor(s)", active);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated, shutting down");
                break;
            }
            activation = guard.next_activation() => {
                match activation {
                    Ok(command) => info!("Activated by another launch ({})", command),
                    Err(e) => error!("{}", e),
                }
            }
        }
    }

    for monitor in &mut monitors {
        monitor.close();
    }
    Ok(())
}

async fn start_monitor(monitor: &mut Monitor, popup: &Arc<Popup<TerminalSurface>>) -> Result<()> {
    monitor.start().await?;
    if !monitor.is_started() {
        anyhow::bail!("not started");
    }

    let model = monitor.new_model()?;
    debug!("Attaching {} ({} levels)", model.name(), model.levels());
    popup.attach(&model);
    Ok(())
}
