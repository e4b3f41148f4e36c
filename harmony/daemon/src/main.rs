//! Harmony Daemon
//!
//! Bridges a Harmony hub on the local network to a television accessory.
//! Discovers the hub, builds the accessory from its activity catalog and
//! keeps the accessory state in sync while it runs.
//!
//! # Usage
//!
//! ```bash
//! # Start against a hub
//! harmony-daemon --hub-ip 192.168.1.20
//!
//! # Start with custom config file
//! harmony-daemon --config /path/to/platform.toml
//!
//! # Poll every 30 seconds with debug logging
//! harmony-daemon --hub-ip 192.168.1.20 --refresh-timer 30 --verbose
//! ```
//!
//! Control lines are read from stdin (see [`control`]). Closing stdin stops
//! command reading only; the daemon runs until signalled.
//!
//! # Signals
//!
//! - `SIGTERM`: Graceful shutdown
//! - `SIGINT`: Graceful shutdown (Ctrl+C)

mod control;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use harmony_core::{
    discover, load_config_from_path, ConfigOverrides, HarmonyPlatform, StateUpdate,
    WebSocketSession,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::control::ControlCommand;

type Platform = HarmonyPlatform<WebSocketSession>;

/// Harmony hub to television accessory bridge
#[derive(Parser, Debug)]
#[command(name = "harmony-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "HARMONY_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hub address on the local network
    #[arg(long, value_name = "ADDR")]
    pub hub_ip: Option<String>,

    /// Accessory display name
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Background refresh interval in seconds (0 disables)
    #[arg(short, long, value_name = "SECS")]
    pub refresh_timer: Option<u64>,

    /// Label of the activity exposed as the main input
    #[arg(short, long, value_name = "LABEL")]
    pub main_activity: Option<String>,

    /// Prefix activity labels for side-by-side testing
    #[arg(long)]
    pub dev_mode: bool,

    /// Debug logging for the daemon and core
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref hub_ip) = self.hub_ip {
            overrides = overrides.with_hub_ip(hub_ip.clone());
        }
        if let Some(ref name) = self.name {
            overrides = overrides.with_name(name.clone());
        }
        if let Some(secs) = self.refresh_timer {
            overrides = overrides.with_refresh_timer(secs);
        }
        if let Some(ref label) = self.main_activity {
            overrides = overrides.with_main_activity(label.clone());
        }
        if self.dev_mode {
            overrides = overrides.with_dev_mode(true);
        }
        overrides
    }
}

/// Initialize tracing subscriber
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("harmony_daemon={level},harmony_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log every state change the platform pushes
async fn log_updates(mut updates: mpsc::Receiver<StateUpdate>) {
    while let Some(update) = updates.recv().await {
        info!(
            characteristic = ?update.characteristic,
            value = %update.value,
            "Accessory state"
        );
    }
}

async fn handle_command(platform: &Platform, command: ControlCommand) {
    match command {
        ControlCommand::Power(on) => {
            let outcome = platform.set_power(on).await;
            info!(on, ?outcome, "Power");
        }
        ControlCommand::Activity(id) => {
            let outcome = platform.select_activity(id).await;
            info!(activity_id = %id, ?outcome, "Activity");
        }
        ControlCommand::Key(key) => report_press("key", platform.press_remote_key(key).await),
        ControlCommand::Mute => report_press("mute", platform.toggle_mute().await),
        ControlCommand::Volume(direction) => {
            report_press("volume", platform.step_volume(direction).await);
        }
        ControlCommand::Refresh => {
            let current = platform.refresh_accessory(true).await;
            info!(?current, "Refreshed");
        }
        ControlCommand::Status => {
            let state = platform.session_state();
            info!(
                current = ?state.current,
                last_selected = ?state.last_selected,
                timer_active = platform.scheduler().is_active(),
                "Status"
            );
        }
        ControlCommand::List => {
            let main = platform.catalog().main_activity_id();
            for activity in platform.catalog().activities() {
                info!(
                    activity_id = %activity.id,
                    label = %activity.label,
                    buttons = activity.buttons.len(),
                    main = activity.id == main,
                    "Activity"
                );
            }
        }
    }
}

fn report_press<E: std::fmt::Display>(what: &str, result: Result<bool, E>) {
    match result {
        Ok(true) => info!(what, "Button sent"),
        Ok(false) => info!(what, "Nothing to press"),
        Err(e) => warn!(what, error = %e, "Button failed"),
    }
}

#[cfg(unix)]
async fn terminate() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    sigterm.recv().await;
    info!("Received SIGTERM, initiating shutdown");
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(args.verbose);

    info!("Harmony daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if let Some(ref path) = config.config_file_path {
        info!(config_path = ?path, "Config file");
    }
    info!(
        hub_ip = %config.hub_ip,
        name = %config.name,
        refresh_secs = ?config.refresh_timer_secs,
        source = %config.source(),
        "Configuration loaded"
    );

    let discovery = match discover(&config).await {
        Ok(discovery) => discovery,
        Err(e) => {
            error!(error = %e, hub_ip = %config.hub_ip, "Hub discovery failed");
            return Err(e).context("Hub discovery failed");
        }
    };

    let (platform, updates) = HarmonyPlatform::launch(&config, discovery).await;
    let logger = tokio::spawn(log_updates(updates));

    let result = tokio::select! {
        result = control::serve(
            BufReader::new(tokio::io::stdin()),
            |command| handle_command(&platform, command),
        ) => result.context("Failed to read control input"),
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, initiating shutdown");
            result.context("Failed to listen for Ctrl+C")
        }
        result = terminate() => result,
    };

    info!("Shutting down...");
    platform.shutdown().await;
    logger.abort();

    match result {
        Ok(()) => {
            info!("Harmony daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
