//! # eq3d: eQ-3 thermostat console
//!
//! Composition root that wires the BLE adapter to the device engine.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Open the host BLE adapter and build the device registry from known
//!   addresses or a scan; thermostats connect on their first command
//! - Read set-points from stdin and apply them to every thermostat
//! - Print a status line on every update and at a fixed interval
//! - Disconnect everything on Ctrl-C or end of input
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no protocol logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing_subscriber::EnvFilter;

use eq3_adapter_ble::BtleplugTransport;
use eq3_app::registry::DeviceRegistry;
use eq3_app::session::check_temperature;
use eq3_domain::thermostat::Mode;

use crate::config::Config;

type Registry = DeviceRegistry<BtleplugTransport>;

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_status(registry: &Registry) {
    for session in registry {
        println!(
            "{}",
            console::status_line(session.address(), &session.status())
        );
    }
}

/// Switch every thermostat to auto and apply `celsius`.
///
/// An out-of-range set-point is rejected before any device is touched.
/// Failures are logged per device and not retried.
async fn apply_temperature(registry: &Registry, celsius: f32) {
    if let Err(err) = check_temperature(celsius) {
        tracing::warn!(%err, "ignoring input");
        return;
    }
    for session in registry {
        let address = session.address();
        if let Err(err) = session.set_mode(Mode::Auto).await {
            tracing::warn!(%address, error = %err, "failed to switch to auto mode");
            continue;
        }
        if let Err(err) = session.set_temperature(celsius).await {
            tracing::warn!(%address, error = %err, "failed to set temperature");
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config.logging.filter);

    let transport = Arc::new(BtleplugTransport::new(config.ble.clone()).await?);
    let mut disconnections = transport.disconnections().await?;
    let mut registry = DeviceRegistry::new(Arc::clone(&transport));

    if config.devices.addresses.is_empty() {
        let found = registry
            .scan_and_discover(config.ble.scan_duration(), config.ble.active_scan)
            .await?;
        tracing::info!(found, "discovered thermostats");
    } else {
        for address in &config.devices.addresses {
            registry.add_known_device(*address);
        }
    }
    if registry.is_empty() {
        tracing::warn!("no thermostat to drive");
    }

    for session in &registry {
        let weak = Arc::downgrade(session);
        session.set_status_callback(move || {
            if let Some(session) = weak.upgrade() {
                println!(
                    "{}",
                    console::status_line(session.address(), &session.status())
                );
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.status.interval());

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match console::parse_line(&line) {
                    Ok(Some(celsius)) => apply_temperature(&registry, celsius).await,
                    Ok(None) => {}
                    Err(err) => tracing::warn!(%err, "ignoring input"),
                },
                None => {
                    tracing::info!("end of input");
                    break;
                }
            },
            _ = ticker.tick() => print_status(&registry),
            Some(address) = disconnections.recv() => {
                if !registry.handle_connection_lost(address).await {
                    tracing::debug!(%address, "ignoring disconnect of unmanaged peripheral");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("interrupted");
                break;
            }
        }
    }

    registry.disconnect_all().await;
    Ok(())
}
