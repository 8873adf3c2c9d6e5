//! TD5 Diagnostic Daemon - K-Line Protocol Engine
//!
//! Wakes a TD5 engine control unit over a K-line FTDI cable, completes
//! the seed-key security handshake, and polls telemetry until stopped.

mod config;
mod error;
mod frame;
mod ftdi;
mod kline;
mod pid;
mod poller;
mod security;
mod session;
mod transport;

#[cfg(test)]
mod mock;

use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::ftdi::FtdiTransport;
use crate::poller::Poller;
use crate::session::Td5Session;
use crate::transport::{DataBits, Parity, StopBits, Transport};

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };
    debug!(
        "Effective config: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );

    info!("Scanning for FTDI devices...");
    let devices = ftdi::list_devices().context("listing FTDI devices")?;
    if devices.is_empty() {
        bail!("no FTDI devices attached; check the K-line cable");
    }
    for dev in &devices {
        info!(
            "Found {:04X}:{:04X} {} ({})",
            dev.vendor_id, dev.product_id, dev.description, dev.serial_number
        );
    }

    let mut transport = FtdiTransport::open(config.vendor_id, config.product_id)?;
    transport.configure(
        config.baud_rate,
        DataBits::Eight,
        StopBits::One,
        Parity::None,
    )?;

    let mut session = Td5Session::new(transport, config);
    session.connect().context("connecting to the ECU")?;

    // Runs until the process is killed; the flag is the hook for a
    // supervisor thread to stop the loop between iterations.
    let stop = AtomicBool::new(false);
    Poller::new().run(&mut session, &stop, |reading| {
        info!(
            "{}: {:.3} {}",
            reading.channel, reading.value, reading.unit
        );
    });

    session.close()?;
    Ok(())
}
