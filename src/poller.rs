//! Telemetry polling loop.
//!
//! Once the session is connected, each iteration walks the telemetry
//! channels in a fixed round order. A channel whose exchange or decode
//! fails is skipped for that iteration; the loop and the session carry
//! on. There is no natural termination: the caller cancels via the stop
//! flag, checked between iterations.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::pid::Channel;
use crate::session::{SessionState, Td5Session};
use crate::transport::Transport;

/// One decoded telemetry sample.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub channel: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

/// Walks the telemetry channels against a connected session.
pub struct Poller {
    channels: Vec<Channel>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            channels: Channel::ROUND.to_vec(),
        }
    }

    /// Poll until `stop` is set.
    pub fn run<T, F>(&self, session: &mut Td5Session<T>, stop: &AtomicBool, mut sink: F)
    where
        T: Transport,
        F: FnMut(TelemetryReading),
    {
        if session.state() != SessionState::Connected {
            warn!("Poller started without a connected session");
            return;
        }

        while !stop.load(Ordering::Relaxed) {
            self.poll_once(session, &mut sink);
        }
    }

    /// One round over every channel.
    pub fn poll_once<T, F>(&self, session: &mut Td5Session<T>, sink: &mut F)
    where
        T: Transport,
        F: FnMut(TelemetryReading),
    {
        for &channel in &self.channels {
            let definition = channel.definition(session.pids()).clone();

            let payload = match session.exchange(&definition) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("{} exchange failed: {}", channel.name(), err);
                    continue;
                }
            };

            match channel.decode(&payload) {
                Ok(value) => sink(TelemetryReading {
                    timestamp: Utc::now(),
                    channel: channel.name(),
                    value,
                    unit: channel.unit(),
                }),
                Err(err) => warn!("{} decode failed: {}", channel.name(), err),
            }
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}
