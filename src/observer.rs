//! Session event reporting.
//!
//! The session loops and message sources never log directly. They report
//! `SessionEvent`s to a `SessionObserver`; the binary installs
//! `TracingObserver`, tests install a recorder.

use crate::keepalive::KeepaliveState;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Something that happened during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Identifying text for this session.
    Banner(String),
    /// Server is bound and waiting for its single peer.
    Listening { addr: SocketAddr },
    /// Server accepted its peer.
    Accepted { peer: SocketAddr },
    /// Client finished dialing.
    Connected { peer: SocketAddr },
    /// Keepalive options were applied; carries what the OS reports back.
    KeepaliveApplied {
        requested: bool,
        period_secs: i64,
        effective: Option<KeepaliveState>,
    },
    /// Keepalive options could not be applied. The session continues.
    KeepaliveFailed { error: String },
    /// Scripted source starts walking its sequence.
    ScriptStarted { events: usize, total_ms: u128 },
    /// One pacing pulse of a scripted event elapsed.
    Pulse { event: usize, pulse: u64 },
    /// Interactive source is waiting for the operator.
    Prompt,
    /// A line was written to the peer.
    LineSent(String),
    /// A line was read from the peer.
    LineReceived(String),
    /// Scripted source ran out of events.
    Completed,
}

/// Receives session events.
pub trait SessionObserver: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

/// Logs session events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn notify(&self, event: SessionEvent) {
        match event {
            SessionEvent::Banner(text) => info!(banner = %text, "Session banner"),
            SessionEvent::Listening { addr } => info!(address = %addr, "Server listening"),
            SessionEvent::Accepted { peer } => info!(peer = %peer, "Accepted connection"),
            SessionEvent::Connected { peer } => info!(peer = %peer, "Connected"),
            SessionEvent::KeepaliveApplied {
                requested,
                period_secs,
                effective,
            } => match effective {
                Some(state) => info!(
                    requested,
                    period_secs,
                    enabled = state.enabled,
                    idle_secs = ?state.idle.map(|d| d.as_secs()),
                    "TCP keepalive applied"
                ),
                None => info!(requested, period_secs, "TCP keepalive applied"),
            },
            SessionEvent::KeepaliveFailed { error } => {
                warn!(error = %error, "Failed to apply TCP keepalive, using socket defaults")
            }
            SessionEvent::ScriptStarted { events, total_ms } => {
                info!(events, total_ms, "Running scripted sequence")
            }
            SessionEvent::Pulse { event, pulse } => debug!(event, pulse, "Delay pulse"),
            SessionEvent::Prompt => info!("Text to send:"),
            SessionEvent::LineSent(line) => info!(line = %line, "Message sent"),
            SessionEvent::LineReceived(line) => info!(line = %line, "Message received"),
            SessionEvent::Completed => info!("Sequence complete"),
        }
    }
}
