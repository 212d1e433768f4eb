//! Session engine.
//!
//! A session is one TCP connection from establishment to termination:
//!
//! - Server: `Listening -> Connected -> Serving -> Closed`. Serves exactly
//!   one peer and ends when that peer fails or disconnects.
//! - Client: `Dialing -> Connected -> Exchanging -> Completed | Closed`.
//!   Ends normally only when a scripted source runs out of lines.

use crate::client;
use crate::interval::IntervalError;
use crate::keepalive::{self, KeepaliveConfig, KeepaliveError, KeepaliveState};
use crate::observer::{SessionEvent, SessionObserver};
use crate::server::Server;
use crate::source::SourceError;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;

/// Which side of the connection this session plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Server,
    Client(SourceKind),
}

/// Where a client's outbound lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Lines typed on stdin.
    Interactive,
    /// Lines generated from an interval spec.
    Scripted(String),
}

/// Everything a session needs, resolved and validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub role: Role,
    /// Bind address (server) or remote host (client).
    pub address: String,
    pub port: u16,
    pub keepalive: KeepaliveConfig,
    /// Identifying text logged at session start. Never sent.
    pub banner: String,
}

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The scripted source ran out of lines.
    Completed,
}

/// Fatal session errors. Nothing here is retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid interval spec: {0}")]
    Interval(#[from] IntervalError),
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the connection")]
    PeerClosed,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Run one session to its end.
pub async fn run(
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
) -> Result<SessionOutcome, SessionError> {
    observer.notify(SessionEvent::Banner(config.banner.clone()));

    match config.role {
        Role::Server => {
            let server = Server::bind(&config.address, config.port, config.keepalive).await?;
            match server.serve_one(observer).await? {}
        }
        Role::Client(kind) => {
            client::run(&config.address, config.port, config.keepalive, kind, observer).await
        }
    }
}

/// Apply keepalive to a fresh connection and report the result.
///
/// Failures are reported and otherwise ignored; the socket keeps whatever
/// keepalive state the OS left it in.
pub(crate) fn configure_keepalive(
    stream: &TcpStream,
    config: &KeepaliveConfig,
    observer: &dyn SessionObserver,
) {
    let result = keepalive::apply(stream, config).map(|()| keepalive::inspect(stream).ok());
    report_keepalive(config, result, observer);
}

/// Turn the outcome of applying keepalive into an observer event.
fn report_keepalive(
    config: &KeepaliveConfig,
    result: Result<Option<KeepaliveState>, KeepaliveError>,
    observer: &dyn SessionObserver,
) {
    let event = match result {
        Ok(effective) => SessionEvent::KeepaliveApplied {
            requested: config.enabled,
            period_secs: config.period_secs,
            effective,
        },
        Err(e) => SessionEvent::KeepaliveFailed {
            error: e.to_string(),
        },
    };
    observer.notify(event);
}
