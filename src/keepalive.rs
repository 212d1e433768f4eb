//! TCP keepalive configuration for an established connection.

use serde::Deserialize;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

/// Default probe period in seconds.
pub const DEFAULT_PERIOD_SECS: i64 = 75;

/// Requested keepalive behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct KeepaliveConfig {
    /// Turn `SO_KEEPALIVE` on or off.
    #[serde(default)]
    pub enabled: bool,
    /// Probe period in seconds. Values <= 0 leave probe timing to the OS.
    #[serde(default = "default_period", rename = "time")]
    pub period_secs: i64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }
}

fn default_period() -> i64 {
    DEFAULT_PERIOD_SECS
}

impl KeepaliveConfig {
    /// The explicit probe period to program, if any.
    fn period(&self) -> Option<Duration> {
        match u64::try_from(self.period_secs) {
            Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

/// Keepalive settings as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveState {
    pub enabled: bool,
    /// Idle time before the first probe, where the platform exposes it.
    pub idle: Option<Duration>,
}

/// A socket option could not be applied or read.
#[derive(Debug, Error)]
pub enum KeepaliveError {
    #[error("failed to set SO_KEEPALIVE={enabled}: {source}")]
    Toggle {
        enabled: bool,
        #[source]
        source: io::Error,
    },
    #[error("failed to set keepalive period to {secs}s: {source}")]
    Period {
        secs: i64,
        #[source]
        source: io::Error,
    },
    #[error("failed to read keepalive state: {0}")]
    Inspect(#[source] io::Error),
}

/// Apply `config` to the connection.
///
/// Disabling is idempotent. When enabling, the period is programmed as both
/// the idle time and (where supported) the probe interval.
pub fn apply(stream: &TcpStream, config: &KeepaliveConfig) -> Result<(), KeepaliveError> {
    let socket = SockRef::from(stream);

    socket
        .set_keepalive(config.enabled)
        .map_err(|source| KeepaliveError::Toggle {
            enabled: config.enabled,
            source,
        })?;

    if !config.enabled {
        return Ok(());
    }

    let Some(period) = config.period() else {
        return Ok(());
    };

    let params = TcpKeepalive::new().with_time(period);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let params = params.with_interval(period);

    socket
        .set_tcp_keepalive(&params)
        .map_err(|source| KeepaliveError::Period {
            secs: config.period_secs,
            source,
        })
}

/// Read back the effective keepalive settings.
pub fn inspect(stream: &TcpStream) -> Result<KeepaliveState, KeepaliveError> {
    let socket = SockRef::from(stream);
    let enabled = socket.keepalive().map_err(KeepaliveError::Inspect)?;

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let idle = if enabled {
        Some(socket.keepalive_time().map_err(KeepaliveError::Inspect)?)
    } else {
        None
    };
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    let idle = None;

    Ok(KeepaliveState { enabled, idle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_disable_is_idempotent() {
        let (client, _server) = loopback_pair().await;
        let config = KeepaliveConfig {
            enabled: false,
            period_secs: 75,
        };

        apply(&client, &config).unwrap();
        apply(&client, &config).unwrap();

        let state = inspect(&client).unwrap();
        assert!(!state.enabled);
        assert_eq!(state.idle, None);
    }

    #[tokio::test]
    async fn test_enable_with_period() {
        let (client, _server) = loopback_pair().await;
        let config = KeepaliveConfig {
            enabled: true,
            period_secs: 30,
        };

        apply(&client, &config).unwrap();

        let state = inspect(&client).unwrap();
        assert!(state.enabled);
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        assert_eq!(state.idle, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_non_positive_period_keeps_platform_timing() {
        let (client, _server) = loopback_pair().await;

        for period_secs in [0, -5] {
            let config = KeepaliveConfig {
                enabled: true,
                period_secs,
            };
            apply(&client, &config).unwrap();

            let state = inspect(&client).unwrap();
            assert!(state.enabled);
            // Idle time is left at the OS default
            #[cfg(any(target_os = "linux", target_os = "macos"))]
            assert!(state.idle.is_some_and(|idle| idle > Duration::ZERO));
        }
    }

    #[test]
    fn test_period() {
        let enabled = |period_secs| KeepaliveConfig {
            enabled: true,
            period_secs,
        };
        assert_eq!(enabled(75).period(), Some(Duration::from_secs(75)));
        assert_eq!(enabled(0).period(), None);
        assert_eq!(enabled(-1).period(), None);
    }

    #[test]
    fn test_default_config() {
        let config = KeepaliveConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.period_secs, 75);
    }
}
