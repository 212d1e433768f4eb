//! keepalive-echo: a tiny program for testing TCP keepalive
//!
//! Runs either side of a line-echo connection:
//! - `server`: accepts one peer and echoes each line back upper-cased
//! - `client`: sends timed (scripted) or typed (interactive) lines
//!
//! Features:
//! - Per-connection SO_KEEPALIVE on/off and probe period
//! - Reports the keepalive settings the OS actually applied
//! - Interval mini-language for paced messages, e.g. `100{3},1000`
//! - Configuration via CLI arguments or TOML file

mod client;
mod config;
mod interval;
mod keepalive;
mod observer;
mod protocol;
mod server;
mod session;
mod source;

use config::{Config, Mode};
use interval::IntervalSequence;
use observer::TracingObserver;
use session::SessionConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match config.mode {
        Mode::Session(session) => run_session(session),
        Mode::Test { spec } => run_test(&spec),
    }
}

/// Run one session on a single-threaded runtime.
fn run_session(config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        role = ?config.role,
        address = %config.address,
        port = config.port,
        keepalive = config.keepalive.enabled,
        keepalive_time = config.keepalive.period_secs,
        "Starting keepalive-echo"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(session::run(config, Arc::new(TracingObserver)));

    // Don't wait on a stdin read that will never finish
    runtime.shutdown_background();

    let outcome = result?;
    info!(?outcome, "Session finished");
    Ok(())
}

/// Print the events an interval spec expands to.
fn run_test(spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sequence = IntervalSequence::parse(spec)?;
    if sequence.is_empty() {
        println!("empty spec: the client completes without sending");
        return Ok(());
    }

    for event in sequence.events() {
        println!(
            "{:>4}  {:<16} delay={}ms repeat={} pulses={}",
            event.index,
            event.token,
            event.delay_ms,
            event.repeat,
            event.pulses()
        );
    }
    println!(
        "{} event(s), {}ms total",
        sequence.len(),
        sequence.total_delay().as_millis()
    );

    Ok(())
}
