//! Configuration module for keepalive-echo.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::keepalive::KeepaliveConfig;
use crate::session::{Role, SessionConfig, SourceKind};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "keepalive-echo")]
#[command(version = "0.1.0")]
#[command(about = "A tiny program for testing TCP keepalive", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable TCP keepalive on the connection
    #[arg(long, global = true)]
    pub keepalive: bool,

    /// Keepalive probe period in seconds (<= 0 keeps the OS default)
    #[arg(long = "keepalive-time", global = true, allow_negative_numbers = true)]
    pub keepalive_time: Option<i64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run as server
    #[command(visible_alias = "s")]
    Server(ServerArgs),
    /// Run as client
    #[command(visible_alias = "c")]
    Client(ClientArgs),
    /// Parse an interval spec and print its events without connecting
    #[command(visible_alias = "t")]
    Test {
        /// Interval spec, e.g. "100{3},50"
        spec: String,
    },
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Bind host for server [default: 0.0.0.0]
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on [default: 8081]
    #[arg(long)]
    pub port: Option<u16>,

    /// Identifying text logged at startup
    #[arg(long = "hello-server")]
    pub hello_server: Option<String>,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Host to connect to [default: 127.0.0.1]
    #[arg(long)]
    pub connect: Option<String>,

    /// Port to connect to [default: 8081]
    #[arg(long)]
    pub port: Option<u16>,

    /// Read lines to send from stdin
    #[arg(short, long)]
    pub interactive: bool,

    /// Delays in ms; '100{3}' pauses 100ms four times before sending
    /// [default: 1000,1000,1000]
    #[arg(long)]
    pub seq: Option<String>,

    /// Identifying text logged at startup
    #[arg(long = "hello-client")]
    pub hello_client: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_server_banner")]
    pub banner: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            banner: default_server_banner(),
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect")]
    pub connect: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default = "default_seq")]
    pub seq: String,
    #[serde(default = "default_client_banner")]
    pub banner: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            port: default_port(),
            interactive: false,
            seq: default_seq(),
            banner: default_client_banner(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_connect() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_seq() -> String {
    "1000,1000,1000".to_string()
}

fn default_server_banner() -> String {
    "hello-server string".to_string()
}

fn default_client_banner() -> String {
    "hello-client string".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What the process should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Run one server or client session.
    Session(SessionConfig),
    /// Parse and print an interval spec.
    Test { spec: String },
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::resolve(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let keepalive = KeepaliveConfig {
            enabled: cli.keepalive || toml_config.keepalive.enabled,
            period_secs: cli
                .keepalive_time
                .unwrap_or(toml_config.keepalive.period_secs),
        };

        let mode = match cli.command {
            Command::Server(args) => Mode::Session(SessionConfig {
                role: Role::Server,
                address: args.bind.unwrap_or(toml_config.server.bind),
                port: args.port.unwrap_or(toml_config.server.port),
                keepalive,
                banner: args.hello_server.unwrap_or(toml_config.server.banner),
            }),
            Command::Client(args) => {
                let source = if args.interactive || toml_config.client.interactive {
                    SourceKind::Interactive
                } else {
                    SourceKind::Scripted(args.seq.unwrap_or(toml_config.client.seq))
                };

                Mode::Session(SessionConfig {
                    role: Role::Client(source),
                    address: args.connect.unwrap_or(toml_config.client.connect),
                    port: args.port.unwrap_or(toml_config.client.port),
                    keepalive,
                    banner: args.hello_client.unwrap_or(toml_config.client.banner),
                })
            }
            Command::Test { spec } => Mode::Test { spec },
        };

        Config {
            mode,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
