//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`; this module installs a
//! subscriber for binaries and embedding servers that don't bring their own.
//!
//! | Variable                   | Values                                   | Default |
//! |----------------------------|------------------------------------------|---------|
//! | `MEDIAROUTE_LOG_LEVEL`     | `trace` `debug` `info` `warn` `error`    | `info`  |
//! | `MEDIAROUTE_LOG_FORMAT`    | `json` `pretty`                          | `json`  |
//! | `MEDIAROUTE_LOG_TARGETS`   | comma-separated `EnvFilter` directives   | none    |
//! | `MEDIAROUTE_LOG_LOCATION`  | `true` to include file:line              | `false` |
//!
//! `RUST_LOG`, when set, takes precedence over `MEDIAROUTE_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// JSON for production, pretty-print for development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives, e.g. `mediaroute::router=debug`
    pub target_filter: Option<String>,
    pub include_location: bool,
}

fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            level: parse_level(&env::var("MEDIAROUTE_LOG_LEVEL").unwrap_or_default()),
            format: LogFormat::parse(&env::var("MEDIAROUTE_LOG_FORMAT").unwrap_or_default()),
            target_filter: env::var("MEDIAROUTE_LOG_TARGETS").ok(),
            include_location: env::var("MEDIAROUTE_LOG_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Verbose, human-readable settings for local work and `--debug` runs.
    pub fn default_dev() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: true,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails when a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")
}

/// [`init`] with [`LogConfig::from_env`].
pub fn init_from_env() -> Result<()> {
    init(&LogConfig::from_env())
}
