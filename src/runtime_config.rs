//! # Runtime Configuration
//!
//! Environment-driven knobs for the dispatcher, read once at startup.
//!
//! ## `MEDIAROUTE_STACK_SIZE`
//!
//! Stack size of the coroutines handlers run on. Decimal (`32768`) or
//! hexadecimal (`0x8000`). Default: `0x10000` (64 KB).
//!
//! Memory use is roughly stack size × concurrent handler invocations, and a
//! multipart request runs one invocation per part.
//!
//! ## `MEDIAROUTE_DEFAULT_TIMEOUT_MS`
//!
//! Timeout applied to actions that do not declare their own. Unset or `0`
//! means actions without a timeout wait for their handler indefinitely.
//!
//! ## `MEDIAROUTE_DEBUG_ERRORS`
//!
//! `1`/`true` adds the internal diagnostic to the message of `500` bodies.
//! Never enable this in production.
//!
//! ```rust
//! use mediaroute::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;
use std::time::Duration;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Handler coroutine stack size in bytes
    pub stack_size: usize,
    pub default_timeout: Option<Duration>,
    pub debug_errors: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            default_timeout: None,
            debug_errors: false,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let stack_size = get("MEDIAROUTE_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .filter(|&n| n > 0)
            .unwrap_or(defaults.stack_size);
        let default_timeout = get("MEDIAROUTE_DEFAULT_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis);
        let debug_errors = get("MEDIAROUTE_DEBUG_ERRORS")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.debug_errors);
        Self {
            stack_size,
            default_timeout,
            debug_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), RuntimeConfig::default());
    }

    #[test]
    fn stack_size_accepts_hex_and_decimal() {
        assert_eq!(config(&[("MEDIAROUTE_STACK_SIZE", "0x8000")]).stack_size, 0x8000);
        assert_eq!(config(&[("MEDIAROUTE_STACK_SIZE", "16384")]).stack_size, 16384);
        assert_eq!(
            config(&[("MEDIAROUTE_STACK_SIZE", "lots")]).stack_size,
            DEFAULT_STACK_SIZE
        );
    }

    #[test]
    fn timeout_and_debug_flag() {
        let c = config(&[
            ("MEDIAROUTE_DEFAULT_TIMEOUT_MS", "1500"),
            ("MEDIAROUTE_DEBUG_ERRORS", "true"),
        ]);
        assert_eq!(c.default_timeout, Some(Duration::from_millis(1500)));
        assert!(c.debug_errors);
        assert_eq!(config(&[("MEDIAROUTE_DEFAULT_TIMEOUT_MS", "0")]).default_timeout, None);
    }
}
