//! # CLI Module
//!
//! Command-line front end of the `mediaroute-gen` binary.
//!
//! ## Commands
//!
//! ### `generate`
//!
//! Check a definition directory and write its artifacts:
//!
//! ```bash
//! mediaroute-gen generate --source api/ --output generated/
//! ```
//!
//! Options:
//! - `--source <DIR>` - Directory of `*.yaml`, `*.yml` or `*.json` definition files
//! - `--output <DIR>` - Where artifacts are written (default: `generated`)
//! - `--debug` - Pretty, debug-level logging
//!
//! ### `check`
//!
//! Load and check the definitions without writing anything:
//!
//! ```bash
//! mediaroute-gen check --source api/
//! ```
//!
//! ### `routes`
//!
//! Print the routing table:
//!
//! ```bash
//! mediaroute-gen routes --source api/
//! ```
//!
//! Every command exits with status 0 on success. Definition problems are
//! listed on stderr, one per line, and the exit status is 1.

mod commands;


pub use commands::{execute, run_cli, Cli, Commands};
