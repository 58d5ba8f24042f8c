//! # Generator Module
//!
//! Compiles a directory of API definition files into runtime artifacts.
//!
//! ## Overview
//!
//! The whole declaration graph is loaded and checked before anything is
//! written. Every diagnostic is collected, so one run reports every broken
//! view reference, ambiguous route and missing parameter at once.
//!
//! ```text
//! *.yaml / *.json → load + check → artifacts (staging dir) → rename into place
//! ```
//!
//! ## Artifacts
//!
//! ```text
//! generated/
//! ├── routes.json        # Routing table: method, template, handler, responses
//! ├── validators.json    # Per-handler parameter and payload constraints
//! ├── media_types.json   # Attributes and views of every media type
//! └── ROUTES.md          # Human-readable route summary
//! ```
//!
//! Files are first written to a staging directory inside the output
//! directory and only moved into place once all of them rendered. Files
//! they replace are kept aside until the last rename succeeds, so a failed
//! run leaves the output directory as it was.
//!
//! ## Usage
//!
//! ```bash
//! mediaroute-gen generate --source api/ --output generated/
//! mediaroute-gen check --source api/
//! mediaroute-gen routes --source api/
//! ```

mod artifacts;
mod project;
mod templates;

pub use artifacts::{media_types_json, routes_json, validators_json, Artifact};
pub use project::{generate, print_issues, GeneratorError};
pub use templates::routes_markdown;
