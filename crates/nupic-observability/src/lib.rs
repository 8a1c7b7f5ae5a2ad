// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nupic-observability
//!
//! Logging infrastructure shared by the engine crates and tools, with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with rolling JSON log files

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known crate names for debug flags (tracing targets)
pub const KNOWN_CRATES: &[&str] = &[
    "nupic-engine",
    "nupic-config",
    "nupic-types",
    "nupic-run",
];
