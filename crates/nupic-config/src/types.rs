// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `nupic_engine.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub runtime: RuntimeConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// Region implementation module resolution
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directories searched when a region type names an external module
    pub module_search_paths: Vec<PathBuf>,
    /// Separator between module name and type name, e.g. `py.SPRegion`
    pub module_separator: char,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            module_search_paths: Vec::new(),
            module_separator: '.',
        }
    }
}

/// Network checkpoint and scheduling settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Required extension of checkpoint bundle directories
    pub bundle_extension: String,
    /// Label used when saving without an explicit label
    pub default_checkpoint_label: String,
    /// Largest gap allowed between the highest existing phase and a new one
    pub max_phase_jump: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bundle_extension: ".nta".to_string(),
            default_checkpoint_label: "network".to_string(),
            max_phase_jump: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    /// text or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
