// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, EngineConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "nupic_engine.toml";

/// Find the engine configuration file
///
/// Search order:
/// 1. `NUPIC_CONFIG_PATH` environment variable
/// 2. Current working directory: `./nupic_engine.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NUPIC_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NUPIC_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NUPIC_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<EngineConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: EngineConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NUPIC_LOG_LEVEL` -> `logging.level`
/// - `NUPIC_LOG_FORMAT` -> `logging.format`
/// - `NUPIC_MODULE_PATH` -> `runtime.module_search_paths` (platform path list)
/// - `NUPIC_BUNDLE_EXTENSION` -> `network.bundle_extension`
/// - `NUPIC_CHECKPOINT_LABEL` -> `network.default_checkpoint_label`
/// - `NUPIC_MAX_PHASE_JUMP` -> `network.max_phase_jump`
pub fn apply_environment_overrides(config: &mut EngineConfig) {
    if let Ok(value) = env::var("NUPIC_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("NUPIC_LOG_FORMAT") {
        config.logging.format = value;
    }
    if let Some(value) = env::var_os("NUPIC_MODULE_PATH") {
        config.runtime.module_search_paths = env::split_paths(&value).collect();
    }
    if let Ok(value) = env::var("NUPIC_BUNDLE_EXTENSION") {
        config.network.bundle_extension = value;
    }
    if let Ok(value) = env::var("NUPIC_CHECKPOINT_LABEL") {
        config.network.default_checkpoint_label = value;
    }
    if let Ok(value) = env::var("NUPIC_MAX_PHASE_JUMP") {
        if let Ok(jump) = value.parse::<u32>() {
            config.network.max_phase_jump = jump;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// Keys: `log_level`, `log_format`, `module_path`, `bundle_extension`,
/// `checkpoint_label`, `max_phase_jump`.
pub fn apply_cli_overrides(config: &mut EngineConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_format") {
        config.logging.format = value.clone();
    }
    if let Some(value) = cli_args.get("module_path") {
        config.runtime.module_search_paths = env::split_paths(value).collect();
    }
    if let Some(value) = cli_args.get("bundle_extension") {
        config.network.bundle_extension = value.clone();
    }
    if let Some(value) = cli_args.get("checkpoint_label") {
        config.network.default_checkpoint_label = value.clone();
    }
    if let Some(value) = cli_args.get("max_phase_jump") {
        if let Ok(jump) = value.parse::<u32>() {
            config.network.max_phase_jump = jump;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("NUPIC_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("NUPIC_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("NUPIC_CONFIG_PATH", "/definitely/not/here/nupic_engine.toml");
        let result = find_config_file();
        env::remove_var("NUPIC_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("NUPIC_MAX_PHASE_JUMP");
        env::remove_var("NUPIC_BUNDLE_EXTENSION");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[network]").unwrap();
        writeln!(file, "max_phase_jump = 5").unwrap();
        writeln!(file, "[runtime]").unwrap();
        writeln!(file, "module_search_paths = [\"/opt/regions\"]").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.network.max_phase_jump, 5);
        assert_eq!(config.network.bundle_extension, ".nta");
        assert_eq!(
            config.runtime.module_search_paths,
            vec![PathBuf::from("/opt/regions")]
        );
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[network\nmax_phase_jump = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = EngineConfig::default();

        env::set_var("NUPIC_LOG_LEVEL", "debug");
        env::set_var("NUPIC_MAX_PHASE_JUMP", "7");
        env::set_var("NUPIC_CHECKPOINT_LABEL", "nightly");

        apply_environment_overrides(&mut config);

        env::remove_var("NUPIC_LOG_LEVEL");
        env::remove_var("NUPIC_MAX_PHASE_JUMP");
        env::remove_var("NUPIC_CHECKPOINT_LABEL");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.network.max_phase_jump, 7);
        assert_eq!(config.network.default_checkpoint_label, "nightly");
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        // CLI overrides take precedence over environment variables
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"warn\"").unwrap();
        writeln!(file, "[network]").unwrap();
        writeln!(file, "default_checkpoint_label = \"file-label\"").unwrap();

        env::set_var("NUPIC_LOG_LEVEL", "error");
        env::set_var("NUPIC_CHECKPOINT_LABEL", "env-label");

        let mut cli_args = HashMap::new();
        cli_args.insert("checkpoint_label".to_string(), "cli-label".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("NUPIC_LOG_LEVEL");
        env::remove_var("NUPIC_CHECKPOINT_LABEL");

        // CLI wins for label, env wins for level (no CLI override)
        assert_eq!(config.network.default_checkpoint_label, "cli-label");
        assert_eq!(config.logging.level, "error");
    }
}
