// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Network Runner

Loads a saved network bundle, runs it for a number of iterations and prints
every region's outputs. Optionally saves the advanced network again.

Usage:
  cargo run --bin nupic-run -- <network.nta> [--iterations N] [--config nupic_engine.toml] [--save out.nta] [--debug-nupic-engine]

Example:
  cargo run --bin nupic-run -- hierarchy.nta --iterations 10 --save hierarchy_10.nta
*/

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use nupic::config::{load_config, EngineConfig};
use nupic::engine::{Network, NupicRuntime, StdPlatform};
use nupic::observability::{
    debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingConfig,
};
use nupic::types::BasicType;
use tracing::info;

struct RunArgs {
    bundle: PathBuf,
    iterations: u64,
    config: Option<PathBuf>,
    save: Option<PathBuf>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: nupic-run <network.nta> [--iterations N] [--config <path>] [--save <out.nta>]\n\n\
         Defaults:\n\
         - iterations: 1\n\
         - config: nupic_engine.toml if found, built-in defaults otherwise\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> RunArgs {
    let mut bundle = None;
    let mut iterations = 1;
    let mut config = None;
    let mut save = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--iterations" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                iterations = v.parse().unwrap_or_else(|_| {
                    eprintln!("Bad iteration count: {v}");
                    usage_and_exit()
                });
            }
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                config = Some(PathBuf::from(v));
            }
            "--save" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                save = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            flag if flag.starts_with("--debug-") => {}
            other if other.starts_with("--") => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
            path => {
                if bundle.replace(PathBuf::from(path)).is_some() {
                    eprintln!("Only one bundle may be given");
                    usage_and_exit();
                }
            }
        }
    }

    RunArgs {
        bundle: bundle.unwrap_or_else(|| usage_and_exit()),
        iterations,
        config,
        save,
    }
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config(Some(path), None)
            .with_context(|| format!("Failed to load config {}", path.display())),
        // no config file anywhere is fine for a one-off run
        None => Ok(load_config(None, None).unwrap_or_default()),
    }
}

fn print_outputs(network: &Network) -> Result<()> {
    for region in network.regions() {
        for output in region.outputs() {
            let data = output.data();
            let rendered = match data.element_type() {
                BasicType::Real64 => format!("{:?}", data.as_slice::<f64>()?),
                BasicType::Real32 => format!("{:?}", data.as_slice::<f32>()?),
                BasicType::Int32 => format!("{:?}", data.as_slice::<i32>()?),
                BasicType::UInt32 => format!("{:?}", data.as_slice::<u32>()?),
                other => format!("<{} elements of {:?}>", data.count(), other),
            };
            println!("   {}.{} {}", region.name(), output.name(), rendered);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();
    let config = load_engine_config(args.config.as_deref())?;

    let debug_flags = parse_debug_flags();
    let logging = LoggingConfig {
        level: config.logging.level.clone(),
        format: LogFormat::from_name(&config.logging.format),
        ..LoggingConfig::default()
    };
    let _log_guard = init_logging(&logging, &debug_flags)?;

    let runtime = Arc::new(NupicRuntime::new(config, Box::new(StdPlatform)));
    runtime.init()?;

    {
        let mut network = Network::from_bundle(&runtime, &args.bundle)
            .with_context(|| format!("Failed to load {}", args.bundle.display()))?;
        info!(
            target: "nupic-run",
            "loaded {} regions and {} links from {}",
            network.region_count(),
            network.link_count(),
            args.bundle.display()
        );

        network.run(args.iterations)?;
        println!("After {} iteration(s):", network.iteration());
        print_outputs(&network)?;

        if let Some(out) = &args.save {
            network.save(out)?;
            println!("Saved to {}", out.display());
        }
    }

    runtime.shutdown()?;
    Ok(())
}
