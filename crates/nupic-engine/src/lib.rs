// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nupic-engine
//!
//! Computation-graph runtime: regions wired together by dimension-aware
//! links, driven through init → run → save/load → shutdown.
//!
//! ## Layers
//! - [`spec`] / [`parameters`]: static description of a region type and its
//!   validated construction parameters
//! - [`link_policy`]: dimension negotiation and splitter maps
//! - [`link`], [`input`], [`output`]: the edges and endpoints data flows through
//! - [`region_impl`] / [`factory`]: the plugin contract and type resolution
//! - [`region`] / [`network`]: the graph itself
//! - [`bundle_io`]: checkpoint stream access
//! - [`runtime`]: the init/shutdown gate tracking live networks
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nupic_engine::{Network, NupicRuntime, StdPlatform};
//! use nupic_config::EngineConfig;
//! use nupic_types::Dimensions;
//!
//! let runtime = Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform)));
//! runtime.init()?;
//! let mut net = Network::new(&runtime)?;
//! net.add_region("sensor", "TestNode", "")?;
//! net.add_region("pooler", "TestNode", "")?;
//! net.set_region_dimensions("sensor", Dimensions::new(vec![4]))?;
//! net.link("sensor", "", "pooler", "", "UniformLink", "")?;
//! net.run(10)?;
//! # Ok::<(), nupic_engine::EngineError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bundle_io;
pub mod error;
pub mod factory;
pub mod input;
pub mod link;
pub mod link_policy;
pub mod network;
pub mod output;
pub mod parameters;
pub mod region;
pub mod region_impl;
pub mod runtime;
pub mod spec;
pub mod test_node;

pub use bundle_io::{BundleIo, BundleMode, BundleReader, BundleWriter};
pub use error::{EngineError, EngineResult, ErrorCategory};
pub use factory::{
    CreatedRegion, LoadedModule, ModuleLoader, ModuleRegistrar, RegionImplFactory, RegionModule,
    StaticModuleLoader,
};
pub use input::Input;
pub use link::{Link, LinkEndpoints, LinkId};
pub use link_policy::{
    BuiltinLinkPolicy, LinkPolicy, LinkPolicyFactory, SplitterMap, TestFanIn2LinkPolicy,
    UniformLinkPolicy,
};
pub use network::{Network, NetworkState, RunCallback};
pub use output::Output;
pub use parameters::{ParameterMap, ParameterValue};
pub use region::{DimensionSource, ProfileTimer, Region};
pub use region_impl::{RegionContext, RegionImpl, RegionIo, RegionTypeEntry};
pub use runtime::{NetworkId, NupicRuntime, Platform, StdPlatform};
pub use spec::{CommandSpec, InputSpec, OutputSpec, ParameterAccess, ParameterSpec, Spec};
pub use test_node::TestNode;
