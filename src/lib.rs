// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nupic
//!
//! Computation-graph runtime for cortical algorithms. A network is a set of
//! named regions (nodes arranged in an N-dimensional grid) connected by
//! links that route output elements to input elements. Networks can be run
//! in phases, saved to `.nta` bundles and restored later.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! nupic = "0.1"
//! ```
//!
//! ```rust,no_run
//! use nupic::prelude::*;
//!
//! let runtime = Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform)));
//! runtime.init()?;
//!
//! let mut net = Network::new(&runtime)?;
//! net.add_region("level1", "TestNode", "")?;
//! net.add_region("level2", "TestNode", "")?;
//! net.set_region_dimensions("level1", Dimensions::new(vec![4, 4]))?;
//! net.link("level1", "", "level2", "", "TestFanIn2", "")?;
//! net.run(5)?;
//! net.save(std::path::Path::new("hierarchy.nta"))?;
//! # Ok::<(), EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: nupic-types, nupic-config                  │
//! │  (TypedBuffer, Collection, Dimensions, EngineConfig)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Engine: nupic-engine                                   │
//! │  (Region, Link, Network, factory, checkpoints)          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Tools: nupic-run (+ nupic-observability logging)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use nupic_config as config;
pub use nupic_engine as engine;
pub use nupic_observability as observability;
pub use nupic_types as types;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::config::EngineConfig;
    pub use crate::engine::{
        EngineError, EngineResult, Network, NetworkState, NupicRuntime, ParameterValue, Region,
        RegionImpl, RegionIo, Spec, StdPlatform,
    };
    pub use crate::types::{BasicType, Collection, Dimensions, TypedBuffer};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let dims = Dimensions::new(vec![2, 3]);
        assert_eq!(dims.count(), 6);
        assert_eq!(EngineConfig::default().network.bundle_extension, ".nta");
    }
}
