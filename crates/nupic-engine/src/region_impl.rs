// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The contract every region implementation fulfils.
//!
//! The engine only ever talks to implementations through [`RegionImpl`] and
//! the three entry points of a [`RegionTypeEntry`]; it never learns their
//! concrete type.

use nupic_types::{Collection, Dimensions, TypedBuffer};

use crate::bundle_io::BundleIo;
use crate::input::Input;
use crate::output::Output;
use crate::parameters::{ParameterMap, ParameterValue};
use crate::spec::Spec;
use crate::{EngineError, EngineResult};

/// Identifies the region an implementation is being built for
#[derive(Debug, Clone, Copy)]
pub struct RegionContext<'a> {
    pub region_name: &'a str,
    pub type_name: &'a str,
}

/// The endpoints of one region, lent to its implementation for a step
pub struct RegionIo<'a> {
    pub(crate) region_name: &'a str,
    pub(crate) dimensions: &'a Dimensions,
    pub(crate) inputs: &'a Collection<Input>,
    pub(crate) outputs: &'a mut Collection<Output>,
}

impl<'a> RegionIo<'a> {
    pub fn region_name(&self) -> &str {
        self.region_name
    }

    pub fn dimensions(&self) -> &Dimensions {
        self.dimensions
    }

    pub fn node_count(&self) -> usize {
        self.dimensions.count()
    }

    pub fn input(&self, name: &str) -> EngineResult<&Input> {
        self.inputs
            .get(name)
            .map_err(|_| EngineError::NotFound(format!("input '{}' on region '{}'", name, self.region_name)))
    }

    pub fn output(&self, name: &str) -> EngineResult<&Output> {
        self.outputs
            .get(name)
            .map_err(|_| EngineError::NotFound(format!("output '{}' on region '{}'", name, self.region_name)))
    }

    pub fn output_data_mut(&mut self, name: &str) -> EngineResult<&mut TypedBuffer> {
        let region_name = self.region_name;
        self.outputs
            .get_mut(name)
            .map(Output::data_mut)
            .map_err(|_| EngineError::NotFound(format!("output '{}' on region '{}'", name, region_name)))
    }
}

pub trait RegionImpl: Send {
    /// Called once after outputs are allocated and inputs laid out
    fn initialize(&mut self, _io: &mut RegionIo<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// One step: read consolidated inputs, write outputs
    fn compute(&mut self, io: &mut RegionIo<'_>) -> EngineResult<()>;

    fn serialize(&self, bundle: &mut BundleIo) -> EngineResult<()>;

    /// Elements per node for outputs whose spec count is 0
    fn node_output_element_count(&self, output: &str) -> EngineResult<usize>;

    fn get_parameter(&self, name: &str) -> EngineResult<ParameterValue> {
        Err(EngineError::NotFound(format!("parameter '{}'", name)))
    }

    fn set_parameter(&mut self, name: &str, _value: ParameterValue) -> EngineResult<()> {
        Err(EngineError::InvalidParameter(format!("parameter '{}' is not settable", name)))
    }

    fn execute_command(&mut self, args: &[&str]) -> EngineResult<String> {
        Err(EngineError::InvalidParameter(format!(
            "unsupported command '{}'",
            args.first().copied().unwrap_or_default()
        )))
    }
}

pub type CreateFn = fn(&ParameterMap, &RegionContext<'_>) -> EngineResult<Box<dyn RegionImpl>>;
pub type DeserializeFn = fn(&mut BundleIo, &RegionContext<'_>) -> EngineResult<Box<dyn RegionImpl>>;
pub type SpecFn = fn() -> EngineResult<Spec>;

/// Entry points of one region type
#[derive(Clone, Copy)]
pub struct RegionTypeEntry {
    pub create: CreateFn,
    pub deserialize: DeserializeFn,
    pub spec: SpecFn,
}
