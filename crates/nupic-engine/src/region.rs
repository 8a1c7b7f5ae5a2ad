// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! A named node of the network wrapping one region implementation.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nupic_types::{ArrayRef, Collection, Dimensions, TypesError};
use tracing::{debug, trace};

use crate::bundle_io::BundleIo;
use crate::factory::{CreatedRegion, LoadedModule};
use crate::input::Input;
use crate::output::Output;
use crate::parameters::ParameterValue;
use crate::region_impl::{RegionImpl, RegionIo};
use crate::spec::{ParameterAccess, Spec};
use crate::{EngineError, EngineResult};

/// Where a region's dimensions came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionSource {
    Unset,
    Explicit,
    /// Induced through the named link
    Induced(String),
}

/// Accumulated wall time of one kind of region call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileTimer {
    elapsed: Duration,
    calls: u64,
}

impl ProfileTimer {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn record(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        self.calls += 1;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct Region {
    name: String,
    type_name: String,
    spec: Arc<Spec>,
    implementation: Box<dyn RegionImpl>,
    inputs: Collection<Input>,
    outputs: Collection<Output>,
    dimensions: Dimensions,
    dimension_source: DimensionSource,
    phases: BTreeSet<u32>,
    initialized: bool,
    profiling: bool,
    compute_timer: ProfileTimer,
    execute_timer: ProfileTimer,
    // Declared last so the module outlives the implementation it built
    _module: Option<Arc<LoadedModule>>,
}

impl Region {
    pub(crate) fn new(name: &str, type_name: &str, created: CreatedRegion) -> EngineResult<Self> {
        let CreatedRegion {
            implementation,
            spec,
            module,
        } = created;

        let mut inputs = Collection::new();
        for (input_name, input) in spec.inputs.iter() {
            inputs.add(
                input_name,
                Input::new(input_name, input.data_type, input.region_level, input.required),
            )?;
        }
        let mut outputs = Collection::new();
        for (output_name, output) in spec.outputs.iter() {
            outputs.add(output_name, Output::new(output_name, output.data_type, output.region_level))?;
        }

        let (dimensions, dimension_source) = if spec.single_node_only {
            (Dimensions::new(vec![1]), DimensionSource::Explicit)
        } else {
            (Dimensions::unspecified(), DimensionSource::Unset)
        };

        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            spec,
            implementation,
            inputs,
            outputs,
            dimensions,
            dimension_source,
            phases: BTreeSet::new(),
            initialized: false,
            profiling: false,
            compute_timer: ProfileTimer::default(),
            execute_timer: ProfileTimer::default(),
            _module: module,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Shared spec of this region's type
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    pub fn dimension_source(&self) -> &DimensionSource {
        &self.dimension_source
    }

    /// Human-readable origin of the current dimensions
    pub fn dimension_info(&self) -> String {
        match &self.dimension_source {
            DimensionSource::Unset => "not set".to_string(),
            DimensionSource::Explicit => format!("{} (specified explicitly)", self.dimensions),
            DimensionSource::Induced(link) => format!("{} (inferred from {})", self.dimensions, link),
        }
    }

    pub(crate) fn set_dimensions(&mut self, dimensions: Dimensions, source: DimensionSource) -> EngineResult<()> {
        if self.spec.single_node_only && dimensions.is_specified() && dimensions.count() != 1 {
            return Err(EngineError::IncompatibleDimensions(format!(
                "region '{}' of type '{}' only supports a single node, got {}",
                self.name, self.type_name, dimensions
            )));
        }
        self.dimensions = dimensions;
        self.dimension_source = source;
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.dimensions.count()
    }

    pub fn phases(&self) -> &BTreeSet<u32> {
        &self.phases
    }

    pub(crate) fn set_phases(&mut self, phases: BTreeSet<u32>) {
        self.phases = phases;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn get_input(&self, name: &str) -> EngineResult<&Input> {
        self.inputs
            .get(name)
            .map_err(|_| EngineError::NotFound(format!("input '{}' on region '{}'", name, self.name)))
    }

    pub fn get_output(&self, name: &str) -> EngineResult<&Output> {
        self.outputs
            .get(name)
            .map_err(|_| EngineError::NotFound(format!("output '{}' on region '{}'", name, self.name)))
    }

    pub(crate) fn get_input_mut(&mut self, name: &str) -> EngineResult<&mut Input> {
        let region = &self.name;
        self.inputs
            .get_mut(name)
            .map_err(|_| EngineError::NotFound(format!("input '{}' on region '{}'", name, region)))
    }

    pub(crate) fn get_output_mut(&mut self, name: &str) -> EngineResult<&mut Output> {
        let region = &self.name;
        self.outputs
            .get_mut(name)
            .map_err(|_| EngineError::NotFound(format!("output '{}' on region '{}'", name, region)))
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.values()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.names().map(str::to_string).collect()
    }

    pub fn has_outgoing_links(&self) -> bool {
        self.outputs.values().any(Output::has_outgoing_links)
    }

    pub fn outgoing_link_count(&self) -> usize {
        self.outputs.values().map(|o| o.links().len()).sum()
    }

    /// Elements per node of `output`, from the spec or the implementation
    pub fn output_element_count_per_node(&self, output: &str) -> EngineResult<usize> {
        let declared = self
            .spec
            .outputs
            .get(output)
            .map_err(|_| EngineError::NotFound(format!("output '{}' on region '{}'", output, self.name)))?
            .count;
        if declared > 0 {
            return Ok(declared);
        }
        let count = self.implementation.node_output_element_count(output)?;
        if count == 0 {
            return Err(EngineError::InvalidState(format!(
                "region '{}' reports zero elements per node for output '{}'",
                self.name, output
            )));
        }
        Ok(count)
    }

    /// Allocate every output for the current node count
    pub(crate) fn initialize_outputs(&mut self) -> EngineResult<()> {
        if !self.dimensions.is_specified() {
            return Err(EngineError::DimensionsUnresolvable(format!(
                "region '{}' has no dimensions",
                self.name
            )));
        }
        let nodes = self.dimensions.checked_count()?;
        let names: Vec<String> = self.outputs.names().map(str::to_string).collect();
        for name in names {
            let per_node = self.output_element_count_per_node(&name)?;
            let output = self.get_output_mut(&name)?;
            let count = if output.is_region_level() {
                per_node
            } else {
                per_node.checked_mul(nodes).ok_or(TypesError::TooLarge {
                    count: nodes,
                    element_size: per_node,
                })?
            };
            output.initialize(count)?;
        }
        Ok(())
    }

    fn io(&mut self) -> (&mut Box<dyn RegionImpl>, RegionIo<'_>) {
        let Region {
            name,
            implementation,
            inputs,
            outputs,
            dimensions,
            ..
        } = self;
        (
            implementation,
            RegionIo {
                region_name: name,
                dimensions,
                inputs,
                outputs,
            },
        )
    }

    /// Hand the laid-out region to its implementation
    pub fn init(&mut self) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }
        let (implementation, mut io) = self.io();
        implementation.initialize(&mut io)?;
        self.initialized = true;
        debug!(target: "nupic-engine", "region '{}' initialized with {} nodes", self.name, self.node_count());
        Ok(())
    }

    pub(crate) fn compute(&mut self) -> EngineResult<()> {
        if !self.initialized {
            return Err(EngineError::InvalidState(format!(
                "region '{}' computed before init",
                self.name
            )));
        }
        let started = self.profiling.then(Instant::now);
        let (implementation, mut io) = self.io();
        implementation.compute(&mut io)?;
        if let Some(started) = started {
            self.compute_timer.record(started.elapsed());
        }
        trace!(target: "nupic-engine", "region '{}' computed", self.name);
        Ok(())
    }

    /// Release buffers; the region can be initialized again afterwards
    pub(crate) fn uninitialize(&mut self) {
        for (_, input) in self.inputs.iter_mut() {
            input.uninitialize();
        }
        for (_, output) in self.outputs.iter_mut() {
            output.uninitialize();
        }
        self.initialized = false;
    }

    pub fn serialize(&self, bundle: &mut BundleIo) -> EngineResult<()> {
        self.implementation.serialize(bundle)
    }

    pub fn get_parameter(&self, name: &str) -> EngineResult<ParameterValue> {
        self.spec.parameters.get(name).map_err(|_| {
            EngineError::InvalidParameter(format!("unknown parameter '{}' on region '{}'", name, self.name))
        })?;
        self.implementation.get_parameter(name)
    }

    /// Array parameter as a read-only view
    pub fn get_parameter_array(&self, name: &str) -> EngineResult<ArrayRef> {
        match self.get_parameter(name)? {
            ParameterValue::Array(buffer) => Ok(ArrayRef::from_buffer(&buffer)),
            _ => Err(EngineError::InvalidParameter(format!(
                "parameter '{}' on region '{}' is not an array",
                name, self.name
            ))),
        }
    }

    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> EngineResult<()> {
        let parameter = self.spec.parameters.get(name).map_err(|_| {
            EngineError::InvalidParameter(format!("unknown parameter '{}' on region '{}'", name, self.name))
        })?;
        if parameter.access != ParameterAccess::ReadWrite {
            return Err(EngineError::InvalidParameter(format!(
                "parameter '{}' on region '{}' is not writable",
                name, self.name
            )));
        }
        if !value.matches(parameter) {
            return Err(EngineError::InvalidParameter(format!(
                "parameter '{}' on region '{}' expects {}, got {}",
                name,
                self.name,
                parameter.data_type,
                value.basic_type()
            )));
        }
        self.implementation.set_parameter(name, value)
    }

    /// Run a command declared in the spec; `args[0]` is the command name
    pub fn execute_command(&mut self, args: &[&str]) -> EngineResult<String> {
        let command = args
            .first()
            .ok_or_else(|| EngineError::InvalidParameter("empty command".to_string()))?;
        if !self.spec.commands.contains(command) {
            return Err(EngineError::InvalidParameter(format!(
                "region '{}' has no command '{}'",
                self.name, command
            )));
        }
        let started = self.profiling.then(Instant::now);
        let result = self.implementation.execute_command(args);
        if let Some(started) = started {
            self.execute_timer.record(started.elapsed());
        }
        result
    }

    pub fn enable_profiling(&mut self) {
        self.profiling = true;
    }

    pub fn disable_profiling(&mut self) {
        self.profiling = false;
    }

    pub fn reset_profiling(&mut self) {
        self.compute_timer.reset();
        self.execute_timer.reset();
    }

    pub fn compute_timer(&self) -> &ProfileTimer {
        &self.compute_timer
    }

    pub fn execute_timer(&self) -> &ProfileTimer {
        &self.execute_timer
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("dimensions", &self.dimensions)
            .field("phases", &self.phases)
            .field("initialized", &self.initialized)
            .finish()
    }
}
