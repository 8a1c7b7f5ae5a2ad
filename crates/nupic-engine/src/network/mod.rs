// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The computation graph.
//!
//! A [`Network`] owns its regions (by name, insertion ordered) and its links
//! (an arena keyed by [`LinkId`]). It negotiates dimensions across links,
//! lays out buffers, runs regions phase by phase in producer-before-consumer
//! order, and saves/loads the whole graph as a bundle directory.
//!
//! ```text
//! Unconfigured --propagate_dimensions()--> DimensionsPropagated
//!      ^                                         |
//!      | any topology change             initialize()
//!      |                                         v
//!      +---------------------------------- Initialized --run()--> Ready
//!                                               |                   |
//!                                               +------save()-------+--> Serialized
//! ```

pub mod checkpoint;

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nupic_types::{Collection, Dimensions, TypedBuffer, TypesError};
use tracing::{debug, info, trace, warn};

use crate::bundle_io::{BundleIo, BundleMode};
use crate::link::{Link, LinkEndpoints, LinkId};
use crate::region::{DimensionSource, Region};
use crate::region_impl::RegionContext;
use crate::runtime::{NetworkId, NupicRuntime};
use crate::{EngineError, EngineResult};

pub use checkpoint::{LinkDescription, NetworkDescription, RegionDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unconfigured,
    DimensionsPropagated,
    Initialized,
    Ready,
    Serialized,
}

/// Invoked after every iteration with the network and the iteration number
pub type RunCallback = Box<dyn FnMut(&Network, u64) + Send>;

pub struct Network {
    id: NetworkId,
    runtime: Arc<NupicRuntime>,
    regions: Collection<Region>,
    links: BTreeMap<LinkId, Link>,
    next_link_id: u64,
    state: NetworkState,
    /// Region names, producers before consumers; valid once propagated
    topological_order: Vec<String>,
    min_enabled_phase: Option<u32>,
    max_enabled_phase: Option<u32>,
    callbacks: Collection<RunCallback>,
    iteration: u64,
}

impl Network {
    /// Empty network registered with `runtime`; fails before `runtime.init()`
    pub fn new(runtime: &Arc<NupicRuntime>) -> EngineResult<Self> {
        let id = runtime.register_network()?;
        info!(target: "nupic-engine", "created {}", id);
        Ok(Self {
            id,
            runtime: Arc::clone(runtime),
            regions: Collection::new(),
            links: BTreeMap::new(),
            next_link_id: 0,
            state: NetworkState::Unconfigured,
            topological_order: Vec::new(),
            min_enabled_phase: None,
            max_enabled_phase: None,
            callbacks: Collection::new(),
            iteration: 0,
        })
    }

    /// Fresh network restored from a saved bundle
    pub fn from_bundle(runtime: &Arc<NupicRuntime>, path: &Path) -> EngineResult<Self> {
        let mut network = Self::new(runtime)?;
        network.load(path)?;
        Ok(network)
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Completed iterations
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn runtime(&self) -> &Arc<NupicRuntime> {
        &self.runtime
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn region_count(&self) -> usize {
        self.regions.count()
    }

    pub fn get_region(&self, name: &str) -> EngineResult<&Region> {
        self.regions
            .get(name)
            .map_err(|_| EngineError::NotFound(format!("region '{}'", name)))
    }

    pub fn get_region_mut(&mut self, name: &str) -> EngineResult<&mut Region> {
        self.regions
            .get_mut(name)
            .map_err(|_| EngineError::NotFound(format!("region '{}'", name)))
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn get_link(&self, id: LinkId) -> EngineResult<&Link> {
        self.links
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    // ===== Topology =====

    pub fn add_region(&mut self, name: &str, type_name: &str, params: &str) -> EngineResult<&mut Region> {
        validate_region_name(name)?;
        if self.regions.contains(name) {
            return Err(EngineError::DuplicateName(format!("region '{}'", name)));
        }
        let created = self.runtime.factory().create(
            type_name,
            params,
            &RegionContext {
                region_name: name,
                type_name,
            },
        )?;
        let mut region = Region::new(name, type_name, created)?;
        region.set_phases(BTreeSet::from([0]));
        self.regions.add(name, region)?;
        self.reset_topology()?;
        info!(target: "nupic-engine", "added {} region '{}'", type_name, name);
        self.get_region_mut(name)
    }

    /// Add a region whose state is restored from the streams region
    /// `name` left in the bundle at `bundle_path` under `label`
    pub fn add_region_from_bundle(
        &mut self,
        name: &str,
        type_name: &str,
        dimensions: Dimensions,
        bundle_path: &Path,
        label: &str,
    ) -> EngineResult<&mut Region> {
        validate_region_name(name)?;
        if self.regions.contains(name) {
            return Err(EngineError::DuplicateName(format!("region '{}'", name)));
        }
        dimensions.validate()?;
        if !bundle_path.is_dir() {
            return Err(EngineError::BadCheckpoint(format!(
                "{} is not a bundle directory",
                bundle_path.display()
            )));
        }
        let mut bundle = BundleIo::new(bundle_path, label, name, BundleMode::Read);
        let created = self.runtime.factory().deserialize(
            type_name,
            &mut bundle,
            &RegionContext {
                region_name: name,
                type_name,
            },
        )?;
        let mut region = Region::new(name, type_name, created)?;
        region.set_dimensions(dimensions, DimensionSource::Explicit)?;
        region.set_phases(BTreeSet::from([0]));
        self.regions.add(name, region)?;
        self.reset_topology()?;
        info!(
            target: "nupic-engine",
            "added {} region '{}' from {}",
            type_name,
            name,
            bundle_path.display()
        );
        self.get_region_mut(name)
    }

    /// Remove a region and every link into it
    ///
    /// Fails with `RegionHasOutgoingLinks` while any of its outputs still
    /// feeds a link.
    pub fn remove_region(&mut self, name: &str) -> EngineResult<()> {
        let region = self.get_region(name)?;
        if region.has_outgoing_links() {
            return Err(EngineError::RegionHasOutgoingLinks {
                region: name.to_string(),
                links: region.outgoing_link_count(),
            });
        }

        let incoming: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.dest_region() == name)
            .map(Link::id)
            .collect();
        for id in incoming {
            self.detach_link(id)?;
        }
        self.regions.remove(name)?;
        self.reset_topology()?;
        info!(target: "nupic-engine", "removed region '{}'", name);
        Ok(())
    }

    /// Connect `src_region.src_output` to `dest_region.dest_input`
    ///
    /// Empty endpoint names select the region type's default output/input.
    pub fn link(
        &mut self,
        src_region: &str,
        src_output: &str,
        dest_region: &str,
        dest_input: &str,
        policy_type: &str,
        policy_params: &str,
    ) -> EngineResult<LinkId> {
        let unknown = |what: &str| EngineError::UnknownEndpoint(what.to_string());

        let src = self
            .regions
            .get(src_region)
            .map_err(|_| unknown(&format!("source region '{}'", src_region)))?;
        let src_output = if src_output.is_empty() {
            src.spec().default_output_name()?.to_string()
        } else {
            src_output.to_string()
        };
        let output = src
            .get_output(&src_output)
            .map_err(|_| unknown(&format!("output '{}' on region '{}'", src_output, src_region)))?;

        let dest = self
            .regions
            .get(dest_region)
            .map_err(|_| unknown(&format!("destination region '{}'", dest_region)))?;
        let dest_input = if dest_input.is_empty() {
            dest.spec().default_input_name()?.to_string()
        } else {
            dest_input.to_string()
        };
        let input = dest
            .get_input(&dest_input)
            .map_err(|_| unknown(&format!("input '{}' on region '{}'", dest_input, dest_region)))?;

        if output.element_type() != input.element_type() {
            return Err(TypesError::TypeMismatch {
                expected: input.element_type(),
                actual: output.element_type(),
            }
            .into());
        }

        let endpoints = LinkEndpoints {
            src_region: src_region.to_string(),
            src_output,
            dest_region: dest_region.to_string(),
            dest_input,
        };
        if self.links.values().any(|l| l.connects(&endpoints)) {
            return Err(EngineError::DuplicateName(format!(
                "link {}.{} -> {}.{}",
                endpoints.src_region, endpoints.src_output, endpoints.dest_region, endpoints.dest_input
            )));
        }

        let constructor = self.runtime.link_policies().constructor(policy_type)?;
        let id = LinkId(self.next_link_id);
        let link = Link::new(id, policy_type, policy_params, constructor, endpoints)?;
        self.next_link_id += 1;

        self.regions
            .get_mut(link.src_region())?
            .get_output_mut(link.src_output())?
            .add_link(id);
        self.regions
            .get_mut(link.dest_region())?
            .get_input_mut(link.dest_input())?
            .add_link(id);
        info!(target: "nupic-engine", "linked {}", link);
        self.links.insert(id, link);
        self.reset_topology()?;
        Ok(id)
    }

    /// Fails with `NotFound` if no such link exists
    ///
    /// Empty endpoint names select the default output/input as in [`Network::link`].
    pub fn remove_link(
        &mut self,
        src_region: &str,
        src_output: &str,
        dest_region: &str,
        dest_input: &str,
    ) -> EngineResult<()> {
        let src_output = if src_output.is_empty() {
            self.get_region(src_region)?.spec().default_output_name()?.to_string()
        } else {
            src_output.to_string()
        };
        let dest_input = if dest_input.is_empty() {
            self.get_region(dest_region)?.spec().default_input_name()?.to_string()
        } else {
            dest_input.to_string()
        };
        let endpoints = LinkEndpoints {
            src_region: src_region.to_string(),
            src_output,
            dest_region: dest_region.to_string(),
            dest_input,
        };
        let id = self
            .links
            .values()
            .find(|l| l.connects(&endpoints))
            .map(Link::id)
            .ok_or_else(|| Link::missing(&endpoints))?;
        self.detach_link(id)?;
        self.reset_topology()?;
        info!(
            target: "nupic-engine",
            "removed link {}.{} -> {}.{}",
            endpoints.src_region, endpoints.src_output, endpoints.dest_region, endpoints.dest_input
        );
        Ok(())
    }

    fn detach_link(&mut self, id: LinkId) -> EngineResult<()> {
        let link = self
            .links
            .remove(&id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if let Ok(region) = self.regions.get_mut(link.src_region()) {
            region.get_output_mut(link.src_output())?.remove_link(id);
        }
        if let Ok(region) = self.regions.get_mut(link.dest_region()) {
            region.get_input_mut(link.dest_input())?.remove_link(id);
        }
        Ok(())
    }

    pub fn set_region_dimensions(&mut self, name: &str, dimensions: Dimensions) -> EngineResult<()> {
        dimensions.validate()?;
        self.get_region_mut(name)?
            .set_dimensions(dimensions, DimensionSource::Explicit)?;
        self.reset_topology()
    }

    /// Back to `Unconfigured`: buffers released, induced dimensions and
    /// link routing forgotten
    fn reset_topology(&mut self) -> EngineResult<()> {
        for (_, region) in self.regions.iter_mut() {
            region.uninitialize();
            if matches!(region.dimension_source(), DimensionSource::Induced(_)) {
                region.set_dimensions(Dimensions::unspecified(), DimensionSource::Unset)?;
            }
        }
        for link in self.links.values_mut() {
            link.reset()?;
        }
        self.topological_order.clear();
        if self.state != NetworkState::Unconfigured {
            debug!(target: "nupic-engine", "{} topology changed, back to Unconfigured", self.id);
        }
        self.state = NetworkState::Unconfigured;
        Ok(())
    }

    // ===== Phases =====

    /// Replace the phases `name` runs in
    ///
    /// The highest new phase may exceed the next unused phase by at most
    /// `network.max_phase_jump`.
    pub fn set_phases(&mut self, name: &str, phases: BTreeSet<u32>) -> EngineResult<()> {
        let Some(&highest) = phases.iter().next_back() else {
            return Err(EngineError::InvalidParameter(format!(
                "empty phase set for region '{}'",
                name
            )));
        };
        let next_phase = self.max_phase().map_or(0, |p| p + 1);
        let jump = self.runtime.config().network.max_phase_jump;
        if highest > next_phase && highest - next_phase > jump {
            return Err(EngineError::InvalidParameter(format!(
                "phase {} for region '{}' is more than {} past the next phase {}",
                highest, name, jump, next_phase
            )));
        }
        self.get_region_mut(name)?.set_phases(phases);
        Ok(())
    }

    pub fn get_phases(&self, name: &str) -> EngineResult<&BTreeSet<u32>> {
        Ok(self.get_region(name)?.phases())
    }

    pub fn min_phase(&self) -> Option<u32> {
        self.regions.values().filter_map(|r| r.phases().first().copied()).min()
    }

    pub fn max_phase(&self) -> Option<u32> {
        self.regions.values().filter_map(|r| r.phases().last().copied()).max()
    }

    pub fn set_min_enabled_phase(&mut self, phase: u32) {
        self.min_enabled_phase = Some(phase);
    }

    pub fn set_max_enabled_phase(&mut self, phase: u32) {
        self.max_enabled_phase = Some(phase);
    }

    /// Inclusive range of phases `run` executes
    pub fn enabled_phases(&self) -> (u32, u32) {
        (
            self.min_enabled_phase.or(self.min_phase()).unwrap_or(0),
            self.max_enabled_phase.or(self.max_phase()).unwrap_or(0),
        )
    }

    // ===== Callbacks =====

    pub fn add_callback<F>(&mut self, name: &str, callback: F) -> EngineResult<()>
    where
        F: FnMut(&Network, u64) + Send + 'static,
    {
        self.callbacks.add(name, Box::new(callback))?;
        Ok(())
    }

    pub fn remove_callback(&mut self, name: &str) -> EngineResult<()> {
        self.callbacks.remove(name)?;
        Ok(())
    }

    // ===== Lifecycle =====

    /// Order regions and negotiate every link's dimensions
    ///
    /// Fails with `DimensionsUnresolvable` on a cycle or when some region
    /// ends up without dimensions.
    pub fn propagate_dimensions(&mut self) -> EngineResult<()> {
        self.reset_topology()?;
        self.topological_order = self.sort_regions()?;

        // Induce unknown region dimensions until nothing changes
        let mut changed = true;
        while changed {
            changed = false;
            for link in self.links.values_mut() {
                let src = self.regions.get(link.src_region())?;
                let dest = self.regions.get(link.dest_region())?;
                let src_dims = source_dimensions(src, link.src_output())?;
                let dest_dims = destination_dimensions(dest, link.dest_input())?;
                if src_dims.is_specified() == dest_dims.is_specified() {
                    continue;
                }

                link.reset()?;
                let policy = link.policy_mut();
                if src_dims.is_specified() {
                    policy.set_src_dimensions(&src_dims)?;
                    let induced = policy.dest_dimensions().clone();
                    if induced.is_specified() {
                        let description = link.to_string();
                        let region = self.regions.get_mut(link.dest_region())?;
                        trace!(target: "nupic-engine", "region '{}' dimensions {} from {}", region.name(), induced, description);
                        region.set_dimensions(induced, DimensionSource::Induced(description))?;
                        changed = true;
                    }
                } else {
                    policy.set_dest_dimensions(&dest_dims)?;
                    let induced = policy.src_dimensions().clone();
                    if induced.is_specified() {
                        let description = link.to_string();
                        let region = self.regions.get_mut(link.src_region())?;
                        trace!(target: "nupic-engine", "region '{}' dimensions {} from {}", region.name(), induced, description);
                        region.set_dimensions(induced, DimensionSource::Induced(description))?;
                        changed = true;
                    }
                }
            }
        }

        let unresolved: Vec<&str> = self
            .regions
            .values()
            .filter(|r| !r.dimensions().is_specified())
            .map(Region::name)
            .collect();
        if !unresolved.is_empty() {
            return Err(EngineError::DimensionsUnresolvable(format!(
                "no dimensions for region(s) {}",
                unresolved.join(", ")
            )));
        }

        for link in self.links.values_mut() {
            let src = self.regions.get(link.src_region())?;
            let dest = self.regions.get(link.dest_region())?;
            let element_count = src.output_element_count_per_node(link.src_output())?;
            let src_dims = source_dimensions(src, link.src_output())?;
            let dest_dims = destination_dimensions(dest, link.dest_input())?;

            link.reset()?;
            let policy = link.policy_mut();
            policy.set_node_output_element_count(element_count);
            policy.set_src_dimensions(&src_dims)?;
            policy.set_dest_dimensions(&dest_dims)?;
            link.initialize()?;
            trace!(target: "nupic-engine", "link {} routed {} -> {}", link, src_dims, dest_dims);
        }

        self.state = NetworkState::DimensionsPropagated;
        info!(
            target: "nupic-engine",
            "{} dimensions propagated over {} regions and {} links",
            self.id,
            self.regions.count(),
            self.links.len()
        );
        Ok(())
    }

    /// Kahn's algorithm; ties broken by region insertion order
    fn sort_regions(&self) -> EngineResult<Vec<String>> {
        let names: Vec<&str> = self.regions.names().collect();
        let mut in_degree: BTreeMap<&str, usize> = names.iter().map(|n| (*n, 0)).collect();
        for link in self.links.values() {
            if let Some(degree) = in_degree.get_mut(link.dest_region()) {
                *degree += 1;
            }
        }

        let mut order: Vec<String> = Vec::with_capacity(names.len());
        let mut placed = BTreeSet::new();
        while order.len() < names.len() {
            let Some(next) = names
                .iter()
                .copied()
                .find(|n| !placed.contains(n) && in_degree.get(n) == Some(&0))
            else {
                let remaining: Vec<&str> = names.iter().copied().filter(|n| !placed.contains(n)).collect();
                return Err(EngineError::DimensionsUnresolvable(format!(
                    "cycle among region(s) {}",
                    remaining.join(", ")
                )));
            };
            placed.insert(next);
            order.push(next.to_string());
            for link in self.links.values().filter(|l| l.src_region() == next) {
                if let Some(degree) = in_degree.get_mut(link.dest_region()) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }
        Ok(order)
    }

    /// Lay out every buffer and initialize regions, producers first
    ///
    /// Propagates dimensions first if needed; a no-op once initialized.
    pub fn initialize(&mut self) -> EngineResult<()> {
        match self.state {
            NetworkState::Unconfigured => self.propagate_dimensions()?,
            NetworkState::DimensionsPropagated => {}
            NetworkState::Initialized | NetworkState::Ready | NetworkState::Serialized => return Ok(()),
        }

        for region in self.regions.values() {
            for input in region.inputs() {
                if input.is_required() && !input.has_links() {
                    return Err(EngineError::InvalidState(format!(
                        "required input '{}' on region '{}' has no links",
                        input.name(),
                        region.name()
                    )));
                }
            }
        }

        for name in &self.topological_order {
            self.regions.get_mut(name)?.initialize_outputs()?;
        }

        for name in &self.topological_order {
            let region = self.regions.get(name)?;
            let node_count = region.node_count();
            let mut layouts = Vec::new();
            for input in region.inputs() {
                let mut source_counts = Vec::with_capacity(input.links().len());
                for id in input.links() {
                    let link = self.get_link(*id)?;
                    let source = self.get_region(link.src_region())?.get_output(link.src_output())?;
                    source_counts.push(source.data().count());
                }
                layouts.push((input.name().to_string(), source_counts));
            }

            let region = self.regions.get_mut(name)?;
            for (input_name, source_counts) in layouts {
                region
                    .get_input_mut(&input_name)?
                    .initialize(&mut self.links, &source_counts, node_count)?;
            }
        }

        for name in &self.topological_order {
            self.regions.get_mut(name)?.init()?;
        }

        self.state = NetworkState::Initialized;
        info!(target: "nupic-engine", "{} initialized", self.id);
        Ok(())
    }

    /// Run `iterations` full passes over the enabled phases
    ///
    /// Stops at the first failing region with `RunFailed`.
    pub fn run(&mut self, iterations: u64) -> EngineResult<()> {
        if matches!(
            self.state,
            NetworkState::Unconfigured | NetworkState::DimensionsPropagated
        ) {
            self.initialize()?;
        }

        let (lo, hi) = self.enabled_phases();
        let order = self.topological_order.clone();
        for _ in 0..iterations {
            self.iteration += 1;
            for phase in lo..=hi {
                for name in &order {
                    if !self.get_region(name)?.phases().contains(&phase) {
                        continue;
                    }
                    let iteration = self.iteration;
                    self.step_region(name).map_err(|e| EngineError::RunFailed {
                        region: name.clone(),
                        iteration,
                        source: Box::new(e),
                    })?;
                }
            }
            self.state = NetworkState::Ready;
            trace!(target: "nupic-engine", "{} finished iteration {}", self.id, self.iteration);

            let mut callbacks = std::mem::take(&mut self.callbacks);
            for (_, callback) in callbacks.iter_mut() {
                callback(self, self.iteration);
            }
            self.callbacks = callbacks;
        }
        Ok(())
    }

    /// Consolidate every input of `name`, then compute it
    fn step_region(&mut self, name: &str) -> EngineResult<()> {
        let region = self.regions.get(name)?;
        let mut consolidated: Vec<(String, TypedBuffer)> = Vec::new();
        for input in region.inputs() {
            consolidated.push((
                input.name().to_string(),
                input.consolidate(&self.links, &self.regions)?,
            ));
        }

        let region = self.regions.get_mut(name)?;
        for (input_name, data) in consolidated {
            region.get_input_mut(&input_name)?.set_data(data)?;
        }
        region.compute()
    }

    // ===== Checkpoints =====

    pub fn save(&mut self, path: &Path) -> EngineResult<()> {
        let label = self.runtime.config().network.default_checkpoint_label.clone();
        self.save_with_label(path, &label)
    }

    /// Write the structure file and every region's streams into `path`
    ///
    /// `path` must carry the configured bundle extension. An existing
    /// path is replaced only if it already holds a saved network, and only
    /// once the new bundle has been written completely next to it.
    pub fn save_with_label(&mut self, path: &Path, label: &str) -> EngineResult<()> {
        let extension = &self.runtime.config().network.bundle_extension;
        if !path.to_string_lossy().ends_with(extension.as_str()) {
            return Err(EngineError::InvalidParameter(format!(
                "bundle path {} must end with '{}'",
                path.display(),
                extension
            )));
        }
        if label.is_empty() || label.contains(['/', '\\']) {
            return Err(EngineError::InvalidParameter(format!("bad checkpoint label '{}'", label)));
        }
        if path.exists() && !NetworkDescription::is_bundle(path) {
            return Err(EngineError::BadCheckpoint(format!(
                "refusing to overwrite {}: not a saved network",
                path.display()
            )));
        }

        let staging = sibling_path(path, "tmp");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        if let Err(e) = self.write_bundle(&staging, label) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(target: "nupic-engine", "could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }
        replace_bundle(&staging, path)?;

        if matches!(self.state, NetworkState::Initialized | NetworkState::Ready) {
            self.state = NetworkState::Serialized;
        }
        info!(target: "nupic-engine", "{} saved to {}", self.id, path.display());
        Ok(())
    }

    /// Region streams first, structure file last
    fn write_bundle(&self, dir: &Path, label: &str) -> EngineResult<()> {
        for region in self.regions.values() {
            let mut bundle = BundleIo::new(dir, label, region.name(), BundleMode::Write);
            region.serialize(&mut bundle)?;
        }

        let description = NetworkDescription {
            version: checkpoint::FORMAT_VERSION,
            label: label.to_string(),
            regions: self
                .regions
                .values()
                .map(|r| RegionDescription {
                    name: r.name().to_string(),
                    node_type: r.type_name().to_string(),
                    dimensions: r.dimensions().clone(),
                    phases: r.phases().clone(),
                })
                .collect(),
            links: self
                .links
                .values()
                .map(|l| LinkDescription {
                    policy_type: l.policy_type().to_string(),
                    params: l.policy_params().to_string(),
                    src_region: l.src_region().to_string(),
                    src_output: l.src_output().to_string(),
                    dest_region: l.dest_region().to_string(),
                    dest_input: l.dest_input().to_string(),
                })
                .collect(),
        };
        description.write(dir)
    }

    /// Rebuild regions and links from a bundle; the network must be empty
    pub fn load(&mut self, path: &Path) -> EngineResult<()> {
        if !self.regions.is_empty() || !self.links.is_empty() {
            return Err(EngineError::InvalidState(format!(
                "{} must be empty to load {}",
                self.id,
                path.display()
            )));
        }
        if let Err(e) = self.load_description(path) {
            self.links.clear();
            self.regions = Collection::new();
            self.reset_topology()?;
            return Err(e);
        }
        info!(target: "nupic-engine", "{} loaded from {}", self.id, path.display());
        Ok(())
    }

    fn load_description(&mut self, path: &Path) -> EngineResult<()> {
        let description = NetworkDescription::read(path)?;

        for saved in &description.regions {
            validate_region_name(&saved.name)?;
            if self.regions.contains(&saved.name) {
                return Err(EngineError::BadCheckpoint(format!(
                    "region '{}' appears more than once",
                    saved.name
                )));
            }
            let mut bundle = BundleIo::new(path, &description.label, &saved.name, BundleMode::Read);
            let created = self.runtime.factory().deserialize(
                &saved.node_type,
                &mut bundle,
                &RegionContext {
                    region_name: &saved.name,
                    type_name: &saved.node_type,
                },
            )?;
            let mut region = Region::new(&saved.name, &saved.node_type, created)?;
            if saved.dimensions.is_specified() {
                region.set_dimensions(saved.dimensions.clone(), DimensionSource::Explicit)?;
            }
            let phases = if saved.phases.is_empty() {
                BTreeSet::from([0])
            } else {
                saved.phases.clone()
            };
            region.set_phases(phases);
            self.regions.add(&saved.name, region)?;
        }

        for saved in &description.links {
            self.link(
                &saved.src_region,
                &saved.src_output,
                &saved.dest_region,
                &saved.dest_input,
                &saved.policy_type,
                &saved.params,
            )?;
        }
        self.reset_topology()
    }

    // ===== Profiling =====

    pub fn enable_profiling(&mut self) {
        for (_, region) in self.regions.iter_mut() {
            region.enable_profiling();
        }
    }

    pub fn disable_profiling(&mut self) {
        for (_, region) in self.regions.iter_mut() {
            region.disable_profiling();
        }
    }

    pub fn reset_profiling(&mut self) {
        for (_, region) in self.regions.iter_mut() {
            region.reset_profiling();
        }
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        for (_, region) in self.regions.iter_mut() {
            region.uninitialize();
        }
        self.links.clear();
        self.regions = Collection::new();
        self.runtime.unregister_network(self.id);
        debug!(target: "nupic-engine", "dropped {}", self.id);
    }
}

static SAVE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique scratch directory next to `path`
fn sibling_path(path: &Path, tag: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(
        ".{}-{}-{}",
        tag,
        std::process::id(),
        SAVE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

/// Move a fully written bundle over `path`, keeping the old one until the
/// new one is in place
fn replace_bundle(staging: &Path, path: &Path) -> EngineResult<()> {
    if !path.exists() {
        return fs::rename(staging, path).map_err(|e| {
            let _ = fs::remove_dir_all(staging);
            EngineError::from(e)
        });
    }
    let previous = sibling_path(path, "old");
    if let Err(e) = fs::rename(path, &previous) {
        let _ = fs::remove_dir_all(staging);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(staging, path) {
        // put the old bundle back
        fs::rename(&previous, path)?;
        let _ = fs::remove_dir_all(staging);
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(&previous) {
        warn!(target: "nupic-engine", "could not remove {}: {}", previous.display(), e);
    }
    Ok(())
}

fn validate_region_name(name: &str) -> EngineResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(EngineError::InvalidName(format!("region name '{}'", name)));
    }
    Ok(())
}

/// Dimensions a link sees on its source side
fn source_dimensions(region: &Region, output: &str) -> EngineResult<Dimensions> {
    if region.get_output(output)?.is_region_level() {
        Ok(Dimensions::ones(1))
    } else {
        Ok(region.dimensions().clone())
    }
}

/// Dimensions a link sees on its destination side
fn destination_dimensions(region: &Region, input: &str) -> EngineResult<Dimensions> {
    if region.get_input(input)?.is_region_level() {
        Ok(Dimensions::ones(1))
    } else {
        Ok(region.dimensions().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nupic_config::EngineConfig;

    use crate::runtime::StdPlatform;

    fn runtime() -> Arc<NupicRuntime> {
        let runtime = Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform)));
        runtime.init().unwrap();
        runtime
    }

    #[test]
    fn test_new_requires_init() {
        let runtime = Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform)));
        assert!(matches!(Network::new(&runtime), Err(EngineError::NotInitialized)));
    }

    #[test]
    fn test_region_names() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        assert!(matches!(
            net.add_region("A", "TestNode", ""),
            Err(EngineError::DuplicateName(_))
        ));
        assert!(matches!(
            net.add_region("a/b", "TestNode", ""),
            Err(EngineError::InvalidName(_))
        ));
        assert!(matches!(
            net.add_region("B", "Nope", ""),
            Err(EngineError::UnknownRegionType(_))
        ));
        assert_eq!(net.region_count(), 1);
        assert_eq!(net.get_phases("A").unwrap(), &BTreeSet::from([0]));
    }

    #[test]
    fn test_link_endpoint_errors() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        net.add_region("B", "TestNode", "").unwrap();

        assert!(matches!(
            net.link("A", "", "Z", "", "UniformLink", ""),
            Err(EngineError::UnknownEndpoint(_))
        ));
        assert!(matches!(
            net.link("A", "nope", "B", "", "UniformLink", ""),
            Err(EngineError::UnknownEndpoint(_))
        ));
        assert!(matches!(
            net.link("A", "", "B", "", "Spiral", ""),
            Err(EngineError::InvalidLinkPolicy(_))
        ));

        net.link("A", "", "B", "", "UniformLink", "").unwrap();
        assert!(matches!(
            net.link("A", "bottomUpOut", "B", "bottomUpIn", "UniformLink", ""),
            Err(EngineError::DuplicateName(_))
        ));
        assert!(matches!(
            net.remove_link("A", "bottomUpOut", "B", "other"),
            Err(EngineError::NotFound(_))
        ));
        net.remove_link("A", "bottomUpOut", "B", "bottomUpIn").unwrap();
        assert_eq!(net.link_count(), 0);
    }

    #[test]
    fn test_cycle_is_unresolvable() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        net.add_region("B", "TestNode", "").unwrap();
        net.set_region_dimensions("A", Dimensions::new(vec![2])).unwrap();
        net.link("A", "", "B", "", "UniformLink", "").unwrap();
        net.link("B", "", "A", "", "UniformLink", "").unwrap();
        assert!(matches!(
            net.propagate_dimensions(),
            Err(EngineError::DimensionsUnresolvable(_))
        ));
    }

    #[test]
    fn test_unanchored_region_is_unresolvable() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        net.add_region("B", "TestNode", "").unwrap();
        net.link("A", "", "B", "", "UniformLink", "").unwrap();
        assert!(matches!(
            net.propagate_dimensions(),
            Err(EngineError::DimensionsUnresolvable(_))
        ));
    }

    #[test]
    fn test_dimensions_induced_backwards() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        net.add_region("B", "TestNode", "").unwrap();
        net.set_region_dimensions("B", Dimensions::new(vec![2, 2])).unwrap();
        net.link("A", "", "B", "", "TestFanIn2", "").unwrap();
        net.propagate_dimensions().unwrap();

        let a = net.get_region("A").unwrap();
        assert_eq!(a.dimensions(), &Dimensions::new(vec![4, 4]));
        assert!(matches!(a.dimension_source(), DimensionSource::Induced(_)));
        assert_eq!(net.state(), NetworkState::DimensionsPropagated);

        // a topology change forgets induced dimensions
        net.add_region("C", "TestNode", "").unwrap();
        assert_eq!(net.state(), NetworkState::Unconfigured);
        assert!(net.get_region("A").unwrap().dimensions().is_unspecified());
    }

    #[test]
    fn test_phase_jump_limit() {
        let runtime = runtime();
        let mut net = Network::new(&runtime).unwrap();
        net.add_region("A", "TestNode", "").unwrap();
        assert!(net.set_phases("A", BTreeSet::new()).is_err());
        // next phase is 1, jump limit 3
        net.set_phases("A", BTreeSet::from([4])).unwrap();
        assert!(net.set_phases("A", BTreeSet::from([9])).is_err());
        net.set_phases("A", BTreeSet::from([1, 8])).unwrap();
        assert_eq!(net.min_phase(), Some(1));
        assert_eq!(net.max_phase(), Some(8));
        assert_eq!(net.enabled_phases(), (1, 8));
        net.set_max_enabled_phase(2);
        assert_eq!(net.enabled_phases(), (1, 2));
    }

    #[test]
    fn test_drop_unregisters() {
        let runtime = runtime();
        let net = Network::new(&runtime).unwrap();
        assert_eq!(runtime.live_network_count(), 1);
        drop(net);
        assert_eq!(runtime.live_network_count(), 0);
        runtime.shutdown().unwrap();
    }
}
