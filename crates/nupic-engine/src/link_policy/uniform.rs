// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Regular fan-in / fan-out with optional overlapping receptive fields.
//!
//! Parameters (JSON object, all optional). Per-axis values take one entry
//! per axis or a single entry applied to every axis.
//! - `mapping`: `"in"` (default) or `"out"`
//! - `rf_size` (alias `rfSize`): receptive field size per axis.
//!   With `"in"`, each destination node gathers `rf_size` source nodes per axis;
//!   with `"out"`, each source node feeds `rf_size` destination nodes per axis.
//!   Defaults to 1 (node to node) for induction.
//! - `rf_overlap` (alias `rfOverlap`): nodes shared by adjacent receptive
//!   fields per axis, must be smaller than `rf_size`. Defaults to 0.
//! - `span`: per axis, cut the wide side into independent runs of this many
//!   nodes; receptive fields restart in each run and never cross it.
//!   0 (default) means one run over the whole axis.
//! - `strict` (default `true`): receptive fields must tile the wide side
//!   exactly. When `false` the last field of a run is clipped instead.
//!
//! Without any of these, each axis pair must divide evenly in one direction.

use nupic_types::Dimensions;
use serde::Deserialize;

use super::{block_splitter_map, common_rank, AxisRatio, LinkPolicy, SplitterMap, Window};
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mapping {
    #[default]
    In,
    Out,
}

fn default_strict() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct UniformParams {
    #[serde(default)]
    mapping: Mapping,
    #[serde(default, alias = "rfSize")]
    rf_size: Option<Vec<usize>>,
    #[serde(default, alias = "rfOverlap")]
    rf_overlap: Option<Vec<usize>>,
    #[serde(default)]
    span: Option<Vec<usize>>,
    #[serde(default = "default_strict")]
    strict: bool,
}

impl Default for UniformParams {
    fn default() -> Self {
        Self {
            mapping: Mapping::In,
            rf_size: None,
            rf_overlap: None,
            span: None,
            strict: true,
        }
    }
}

impl UniformParams {
    /// Plain integer ratios between axes, nothing configured per axis
    fn is_ratio_only(&self) -> bool {
        self.rf_size.is_none() && self.rf_overlap.is_none() && self.span.is_none() && self.strict
    }

    /// Parameter rank, if any per-axis value has more than one entry
    fn rank(&self) -> EngineResult<Option<usize>> {
        let mut rank = None;
        for (name, values) in self.per_axis() {
            let Some(values) = values else { continue };
            if values.is_empty() {
                return Err(EngineError::InvalidLinkPolicy(format!(
                    "{} {} must not be empty",
                    UniformLinkPolicy::TYPE_NAME,
                    name
                )));
            }
            if values.len() == 1 {
                continue;
            }
            match rank {
                Some(r) if r != values.len() => {
                    return Err(EngineError::InvalidLinkPolicy(format!(
                        "{} parameters disagree on dimensionality: {} has {} entries, expected {}",
                        UniformLinkPolicy::TYPE_NAME,
                        name,
                        values.len(),
                        r
                    )));
                }
                _ => rank = Some(values.len()),
            }
        }
        Ok(rank)
    }

    fn per_axis(&self) -> [(&'static str, &Option<Vec<usize>>); 3] {
        [
            ("rf_size", &self.rf_size),
            ("rf_overlap", &self.rf_overlap),
            ("span", &self.span),
        ]
    }

    fn validate(&self) -> EngineResult<()> {
        let rank = self.rank()?.unwrap_or(1);
        for axis in 0..rank {
            let size = axis_value(&self.rf_size, 1, axis, rank)?;
            let overlap = axis_value(&self.rf_overlap, 0, axis, rank)?;
            let span = axis_value(&self.span, 0, axis, rank)?;
            let problem = if size == 0 {
                Some("rf_size must be positive".to_string())
            } else if overlap == size {
                Some(format!(
                    "rf_overlap {} equals rf_size; full overlap is not a uniform mapping",
                    overlap
                ))
            } else if overlap > size {
                Some(format!("rf_overlap {} exceeds rf_size {}", overlap, size))
            } else if span != 0 && span < size {
                Some(format!("span {} is shorter than rf_size {}", span, size))
            } else {
                None
            };
            if let Some(problem) = problem {
                return Err(EngineError::InvalidLinkPolicy(format!(
                    "{} axis {}: {}",
                    UniformLinkPolicy::TYPE_NAME,
                    axis,
                    problem
                )));
            }
        }
        Ok(())
    }
}

/// One entry broadcasts to every axis
fn axis_value(values: &Option<Vec<usize>>, default: usize, axis: usize, rank: usize) -> EngineResult<usize> {
    match values {
        None => Ok(default),
        Some(v) if v.len() == 1 => Ok(v[0]),
        Some(v) if v.len() == rank => Ok(v[axis]),
        Some(v) => Err(EngineError::IncompatibleDimensions(format!(
            "per-axis parameter {:?} does not match rank {}",
            v, rank
        ))),
    }
}

#[derive(Debug)]
pub struct UniformLinkPolicy {
    params: UniformParams,
    src: Dimensions,
    dest: Dimensions,
    element_count: usize,
    ratios: Vec<AxisRatio>,
    initialized: bool,
}

impl UniformLinkPolicy {
    pub const TYPE_NAME: &'static str = "UniformLink";

    pub fn new(params: &str) -> EngineResult<Self> {
        let params: UniformParams = if params.trim().is_empty() {
            UniformParams::default()
        } else {
            serde_json::from_str(params).map_err(|e| {
                EngineError::InvalidLinkPolicy(format!("{} parameters: {}", Self::TYPE_NAME, e))
            })?
        };
        params.validate()?;
        Ok(Self {
            params,
            src: Dimensions::unspecified(),
            dest: Dimensions::unspecified(),
            element_count: 1,
            ratios: Vec::new(),
            initialized: false,
        })
    }

    pub fn create(params: &str) -> EngineResult<Box<dyn LinkPolicy>> {
        Ok(Box::new(Self::new(params)?))
    }

    /// Window layout for one axis; extents are filled in at initialize
    fn window_for(&self, axis: usize, rank: usize) -> EngineResult<Window> {
        let size = axis_value(&self.params.rf_size, 1, axis, rank)?;
        let overlap = axis_value(&self.params.rf_overlap, 0, axis, rank)?;
        Ok(Window {
            size,
            stride: size - overlap,
            span: axis_value(&self.params.span, 0, axis, rank)?,
            strict: self.params.strict,
            wide_len: 0,
            narrow_len: 0,
        })
    }

    /// Destination side from source side (`toward_dest`) or the reverse
    fn induce(&self, known: &Dimensions, toward_dest: bool) -> EngineResult<Dimensions> {
        let rank = known.rank();
        let mut axes = Vec::with_capacity(rank);
        for (axis, &d) in known.axes().iter().enumerate() {
            let window = self.window_for(axis, rank)?;
            // "in" lays windows over the source, "out" over the destination
            let known_is_wide = (self.params.mapping == Mapping::In) == toward_dest;
            let induced = if known_is_wide {
                window.windows_over(d)
            } else {
                window.wide_for(d)
            };
            let induced = induced.ok_or_else(|| {
                EngineError::IncompatibleDimensions(format!(
                    "axis {} of {} does not fit receptive fields of {} every {}{}",
                    axis,
                    known,
                    window.size,
                    window.stride,
                    if window.span == 0 {
                        String::new()
                    } else {
                        format!(" in spans of {}", window.span)
                    }
                ))
            })?;
            axes.push(induced);
        }
        Ok(Dimensions::new(axes))
    }
}

impl LinkPolicy for UniformLinkPolicy {
    fn policy_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn set_src_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()> {
        self.initialized = false;
        self.src = dims.clone();
        if dims.is_specified() && !self.dest.is_specified() {
            self.dest = self.induce(dims, true)?;
        }
        Ok(())
    }

    fn set_dest_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()> {
        self.initialized = false;
        self.dest = dims.clone();
        if dims.is_specified() && !self.src.is_specified() {
            self.src = self.induce(dims, false)?;
        }
        Ok(())
    }

    fn src_dimensions(&self) -> &Dimensions {
        &self.src
    }

    fn dest_dimensions(&self) -> &Dimensions {
        &self.dest
    }

    fn set_node_output_element_count(&mut self, count: usize) {
        self.initialized = false;
        self.element_count = count;
    }

    fn initialize(&mut self) -> EngineResult<()> {
        if !self.src.is_specified() || !self.dest.is_specified() {
            return Err(EngineError::DimensionsUnresolvable(format!(
                "{} needs both sides, have {} -> {}",
                Self::TYPE_NAME,
                self.src,
                self.dest
            )));
        }
        if self.element_count == 0 {
            return Err(EngineError::InvalidState(format!(
                "{} element count per node is zero",
                Self::TYPE_NAME
            )));
        }

        let (src, dest) = common_rank(&self.src, &self.dest);
        let rank = src.rank();
        let mut ratios = Vec::with_capacity(rank);
        for axis in 0..rank {
            let (s, d) = (src.axes()[axis], dest.axes()[axis]);
            let ratio = if self.params.is_ratio_only() {
                AxisRatio::between(s, d)
            } else {
                let window = self.window_for(axis, rank)?;
                match self.params.mapping {
                    Mapping::In => (window.windows_over(s) == Some(d)).then_some(AxisRatio::Gather(Window {
                        wide_len: s,
                        narrow_len: d,
                        ..window
                    })),
                    Mapping::Out => (window.windows_over(d) == Some(s)).then_some(AxisRatio::Scatter(Window {
                        wide_len: d,
                        narrow_len: s,
                        ..window
                    })),
                }
            };
            let ratio = ratio.ok_or_else(|| {
                EngineError::IncompatibleDimensions(format!(
                    "{} -> {}: axis {} sizes {} and {} do not fit the receptive field layout",
                    self.src, self.dest, axis, s, d
                ))
            })?;
            ratios.push(ratio);
        }

        self.ratios = ratios;
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn build_splitter_map(&self) -> EngineResult<SplitterMap> {
        if !self.initialized {
            return Err(EngineError::InvalidState(format!(
                "{} splitter map requested before initialize",
                Self::TYPE_NAME
            )));
        }
        let (src, dest) = common_rank(&self.src, &self.dest);
        block_splitter_map(&src, &dest, &self.ratios, self.element_count)
    }
}
