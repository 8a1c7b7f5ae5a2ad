// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Link policies: turning a pair of dimensions into a splitter map.
//!
//! A policy records the source and destination dimensions of one link,
//! may induce an unspecified side from the specified one, validates the
//! pair in [`LinkPolicy::initialize`] and then builds a [`SplitterMap`].
//!
//! The map has one entry per destination node (index = destination node
//! index). Each entry lists element offsets into the source output buffer,
//! `source_node * element_count + k`, so with one element per node the
//! offsets are plain source node indices.
//!
//! Built-in policies are a closed enum; further policies can be added to a
//! [`LinkPolicyFactory`] registration table.

use std::fmt;

use ahash::AHashMap;
use nupic_types::Dimensions;

use crate::{EngineError, EngineResult};

pub mod fan_in;
pub mod uniform;

pub use fan_in::TestFanIn2LinkPolicy;
pub use uniform::UniformLinkPolicy;

/// Per destination node, the source element offsets that feed it
pub type SplitterMap = Vec<Vec<usize>>;

/// Creates a policy from its (JSON) parameter string
pub type LinkPolicyConstructor = fn(&str) -> EngineResult<Box<dyn LinkPolicy>>;

pub trait LinkPolicy: Send + fmt::Debug {
    fn policy_type(&self) -> &'static str;

    /// Record the source dimensions; may induce the destination side
    fn set_src_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()>;

    /// Record the destination dimensions; may induce the source side
    fn set_dest_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()>;

    fn src_dimensions(&self) -> &Dimensions;

    fn dest_dimensions(&self) -> &Dimensions;

    fn set_node_output_element_count(&mut self, count: usize);

    /// Validate the recorded pair under this policy's rule
    fn initialize(&mut self) -> EngineResult<()>;

    fn is_initialized(&self) -> bool;

    /// Deterministic in the two dimensions and the element count
    fn build_splitter_map(&self) -> EngineResult<SplitterMap>;
}

/// How one destination axis relates to the matching source axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AxisRatio {
    /// Each source coordinate feeds this many consecutive destination coordinates
    FanOut(usize),
    /// Each destination coordinate gathers this many consecutive source coordinates
    FanIn(usize),
    /// Destination coordinate `k` gathers window `k` laid over the source axis
    Gather(Window),
    /// Source coordinate `k` feeds window `k` laid over the destination axis
    Scatter(Window),
}

/// Receptive fields laid along one axis, possibly overlapping
///
/// Windows of `size` coordinates start every `stride` coordinates on the
/// wide axis. With a non-zero `span` the wide axis is cut into independent
/// runs of `span` coordinates and the windows restart in each run. Window
/// `k` belongs to narrow coordinate `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub size: usize,
    pub stride: usize,
    pub span: usize,
    /// Strict layouts must tile the wide axis exactly
    pub strict: bool,
    pub wide_len: usize,
    pub narrow_len: usize,
}

impl Window {
    /// Windows in one unbroken run of `len` wide coordinates
    fn run(&self, len: usize) -> Option<usize> {
        if len < self.size {
            return (!self.strict && len > 0).then_some(1);
        }
        let excess = len - self.size;
        if excess % self.stride == 0 {
            Some(excess / self.stride + 1)
        } else if self.strict {
            None
        } else {
            // last window is clipped at the end of the run
            Some(excess / self.stride + 2)
        }
    }

    fn per_span(&self) -> Option<usize> {
        if self.span == 0 {
            Some(self.narrow_len.max(1))
        } else {
            self.run(self.span)
        }
    }

    /// Narrow axis length that lays windows over `wide` coordinates
    pub(crate) fn windows_over(&self, wide: usize) -> Option<usize> {
        if self.span == 0 {
            return self.run(wide);
        }
        let rest = wide % self.span;
        if rest != 0 && self.strict {
            return None;
        }
        let tail = if rest == 0 { 0 } else { self.run(rest)? };
        Some((wide / self.span) * self.run(self.span)? + tail)
    }

    /// Wide axis length tiled by `narrow` windows
    pub(crate) fn wide_for(&self, narrow: usize) -> Option<usize> {
        if narrow == 0 {
            return None;
        }
        if self.span == 0 {
            return (narrow - 1).checked_mul(self.stride)?.checked_add(self.size);
        }
        let per_span = self.run(self.span)?;
        if narrow % per_span != 0 {
            return None;
        }
        (narrow / per_span).checked_mul(self.span)
    }

    /// Wide coordinates covered by window `k`
    fn window(&self, k: usize) -> std::ops::Range<usize> {
        let per_span = self.per_span().unwrap_or(1);
        let (span_index, local) = if self.span == 0 { (0, k) } else { (k / per_span, k % per_span) };
        let span_start = span_index * self.span;
        let span_end = if self.span == 0 {
            self.wide_len
        } else {
            (span_start + self.span).min(self.wide_len)
        };
        let start = (span_start + local * self.stride).min(span_end);
        start..(start + self.size).min(span_end)
    }

    /// Narrow coordinates whose window covers wide coordinate `c`
    fn covering(&self, c: usize) -> std::ops::Range<usize> {
        let per_span = self.per_span().unwrap_or(1);
        let (base, offset) = if self.span == 0 {
            (0, c)
        } else {
            (c / self.span * per_span, c % self.span)
        };
        let in_span = per_span.min(self.narrow_len.saturating_sub(base));
        let lo = (offset + 1).saturating_sub(self.size).div_ceil(self.stride);
        let hi = (offset / self.stride + 1).min(in_span);
        base + lo.min(hi)..base + hi
    }
}

impl AxisRatio {
    /// Ratio between matching axes, if one divides the other
    pub(crate) fn between(src: usize, dest: usize) -> Option<AxisRatio> {
        if src == 0 || dest == 0 {
            None
        } else if dest % src == 0 {
            Some(AxisRatio::FanOut(dest / src))
        } else if src % dest == 0 {
            Some(AxisRatio::FanIn(src / dest))
        } else {
            None
        }
    }

    fn source_range(self, dest_coordinate: usize) -> std::ops::Range<usize> {
        match self {
            AxisRatio::FanOut(f) => dest_coordinate / f..dest_coordinate / f + 1,
            AxisRatio::FanIn(f) => dest_coordinate * f..(dest_coordinate + 1) * f,
            AxisRatio::Gather(w) => w.window(dest_coordinate),
            AxisRatio::Scatter(w) => w.covering(dest_coordinate),
        }
    }
}

/// Splitter map for a regular block mapping between equal-rank dimensions
///
/// Source nodes within a destination node's block are listed with the
/// first axis varying fastest.
pub(crate) fn block_splitter_map(
    src: &Dimensions,
    dest: &Dimensions,
    ratios: &[AxisRatio],
    element_count: usize,
) -> EngineResult<SplitterMap> {
    if src.rank() != dest.rank() || ratios.len() != dest.rank() {
        return Err(EngineError::IncompatibleDimensions(format!(
            "cannot map {} onto {}",
            src, dest
        )));
    }

    let mut map = Vec::with_capacity(dest.count());
    for node in 0..dest.count() {
        let coordinate = dest.coordinate(node)?;
        let ranges: Vec<std::ops::Range<usize>> = coordinate
            .iter()
            .zip(ratios)
            .map(|(&c, ratio)| ratio.source_range(c))
            .collect();
        if ranges.iter().any(|r| r.is_empty()) {
            map.push(Vec::new());
            continue;
        }

        let mut elements = Vec::new();
        let mut cursor: Vec<usize> = ranges.iter().map(|r| r.start).collect();
        'block: loop {
            let source_node = src.index(&cursor)?;
            elements.extend(source_node * element_count..(source_node + 1) * element_count);

            for (axis, range) in ranges.iter().enumerate() {
                cursor[axis] += 1;
                if cursor[axis] < range.end {
                    continue 'block;
                }
                cursor[axis] = range.start;
            }
            break;
        }
        map.push(elements);
    }
    Ok(map)
}

/// Promote both sides to a common rank
pub(crate) fn common_rank(src: &Dimensions, dest: &Dimensions) -> (Dimensions, Dimensions) {
    let rank = src.rank().max(dest.rank());
    (src.promote(rank), dest.promote(rank))
}

/// The policies compiled into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinLinkPolicy {
    Uniform,
    TestFanIn2,
}

impl BuiltinLinkPolicy {
    pub const ALL: [BuiltinLinkPolicy; 2] = [BuiltinLinkPolicy::Uniform, BuiltinLinkPolicy::TestFanIn2];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinLinkPolicy::Uniform => UniformLinkPolicy::TYPE_NAME,
            BuiltinLinkPolicy::TestFanIn2 => TestFanIn2LinkPolicy::TYPE_NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn constructor(self) -> LinkPolicyConstructor {
        match self {
            BuiltinLinkPolicy::Uniform => UniformLinkPolicy::create,
            BuiltinLinkPolicy::TestFanIn2 => TestFanIn2LinkPolicy::create,
        }
    }
}

/// Resolves policy type names to constructors
#[derive(Default)]
pub struct LinkPolicyFactory {
    registered: AHashMap<String, LinkPolicyConstructor>,
}

impl LinkPolicyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy type; built-in names cannot be shadowed
    pub fn register(&mut self, name: &str, constructor: LinkPolicyConstructor) -> EngineResult<()> {
        if BuiltinLinkPolicy::from_name(name).is_some() || self.registered.contains_key(name) {
            return Err(EngineError::DuplicateName(format!("link policy '{}'", name)));
        }
        self.registered.insert(name.to_string(), constructor);
        Ok(())
    }

    pub fn constructor(&self, name: &str) -> EngineResult<LinkPolicyConstructor> {
        if let Some(builtin) = BuiltinLinkPolicy::from_name(name) {
            return Ok(builtin.constructor());
        }
        self.registered
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::InvalidLinkPolicy(format!("unknown link policy type '{}'", name)))
    }

    pub fn create(&self, name: &str, params: &str) -> EngineResult<Box<dyn LinkPolicy>> {
        (self.constructor(name)?)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_ratio() {
        assert_eq!(AxisRatio::between(4, 8), Some(AxisRatio::FanOut(2)));
        assert_eq!(AxisRatio::between(8, 4), Some(AxisRatio::FanIn(2)));
        assert_eq!(AxisRatio::between(3, 3), Some(AxisRatio::FanOut(1)));
        assert_eq!(AxisRatio::between(3, 2), None);
    }

    #[test]
    fn test_block_map_two_axes() {
        let src = Dimensions::new(vec![4, 2]);
        let dest = Dimensions::new(vec![2, 1]);
        let map = block_splitter_map(&src, &dest, &[AxisRatio::FanIn(2), AxisRatio::FanIn(2)], 1).unwrap();
        assert_eq!(map, vec![vec![0, 1, 4, 5], vec![2, 3, 6, 7]]);
    }

    #[test]
    fn test_block_map_element_offsets() {
        let src = Dimensions::new(vec![2]);
        let dest = Dimensions::new(vec![4]);
        let map = block_splitter_map(&src, &dest, &[AxisRatio::FanOut(2)], 3).unwrap();
        assert_eq!(map, vec![vec![0, 1, 2], vec![0, 1, 2], vec![3, 4, 5], vec![3, 4, 5]]);
    }

    fn window(size: usize, stride: usize, span: usize, strict: bool) -> Window {
        Window { size, stride, span, strict, wide_len: 0, narrow_len: 0 }
    }

    #[test]
    fn test_window_counts() {
        let overlapping = window(2, 1, 0, true);
        assert_eq!(overlapping.windows_over(4), Some(3));
        assert_eq!(overlapping.wide_for(3), Some(4));

        let tiled = window(3, 2, 0, true);
        assert_eq!(tiled.windows_over(7), Some(3));
        assert_eq!(tiled.windows_over(6), None);
        assert_eq!(window(3, 2, 0, false).windows_over(6), Some(3));

        let spans = window(2, 1, 4, true);
        assert_eq!(spans.windows_over(8), Some(6));
        assert_eq!(spans.windows_over(6), None);
        assert_eq!(spans.wide_for(6), Some(8));
        assert_eq!(spans.wide_for(4), None);
    }

    #[test]
    fn test_gather_windows_restart_per_span() {
        let w = Window { wide_len: 8, narrow_len: 6, ..window(2, 1, 4, true) };
        let src = Dimensions::new(vec![8]);
        let dest = Dimensions::new(vec![6]);
        let map = block_splitter_map(&src, &dest, &[AxisRatio::Gather(w)], 1).unwrap();
        assert_eq!(
            map,
            vec![vec![0, 1], vec![1, 2], vec![2, 3], vec![4, 5], vec![5, 6], vec![6, 7]]
        );
    }

    #[test]
    fn test_scatter_covering() {
        let w = Window { wide_len: 4, narrow_len: 3, ..window(2, 1, 0, true) };
        let src = Dimensions::new(vec![3]);
        let dest = Dimensions::new(vec![4]);
        let map = block_splitter_map(&src, &dest, &[AxisRatio::Scatter(w)], 1).unwrap();
        assert_eq!(map, vec![vec![0], vec![0, 1], vec![1, 2], vec![2]]);
    }

    #[test]
    fn test_factory_resolution() {
        let mut factory = LinkPolicyFactory::new();
        assert!(factory.create("UniformLink", "").is_ok());
        assert!(factory.create("TestFanIn2", "").is_ok());
        assert!(matches!(
            factory.create("Spiral", ""),
            Err(EngineError::InvalidLinkPolicy(_))
        ));
        assert!(factory.register("UniformLink", UniformLinkPolicy::create).is_err());
        factory.register("Spiral", TestFanIn2LinkPolicy::create).unwrap();
        assert!(factory.create("Spiral", "").is_ok());
        assert!(factory.register("Spiral", TestFanIn2LinkPolicy::create).is_err());
    }
}
