// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region input endpoint.
//!
//! An input's buffer is the concatenation of every incoming link's source
//! output, in link insertion order. Each link occupies `[offset, offset + n)`
//! of that buffer, and the input's own splitter map is the union of the link
//! maps shifted by those offsets, so `splitter_map()[node]` indexes the
//! consolidated buffer directly.

use std::collections::BTreeMap;

use nupic_types::{BasicType, Collection, Element, TypedBuffer};
use tracing::trace;

use crate::link::{Link, LinkId};
use crate::link_policy::SplitterMap;
use crate::region::Region;
use crate::{EngineError, EngineResult};

#[derive(Debug)]
pub struct Input {
    name: String,
    region_level: bool,
    required: bool,
    /// Incoming links in insertion order
    links: Vec<LinkId>,
    data: TypedBuffer,
    splitter_map: SplitterMap,
    initialized: bool,
}

impl Input {
    pub(crate) fn new(name: &str, element_type: BasicType, region_level: bool, required: bool) -> Self {
        Self {
            name: name.to_string(),
            region_level,
            required,
            links: Vec::new(),
            data: TypedBuffer::new(element_type),
            splitter_map: Vec::new(),
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_type(&self) -> BasicType {
        self.data.element_type()
    }

    pub fn is_region_level(&self) -> bool {
        self.region_level
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }

    pub(crate) fn add_link(&mut self, id: LinkId) {
        if !self.links.contains(&id) {
            self.links.push(id);
        }
    }

    pub(crate) fn remove_link(&mut self, id: LinkId) {
        self.links.retain(|l| *l != id);
        self.uninitialize();
    }

    /// Consolidated data from the most recent step
    pub fn data(&self) -> &TypedBuffer {
        &self.data
    }

    pub fn splitter_map(&self) -> &SplitterMap {
        &self.splitter_map
    }

    /// Lay out the incoming links and allocate the merged buffer
    ///
    /// `source_counts[i]` is the element count of the output feeding
    /// `links()[i]`. Every link must already be initialized.
    pub(crate) fn initialize(
        &mut self,
        links: &mut BTreeMap<LinkId, Link>,
        source_counts: &[usize],
        node_count: usize,
    ) -> EngineResult<()> {
        if source_counts.len() != self.links.len() {
            return Err(EngineError::InvalidState(format!(
                "input '{}' has {} links but {} source sizes",
                self.name,
                self.links.len(),
                source_counts.len()
            )));
        }

        let nodes = if self.region_level { 1 } else { node_count };
        let mut map: SplitterMap = vec![Vec::new(); nodes];
        let mut offset = 0;
        for (id, &count) in self.links.iter().zip(source_counts) {
            let link = links
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(format!("{} feeding input '{}'", id, self.name)))?;
            if link.splitter_map().len() != nodes {
                return Err(EngineError::IncompatibleDimensions(format!(
                    "{} routes to {} nodes, input '{}' has {}",
                    link,
                    link.splitter_map().len(),
                    self.name,
                    nodes
                )));
            }
            link.set_offset(offset);
            for (node, elements) in link.splitter_map().iter().enumerate() {
                map[node].extend(elements.iter().map(|e| e + offset));
            }
            offset += count;
        }

        self.data.release();
        self.data.allocate(offset)?;
        self.splitter_map = map;
        self.initialized = true;
        trace!(target: "nupic-engine", "input '{}' laid out {} elements over {} links", self.name, offset, self.links.len());
        Ok(())
    }

    pub(crate) fn uninitialize(&mut self) {
        self.data.release();
        self.splitter_map.clear();
        self.initialized = false;
    }

    /// Fresh copy of every source output, each at its link's offset
    ///
    /// Always copies: destinations never alias a source region's memory.
    pub fn consolidate(
        &self,
        links: &BTreeMap<LinkId, Link>,
        regions: &Collection<Region>,
    ) -> EngineResult<TypedBuffer> {
        let mut merged = TypedBuffer::allocated(self.element_type(), self.data.count());
        for id in &self.links {
            let link = links
                .get(id)
                .ok_or_else(|| EngineError::NotFound(format!("{} feeding input '{}'", id, self.name)))?;
            let source = regions.get(link.src_region())?.get_output(link.src_output())?;
            merged.copy_from_at(link.offset(), source.data())?;
        }
        Ok(merged)
    }

    pub(crate) fn set_data(&mut self, data: TypedBuffer) -> EngineResult<()> {
        if data.element_type() != self.data.element_type() || data.count() != self.data.count() {
            return Err(EngineError::InvalidState(format!(
                "consolidated buffer for input '{}' does not match its layout",
                self.name
            )));
        }
        self.data = data;
        Ok(())
    }

    /// Gather the elements feeding `node` into `out`, in splitter map order
    pub fn node_input<T: Element>(&self, node: usize, out: &mut Vec<T>) -> EngineResult<()> {
        out.clear();
        let elements = self.splitter_map.get(node).ok_or_else(|| {
            EngineError::OutOfRange(format!(
                "node {} of input '{}' ({} nodes)",
                node,
                self.name,
                self.splitter_map.len()
            ))
        })?;
        let values = self.data.as_slice::<T>()?;
        for &e in elements {
            let value = values.get(e).ok_or_else(|| {
                EngineError::OutOfRange(format!("element {} of input '{}'", e, self.name))
            })?;
            out.push(*value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkEndpoints;
    use crate::link_policy::UniformLinkPolicy;
    use nupic_types::Dimensions;

    fn link(id: u64, src: &str, src_dims: &[usize], dest_dims: &[usize], elements: usize) -> Link {
        let mut link = Link::new(
            LinkId(id),
            "UniformLink",
            "",
            UniformLinkPolicy::create,
            LinkEndpoints {
                src_region: src.into(),
                src_output: "out".into(),
                dest_region: "dest".into(),
                dest_input: "in".into(),
            },
        )
        .unwrap();
        link.policy_mut().set_node_output_element_count(elements);
        link.policy_mut().set_src_dimensions(&Dimensions::new(src_dims.to_vec())).unwrap();
        link.policy_mut().set_dest_dimensions(&Dimensions::new(dest_dims.to_vec())).unwrap();
        link.initialize().unwrap();
        link
    }

    #[test]
    fn test_layout_concatenates_links() {
        let mut links = BTreeMap::new();
        links.insert(LinkId(0), link(0, "a", &[2], &[2], 1));
        links.insert(LinkId(1), link(1, "b", &[4], &[2], 1));

        let mut input = Input::new("in", BasicType::Real64, false, true);
        input.add_link(LinkId(0));
        input.add_link(LinkId(1));
        input.initialize(&mut links, &[2, 4], 2).unwrap();

        assert!(input.is_initialized());
        assert_eq!(input.data().count(), 6);
        assert_eq!(links[&LinkId(1)].offset(), 2);
        assert_eq!(input.splitter_map(), &vec![vec![0, 2, 3], vec![1, 4, 5]]);
    }

    #[test]
    fn test_node_input_reads_through_map() {
        let mut links = BTreeMap::new();
        links.insert(LinkId(0), link(0, "a", &[4], &[2], 1));
        let mut input = Input::new("in", BasicType::Real64, false, true);
        input.add_link(LinkId(0));
        input.initialize(&mut links, &[4], 2).unwrap();
        input
            .set_data(TypedBuffer::from_values(&[1.0f64, 2.0, 3.0, 4.0]))
            .unwrap();

        let mut values: Vec<f64> = Vec::new();
        input.node_input(1, &mut values).unwrap();
        assert_eq!(values, vec![3.0, 4.0]);
        assert!(input.node_input(2, &mut values).is_err());
        let mut wrong: Vec<i32> = Vec::new();
        assert!(input.node_input(0, &mut wrong).is_err());
    }

    #[test]
    fn test_node_count_mismatch() {
        let mut links = BTreeMap::new();
        links.insert(LinkId(0), link(0, "a", &[4], &[4], 1));
        let mut input = Input::new("in", BasicType::Real64, false, true);
        input.add_link(LinkId(0));
        assert!(matches!(
            input.initialize(&mut links, &[4], 2),
            Err(EngineError::IncompatibleDimensions(_))
        ));
    }

    #[test]
    fn test_set_data_checks_layout() {
        let mut input = Input::new("in", BasicType::Real64, false, false);
        assert!(input.set_data(TypedBuffer::from_values(&[1.0f64])).is_err());
    }
}
