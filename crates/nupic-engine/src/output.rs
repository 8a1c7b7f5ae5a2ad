// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region output endpoint.

use nupic_types::{BasicType, TypedBuffer};

use crate::link::LinkId;
use crate::EngineResult;

#[derive(Debug)]
pub struct Output {
    name: String,
    region_level: bool,
    data: TypedBuffer,
    /// Links fed by this output; the network's arena owns them
    links: Vec<LinkId>,
}

impl Output {
    pub(crate) fn new(name: &str, element_type: BasicType, region_level: bool) -> Self {
        Self {
            name: name.to_string(),
            region_level,
            data: TypedBuffer::new(element_type),
            links: Vec::new(),
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

    /// Produced data; only the owning region's compute step writes it
    pub fn data(&self) -> &TypedBuffer {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TypedBuffer {
        &mut self.data
    }

    pub fn has_outgoing_links(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub(crate) fn add_link(&mut self, id: LinkId) {
        if !self.links.contains(&id) {
            self.links.push(id);
        }
    }

    pub(crate) fn remove_link(&mut self, id: LinkId) {
        self.links.retain(|l| *l != id);
    }

    /// (Re)allocate a zeroed buffer of `count` elements
    pub(crate) fn initialize(&mut self, count: usize) -> EngineResult<()> {
        self.data.release();
        self.data.allocate(count)?;
        Ok(())
    }

    pub(crate) fn uninitialize(&mut self) {
        self.data.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_index_and_buffer() {
        let mut output = Output::new("out", BasicType::Real64, false);
        assert!(!output.has_outgoing_links());
        output.add_link(LinkId(3));
        output.add_link(LinkId(3));
        assert_eq!(output.links(), &[LinkId(3)]);
        output.remove_link(LinkId(3));
        assert!(!output.has_outgoing_links());

        output.initialize(6).unwrap();
        assert_eq!(output.data().count(), 6);
        output.initialize(2).unwrap();
        assert_eq!(output.data().count(), 2);
        output.uninitialize();
        output.uninitialize();
        assert!(!output.data().is_bound());
    }
}
