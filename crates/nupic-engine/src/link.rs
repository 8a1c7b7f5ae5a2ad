// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Directed edge from one region output to another region input.
//!
//! Links live in the network's arena keyed by [`LinkId`]. Endpoints refer to
//! regions and endpoints by name, and outputs/inputs refer back to links by
//! id only, so removing a region or a link never leaves a dangling pointer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::link_policy::{LinkPolicy, LinkPolicyConstructor, SplitterMap};
use crate::{EngineError, EngineResult};

/// Stable arena id; ids increase in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub(crate) u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

pub struct Link {
    id: LinkId,
    policy_type: String,
    policy_params: String,
    src_region: String,
    src_output: String,
    dest_region: String,
    dest_input: String,
    constructor: LinkPolicyConstructor,
    policy: Box<dyn LinkPolicy>,
    splitter_map: SplitterMap,
    /// First element of this link's slice of the destination input buffer
    offset: usize,
}

/// Identity of a link by its endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEndpoints {
    pub src_region: String,
    pub src_output: String,
    pub dest_region: String,
    pub dest_input: String,
}

impl Link {
    pub(crate) fn new(
        id: LinkId,
        policy_type: &str,
        policy_params: &str,
        constructor: LinkPolicyConstructor,
        endpoints: LinkEndpoints,
    ) -> EngineResult<Self> {
        let policy = constructor(policy_params)?;
        Ok(Self {
            id,
            policy_type: policy_type.to_string(),
            policy_params: policy_params.to_string(),
            src_region: endpoints.src_region,
            src_output: endpoints.src_output,
            dest_region: endpoints.dest_region,
            dest_input: endpoints.dest_input,
            constructor,
            policy,
            splitter_map: Vec::new(),
            offset: 0,
        })
    }

    /// Validate the policy and build the routing table.
    /// Both endpoints' dimensions must already be recorded on the policy.
    pub fn initialize(&mut self) -> EngineResult<()> {
        self.policy.initialize()?;
        self.splitter_map = self.policy.build_splitter_map()?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.policy.is_initialized() && !self.splitter_map.is_empty()
    }

    /// Fresh policy, no routing state
    pub(crate) fn reset(&mut self) -> EngineResult<()> {
        self.policy = (self.constructor)(&self.policy_params)?;
        self.splitter_map.clear();
        self.offset = 0;
        Ok(())
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn policy_type(&self) -> &str {
        &self.policy_type
    }

    pub fn policy_params(&self) -> &str {
        &self.policy_params
    }

    pub fn policy(&self) -> &dyn LinkPolicy {
        self.policy.as_ref()
    }

    pub(crate) fn policy_mut(&mut self) -> &mut dyn LinkPolicy {
        self.policy.as_mut()
    }

    pub fn src_region(&self) -> &str {
        &self.src_region
    }

    pub fn src_output(&self) -> &str {
        &self.src_output
    }

    pub fn dest_region(&self) -> &str {
        &self.dest_region
    }

    pub fn dest_input(&self) -> &str {
        &self.dest_input
    }

    pub fn splitter_map(&self) -> &SplitterMap {
        &self.splitter_map
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn connects(&self, endpoints: &LinkEndpoints) -> bool {
        self.src_region == endpoints.src_region
            && self.src_output == endpoints.src_output
            && self.dest_region == endpoints.dest_region
            && self.dest_input == endpoints.dest_input
    }

    pub(crate) fn missing(endpoints: &LinkEndpoints) -> EngineError {
        EngineError::NotFound(format!(
            "link {}.{} -> {}.{}",
            endpoints.src_region, endpoints.src_output, endpoints.dest_region, endpoints.dest_input
        ))
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{} ({})",
            self.src_region, self.src_output, self.dest_region, self.dest_input, self.policy_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_policy::UniformLinkPolicy;
    use nupic_types::Dimensions;

    fn endpoints() -> LinkEndpoints {
        LinkEndpoints {
            src_region: "A".into(),
            src_output: "out".into(),
            dest_region: "B".into(),
            dest_input: "in".into(),
        }
    }

    #[test]
    fn test_initialize_and_reset() {
        let mut link = Link::new(LinkId(0), "UniformLink", "", UniformLinkPolicy::create, endpoints()).unwrap();
        assert!(!link.is_initialized());
        link.policy_mut().set_src_dimensions(&Dimensions::new(vec![4])).unwrap();
        link.policy_mut().set_dest_dimensions(&Dimensions::new(vec![8])).unwrap();
        link.initialize().unwrap();
        assert!(link.is_initialized());
        assert_eq!(link.splitter_map().len(), 8);
        assert_eq!(link.to_string(), "A.out -> B.in (UniformLink)");

        link.set_offset(5);
        link.reset().unwrap();
        assert!(!link.is_initialized());
        assert_eq!(link.offset(), 0);
        assert!(link.policy().src_dimensions().is_unspecified());
        assert!(link.connects(&endpoints()));
    }

    #[test]
    fn test_initialize_without_dimensions_fails() {
        let mut link = Link::new(LinkId(1), "UniformLink", "", UniformLinkPolicy::create, endpoints()).unwrap();
        assert!(matches!(
            link.initialize(),
            Err(EngineError::DimensionsUnresolvable(_))
        ));
    }
}
