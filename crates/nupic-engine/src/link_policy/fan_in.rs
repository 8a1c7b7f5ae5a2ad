// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed two-to-one fan-in on every axis, for engine tests.
//!
//! `[4, 4] -> [2, 2] -> [1, 1]`, `[4, 2] -> [2, 1]`.

use nupic_types::Dimensions;

use super::{block_splitter_map, common_rank, AxisRatio, LinkPolicy, SplitterMap};
use crate::{EngineError, EngineResult};

#[derive(Debug)]
pub struct TestFanIn2LinkPolicy {
    src: Dimensions,
    dest: Dimensions,
    element_count: usize,
    initialized: bool,
}

impl TestFanIn2LinkPolicy {
    pub const TYPE_NAME: &'static str = "TestFanIn2";

    pub fn create(params: &str) -> EngineResult<Box<dyn LinkPolicy>> {
        if !params.trim().is_empty() && params.trim() != "{}" {
            return Err(EngineError::InvalidLinkPolicy(format!(
                "{} takes no parameters, got {}",
                Self::TYPE_NAME,
                params
            )));
        }
        Ok(Box::new(Self {
            src: Dimensions::unspecified(),
            dest: Dimensions::unspecified(),
            element_count: 1,
            initialized: false,
        }))
    }
}

impl LinkPolicy for TestFanIn2LinkPolicy {
    fn policy_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn set_src_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()> {
        self.initialized = false;
        self.src = dims.clone();
        if dims.is_specified() && !self.dest.is_specified() {
            if dims.axes().iter().any(|d| d % 2 != 0) {
                return Err(EngineError::IncompatibleDimensions(format!(
                    "{} cannot halve {}",
                    Self::TYPE_NAME,
                    dims
                )));
            }
            self.dest = Dimensions::new(dims.axes().iter().map(|d| d / 2).collect());
        }
        Ok(())
    }

    fn set_dest_dimensions(&mut self, dims: &Dimensions) -> EngineResult<()> {
        self.initialized = false;
        self.dest = dims.clone();
        if dims.is_specified() && !self.src.is_specified() {
            self.src = Dimensions::new(dims.axes().iter().map(|d| d * 2).collect());
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
        let (src, dest) = common_rank(&self.src, &self.dest);
        let halved = src
            .axes()
            .iter()
            .zip(dest.axes())
            .all(|(&s, &d)| s == 2 * d);
        if !halved {
            return Err(EngineError::IncompatibleDimensions(format!(
                "{} requires source = 2 x destination, have {} -> {}",
                Self::TYPE_NAME,
                self.src,
                self.dest
            )));
        }
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
        let ratios = vec![AxisRatio::FanIn(2); src.rank()];
        block_splitter_map(&src, &dest, &ratios, self.element_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halving_chain() {
        let mut first = TestFanIn2LinkPolicy::create("").unwrap();
        first.set_src_dimensions(&Dimensions::new(vec![4, 4])).unwrap();
        assert_eq!(first.dest_dimensions(), &Dimensions::new(vec![2, 2]));

        let mut second = TestFanIn2LinkPolicy::create("").unwrap();
        second.set_src_dimensions(first.dest_dimensions()).unwrap();
        assert_eq!(second.dest_dimensions(), &Dimensions::new(vec![1, 1]));

        let mut reverse = TestFanIn2LinkPolicy::create("{}").unwrap();
        reverse.set_dest_dimensions(&Dimensions::new(vec![2, 1])).unwrap();
        assert_eq!(reverse.src_dimensions(), &Dimensions::new(vec![4, 2]));
    }

    #[test]
    fn test_map_covers_every_source_once() {
        let mut policy = TestFanIn2LinkPolicy::create("").unwrap();
        policy.set_src_dimensions(&Dimensions::new(vec![4, 4])).unwrap();
        policy.set_node_output_element_count(1);
        policy.initialize().unwrap();
        let map = policy.build_splitter_map().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map[0], vec![0, 1, 4, 5]);
        let mut all: Vec<usize> = map.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_rejects_odd_and_mismatched() {
        let mut odd = TestFanIn2LinkPolicy::create("").unwrap();
        assert!(odd.set_src_dimensions(&Dimensions::new(vec![3])).is_err());

        let mut mismatched = TestFanIn2LinkPolicy::create("").unwrap();
        mismatched.set_src_dimensions(&Dimensions::new(vec![4])).unwrap();
        mismatched.set_dest_dimensions(&Dimensions::new(vec![1])).unwrap();
        assert!(mismatched.initialize().is_err());

        assert!(TestFanIn2LinkPolicy::create("{\"x\": 1}").is_err());
    }
}
