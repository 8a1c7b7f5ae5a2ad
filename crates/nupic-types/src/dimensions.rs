// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node topology of a region or link endpoint.
//!
//! Three states are encoded in the axis list:
//! - empty: unspecified, still waiting for negotiation
//! - `[0]`: don't care, the endpoint accepts whatever the other side has
//! - all axes positive: specified
//!
//! Node indices are linearised with the first axis varying fastest.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{TypesError, TypesResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions(Vec<usize>);

impl Dimensions {
    pub fn new(axes: Vec<usize>) -> Self {
        Self(axes)
    }

    pub fn unspecified() -> Self {
        Self(Vec::new())
    }

    pub fn dontcare() -> Self {
        Self(vec![0])
    }

    /// All-ones topology of the given rank (a single node)
    pub fn ones(rank: usize) -> Self {
        Self(vec![1; rank.max(1)])
    }

    pub fn is_unspecified(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_dontcare(&self) -> bool {
        self.0 == [0]
    }

    pub fn is_specified(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&d| d > 0)
    }

    pub fn is_ones(&self) -> bool {
        self.is_specified() && self.0.iter().all(|&d| d == 1)
    }

    /// Reject axis lists that mix zero with other axes
    pub fn validate(&self) -> TypesResult<()> {
        if self.is_specified() {
            self.checked_count().map(|_| ())
        } else if self.is_unspecified() || self.is_dontcare() {
            Ok(())
        } else {
            Err(TypesError::InvalidDimensions(format!(
                "{} has a zero-sized axis",
                self
            )))
        }
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn axes(&self) -> &[usize] {
        &self.0
    }

    /// Number of nodes; zero unless specified
    /// Node count; saturates at `usize::MAX` where [`Dimensions::checked_count`] fails
    pub fn count(&self) -> usize {
        if self.is_specified() {
            self.0.iter().fold(1usize, |n, &axis| n.saturating_mul(axis))
        } else {
            0
        }
    }

    /// Node count, failing if the product of the axes overflows
    pub fn checked_count(&self) -> TypesResult<usize> {
        if !self.is_specified() {
            return Ok(0);
        }
        self.0
            .iter()
            .try_fold(1usize, |n, &axis| n.checked_mul(axis))
            .ok_or_else(|| TypesError::InvalidDimensions(format!("{} has more nodes than fit in usize", self)))
    }

    /// Pad with trailing unit axes up to `rank`
    pub fn promote(&self, rank: usize) -> Dimensions {
        let mut axes = self.0.clone();
        while axes.len() < rank {
            axes.push(1);
        }
        Dimensions(axes)
    }

    pub fn coordinate(&self, index: usize) -> TypesResult<Vec<usize>> {
        let count = self.count();
        if index >= count {
            return Err(TypesError::OutOfRange { index, count });
        }
        let mut rest = index;
        Ok(self
            .0
            .iter()
            .map(|&d| {
                let c = rest % d;
                rest /= d;
                c
            })
            .collect())
    }

    pub fn index(&self, coordinate: &[usize]) -> TypesResult<usize> {
        if coordinate.len() != self.rank() || !self.is_specified() {
            return Err(TypesError::InvalidDimensions(format!(
                "coordinate {:?} does not address {}",
                coordinate, self
            )));
        }
        let mut index = 0;
        let mut stride = 1;
        for (&c, &d) in coordinate.iter().zip(&self.0) {
            if c >= d {
                return Err(TypesError::OutOfRange { index: c, count: d });
            }
            index += c * stride;
            stride *= d;
        }
        Ok(index)
    }
}

impl From<Vec<usize>> for Dimensions {
    fn from(axes: Vec<usize>) -> Self {
        Self(axes)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unspecified() {
            return f.write_str("[unspecified]");
        }
        if self.is_dontcare() {
            return f.write_str("[dontcare]");
        }
        let axes: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", axes.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states() {
        assert!(Dimensions::unspecified().is_unspecified());
        assert!(Dimensions::dontcare().is_dontcare());
        assert!(!Dimensions::dontcare().is_specified());
        assert!(Dimensions::new(vec![1, 1]).is_ones());
        assert_eq!(Dimensions::new(vec![4, 2]).count(), 8);
        assert_eq!(Dimensions::unspecified().count(), 0);
        assert!(Dimensions::new(vec![3, 0]).validate().is_err());
    }

    #[test]
    fn test_first_axis_fastest() {
        let dims = Dimensions::new(vec![3, 2]);
        assert_eq!(dims.coordinate(0).unwrap(), vec![0, 0]);
        assert_eq!(dims.coordinate(1).unwrap(), vec![1, 0]);
        assert_eq!(dims.coordinate(4).unwrap(), vec![1, 1]);
        for i in 0..dims.count() {
            let c = dims.coordinate(i).unwrap();
            assert_eq!(dims.index(&c).unwrap(), i);
        }
        assert!(dims.coordinate(6).is_err());
        assert!(dims.index(&[3, 0]).is_err());
    }

    #[test]
    fn test_overflowing_count() {
        let huge = Dimensions::new(vec![usize::MAX / 2, 3]);
        assert!(matches!(huge.checked_count(), Err(TypesError::InvalidDimensions(_))));
        assert!(matches!(huge.validate(), Err(TypesError::InvalidDimensions(_))));
        assert_eq!(huge.count(), usize::MAX);

        let edge = Dimensions::new(vec![usize::MAX, 1]);
        assert_eq!(edge.checked_count(), Ok(usize::MAX));
        assert!(edge.validate().is_ok());
        assert_eq!(Dimensions::unspecified().checked_count(), Ok(0));
    }

    #[test]
    fn test_promote_and_display() {
        let dims = Dimensions::new(vec![4]).promote(3);
        assert_eq!(dims.axes(), &[4, 1, 1]);
        assert_eq!(dims.to_string(), "[4 1 1]");
        assert_eq!(Dimensions::unspecified().to_string(), "[unspecified]");
    }
}
