// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Element type tags for buffer contents.
//!
//! The set is closed and its names and numeric tags are persisted in
//! checkpoints, so variants must never be reordered or renamed.

use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::{TypesError, TypesResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Real32,
    Real64,
    Handle,
}

const ALL: [BasicType; 10] = [
    BasicType::Byte,
    BasicType::Int16,
    BasicType::UInt16,
    BasicType::Int32,
    BasicType::UInt32,
    BasicType::Int64,
    BasicType::UInt64,
    BasicType::Real32,
    BasicType::Real64,
    BasicType::Handle,
];

impl BasicType {
    /// Every valid type, in tag order
    pub fn all() -> &'static [BasicType] {
        &ALL
    }

    /// Element size in bytes
    pub const fn size(self) -> usize {
        match self {
            BasicType::Byte => 1,
            BasicType::Int16 | BasicType::UInt16 => 2,
            BasicType::Int32 | BasicType::UInt32 | BasicType::Real32 => 4,
            BasicType::Int64 | BasicType::UInt64 | BasicType::Real64 | BasicType::Handle => 8,
        }
    }

    /// Canonical name, the inverse of [`BasicType::parse`]
    pub const fn name(self) -> &'static str {
        match self {
            BasicType::Byte => "Byte",
            BasicType::Int16 => "Int16",
            BasicType::UInt16 => "UInt16",
            BasicType::Int32 => "Int32",
            BasicType::UInt32 => "UInt32",
            BasicType::Int64 => "Int64",
            BasicType::UInt64 => "UInt64",
            BasicType::Real32 => "Real32",
            BasicType::Real64 => "Real64",
            BasicType::Handle => "Handle",
        }
    }

    pub fn parse(name: &str) -> TypesResult<BasicType> {
        ALL.iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| TypesError::InvalidType(name.to_string()))
    }

    pub const fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> TypesResult<BasicType> {
        ALL.get(tag as usize)
            .copied()
            .ok_or_else(|| TypesError::InvalidType(format!("tag {}", tag)))
    }

    pub const fn is_real(self) -> bool {
        matches!(self, BasicType::Real32 | BasicType::Real64)
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BasicType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BasicType::parse(s)
    }
}

impl TryFrom<u32> for BasicType {
    type Error = TypesError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        BasicType::from_tag(tag)
    }
}

/// Opaque handle element (pointer-sized slot owned by a region implementation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Handle(pub u64);

/// Rust scalar that can be stored in a [`TypedBuffer`](crate::TypedBuffer)
pub trait Element: Pod + fmt::Debug {
    const TYPE: BasicType;
}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(impl Element for $ty {
            const TYPE: BasicType = BasicType::$tag;
        })*
    };
}

impl_element! {
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Real32,
    f64 => Real64,
    Handle => Handle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(BasicType::Byte.size(), std::mem::size_of::<u8>());
        assert_eq!(BasicType::Int16.size(), std::mem::size_of::<i16>());
        assert_eq!(BasicType::Real32.size(), std::mem::size_of::<f32>());
        assert_eq!(BasicType::Real64.size(), std::mem::size_of::<f64>());
        assert_eq!(BasicType::Handle.size(), std::mem::size_of::<Handle>());
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert_eq!(
            BasicType::parse("Real16"),
            Err(TypesError::InvalidType("Real16".to_string()))
        );
        assert!(BasicType::from_tag(10).is_err());
    }

    proptest! {
        #[test]
        fn parse_inverts_name(index in 0usize..10) {
            let t = BasicType::all()[index];
            prop_assert_eq!(BasicType::parse(t.name()).unwrap(), t);
            prop_assert_eq!(BasicType::from_tag(t.tag()).unwrap(), t);
        }
    }
}
