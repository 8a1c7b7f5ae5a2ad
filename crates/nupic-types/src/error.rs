// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::BasicType;

/// Errors raised by the leaf data types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range (count {count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Buffer already has a backing allocation")]
    AlreadyBound,

    #[error("{count} elements of {element_size} bytes exceed the address space")]
    TooLarge { count: usize, element_size: usize },

    #[error("Invalid basic type: {0}")]
    InvalidType(String),

    #[error("Type mismatch: buffer holds {actual}, requested {expected}")]
    TypeMismatch {
        expected: BasicType,
        actual: BasicType,
    },

    #[error("Buffer is borrowed and cannot be written")]
    ReadOnly,

    #[error("Buffer has no backing allocation")]
    Unbound,

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
}

pub type TypesResult<T> = Result<T, TypesError>;
