// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nupic-types
//!
//! Leaf data types shared by every layer of the engine:
//! - [`BasicType`]: the closed, wire-visible element type tag
//! - [`TypedBuffer`] / [`ArrayRef`]: tagged memory with explicit ownership state
//! - [`Collection`]: insertion-ordered, name-addressable container
//! - [`Dimensions`]: node topology of a region or of one side of a link

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod basic_type;
pub mod buffer;
pub mod collection;
pub mod dimensions;
pub mod error;

pub use basic_type::{BasicType, Element, Handle};
pub use buffer::{ArrayRef, ExternalBuffer, Ownership, TypedBuffer};
pub use collection::Collection;
pub use dimensions::Dimensions;
pub use error::{TypesError, TypesResult};
