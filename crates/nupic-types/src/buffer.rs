// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed memory buffers.
//!
//! A [`TypedBuffer`] is the unit of data that flows along links. Its backing
//! store is a tagged enum, so the allocate / bind / release state machine is
//! carried by the type rather than by an ownership flag:
//!
//! ```text
//! Unset --allocate--> Owned --release--> Unset
//! Unset --bind_external--> Borrowed --release--> Unset
//! ```
//!
//! Owned storage is kept in `u64` words so that every element type is
//! correctly aligned when viewed through `bytemuck`.

use std::ops::Deref;
use std::sync::Arc;

use crate::{BasicType, Element, TypesError, TypesResult};

/// Ownership state of a buffer's backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Unset,
    Owned,
    Borrowed,
}

/// Immutable, shareable memory block that a buffer can borrow
///
/// The buffer never frees an external block; the last holder of the `Arc` does.
#[derive(Debug, Clone)]
pub struct ExternalBuffer {
    words: Arc<[u64]>,
    byte_len: usize,
}

impl ExternalBuffer {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; words_for(bytes.len())];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self {
            words: words.into(),
            byte_len: bytes.len(),
        }
    }

    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values))
    }

    pub fn len_bytes(&self) -> usize {
        self.byte_len
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.byte_len]
    }
}

#[derive(Debug, Clone)]
enum Backing {
    Unset,
    Owned(Vec<u64>),
    Borrowed(ExternalBuffer),
}

fn words_for(byte_len: usize) -> usize {
    byte_len.div_ceil(std::mem::size_of::<u64>())
}

/// Type-tagged buffer with explicit ownership state
#[derive(Debug, Clone)]
pub struct TypedBuffer {
    element_type: BasicType,
    count: usize,
    backing: Backing,
}

impl TypedBuffer {
    /// Unbound buffer of the given element type
    pub fn new(element_type: BasicType) -> Self {
        Self {
            element_type,
            count: 0,
            backing: Backing::Unset,
        }
    }

    /// Unbound buffer from a persisted type tag; unknown tags fail here, not at first use
    pub fn from_type_tag(tag: u32) -> TypesResult<Self> {
        Ok(Self::new(BasicType::from_tag(tag)?))
    }

    pub fn from_type_name(name: &str) -> TypesResult<Self> {
        Ok(Self::new(BasicType::parse(name)?))
    }

    /// Owned, zero-filled buffer of `count` elements
    ///
    /// # Panics
    ///
    /// If the byte length of `count` elements overflows `usize`;
    /// [`TypedBuffer::allocate`] reports that as [`TypesError::TooLarge`].
    pub fn allocated(element_type: BasicType, count: usize) -> Self {
        let byte_len = count
            .checked_mul(element_type.size())
            .unwrap_or_else(|| panic!("{} elements of {:?} overflow usize", count, element_type));
        let mut buffer = Self::new(element_type);
        buffer.backing = Backing::Owned(vec![0u64; words_for(byte_len)]);
        buffer.count = count;
        buffer
    }

    /// Owned buffer holding a copy of `values`
    pub fn from_values<T: Element>(values: &[T]) -> Self {
        let mut buffer = Self::allocated(T::TYPE, values.len());
        if let Backing::Owned(words) = &mut buffer.backing {
            let bytes: &[u8] = bytemuck::cast_slice(values);
            bytemuck::cast_slice_mut::<u64, u8>(words)[..bytes.len()].copy_from_slice(bytes);
        }
        buffer
    }

    /// Allocate a zero-filled owned backing store
    pub fn allocate(&mut self, count: usize) -> TypesResult<()> {
        if self.is_bound() {
            return Err(TypesError::AlreadyBound);
        }
        self.byte_len_for(count)?;
        *self = Self::allocated(self.element_type, count);
        Ok(())
    }

    /// Borrow `count` elements of an external block without taking ownership
    pub fn bind_external(&mut self, data: ExternalBuffer, count: usize) -> TypesResult<()> {
        if self.is_bound() {
            return Err(TypesError::AlreadyBound);
        }
        let needed = self.byte_len_for(count)?;
        if needed > data.len_bytes() {
            return Err(TypesError::OutOfRange {
                index: needed,
                count: data.len_bytes(),
            });
        }
        self.backing = Backing::Borrowed(data);
        self.count = count;
        Ok(())
    }

    /// Drop the backing store. Frees owned memory, detaches borrowed memory.
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        self.backing = Backing::Unset;
        self.count = 0;
    }

    fn byte_len_for(&self, count: usize) -> TypesResult<usize> {
        count
            .checked_mul(self.element_type.size())
            .ok_or(TypesError::TooLarge {
                count,
                element_size: self.element_type.size(),
            })
    }

    pub fn element_type(&self) -> BasicType {
        self.element_type
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn ownership(&self) -> Ownership {
        match self.backing {
            Backing::Unset => Ownership::Unset,
            Backing::Owned(_) => Ownership::Owned,
            Backing::Borrowed(_) => Ownership::Borrowed,
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.backing, Backing::Unset)
    }

    pub fn byte_len(&self) -> usize {
        self.count * self.element_type.size()
    }

    /// Raw bytes of the live elements (empty when unbound)
    pub fn raw(&self) -> &[u8] {
        let len = self.byte_len();
        match &self.backing {
            Backing::Unset => &[],
            Backing::Owned(words) => &bytemuck::cast_slice::<u64, u8>(words)[..len],
            Backing::Borrowed(data) => &data.bytes()[..len],
        }
    }

    pub fn raw_mut(&mut self) -> TypesResult<&mut [u8]> {
        let len = self.byte_len();
        match &mut self.backing {
            Backing::Unset => Err(TypesError::Unbound),
            Backing::Owned(words) => Ok(&mut bytemuck::cast_slice_mut::<u64, u8>(words)[..len]),
            Backing::Borrowed(_) => Err(TypesError::ReadOnly),
        }
    }

    pub fn as_slice<T: Element>(&self) -> TypesResult<&[T]> {
        self.check_type::<T>()?;
        bytemuck::try_cast_slice(self.raw())
            .map_err(|e| TypesError::InvalidType(format!("{:?}", e)))
    }

    pub fn as_mut_slice<T: Element>(&mut self) -> TypesResult<&mut [T]> {
        self.check_type::<T>()?;
        bytemuck::try_cast_slice_mut(self.raw_mut()?)
            .map_err(|e| TypesError::InvalidType(format!("{:?}", e)))
    }

    pub fn zero(&mut self) -> TypesResult<()> {
        self.raw_mut()?.fill(0);
        Ok(())
    }

    /// Owned deep copy, regardless of this buffer's ownership
    pub fn to_owned_copy(&self) -> TypedBuffer {
        let mut copy = Self::allocated(self.element_type, self.count);
        if let Backing::Owned(words) = &mut copy.backing {
            let len = self.byte_len();
            bytemuck::cast_slice_mut::<u64, u8>(words)[..len].copy_from_slice(self.raw());
        }
        copy
    }

    /// Copy every element of `src` into this buffer starting at element `offset`
    pub fn copy_from_at(&mut self, offset: usize, src: &TypedBuffer) -> TypesResult<()> {
        if src.element_type != self.element_type {
            return Err(TypesError::TypeMismatch {
                expected: self.element_type,
                actual: src.element_type,
            });
        }
        let end = offset + src.count;
        if end > self.count {
            return Err(TypesError::OutOfRange {
                index: end,
                count: self.count,
            });
        }
        let size = self.element_type.size();
        self.raw_mut()?[offset * size..end * size].copy_from_slice(src.raw());
        Ok(())
    }

    fn check_type<T: Element>(&self) -> TypesResult<()> {
        if T::TYPE != self.element_type {
            return Err(TypesError::TypeMismatch {
                expected: T::TYPE,
                actual: self.element_type,
            });
        }
        Ok(())
    }
}

impl PartialEq for TypedBuffer {
    /// Bitwise comparison of type, count and contents
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.count == other.count
            && self.raw() == other.raw()
    }
}

/// Read-only view that can never own its memory
///
/// There is deliberately no `allocate` here and no mutable access to the
/// inner buffer, so an `ArrayRef` can only ever be Unset or Borrowed.
#[derive(Debug, Clone)]
pub struct ArrayRef {
    inner: TypedBuffer,
}

impl ArrayRef {
    pub fn new(element_type: BasicType) -> Self {
        Self {
            inner: TypedBuffer::new(element_type),
        }
    }

    /// Borrowed view over a snapshot of `buffer`
    pub fn from_buffer(buffer: &TypedBuffer) -> Self {
        let mut view = Self::new(buffer.element_type());
        view.inner.backing = Backing::Borrowed(ExternalBuffer::from_bytes(buffer.raw()));
        view.inner.count = buffer.count();
        view
    }

    pub fn bind_external(&mut self, data: ExternalBuffer, count: usize) -> TypesResult<()> {
        self.inner.bind_external(data, count)
    }

    pub fn release(&mut self) {
        self.inner.release();
    }
}

impl Deref for ArrayRef {
    type Target = TypedBuffer;

    fn deref(&self) -> &TypedBuffer {
        &self.inner
    }
}
