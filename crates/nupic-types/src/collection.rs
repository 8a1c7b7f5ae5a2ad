// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Insertion-ordered, name-addressable container.

use ahash::AHashMap;

use crate::{TypesError, TypesResult};

/// Ordered `(name, item)` pairs with unique names
///
/// Lookup by name goes through a hash index, lookup by position through the
/// backing vector. Removing an entry shifts later entries down but never
/// reorders them.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    entries: Vec<(String, T)>,
    index: AHashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
        }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, item: T) -> TypesResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TypesError::DuplicateName(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, item));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> TypesResult<T> {
        let position = self
            .index
            .remove(name)
            .ok_or_else(|| TypesError::NotFound(name.to_string()))?;
        let (_, item) = self.entries.remove(position);
        for (_, slot) in self.index.iter_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(item)
    }

    pub fn get(&self, name: &str) -> TypesResult<&T> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i].1)
            .ok_or_else(|| TypesError::NotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> TypesResult<&mut T> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.entries[i].1),
            None => Err(TypesError::NotFound(name.to_string())),
        }
    }

    pub fn get_by_index(&self, index: usize) -> TypesResult<(&str, &T)> {
        self.entries
            .get(index)
            .map(|(name, item)| (name.as_str(), item))
            .ok_or(TypesError::OutOfRange {
                index,
                count: self.entries.len(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, item)| (name.as_str(), item))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, item)| (name.as_str(), item))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }
}
