//! Insertion-ordered string-keyed index.
//!
//! Every cross reference in an `.esc` file is an ordinal into one of these
//! indices, so the position an entry was inserted at is part of the output
//! format and never changes once assigned.

use std::collections::HashMap;

use rootcause::Report;

use crate::error::{EscherError, EscherResult};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OrderedIndex<V> {
    entries: Vec<(String, V)>,
    #[cfg_attr(feature = "serde", serde(skip))]
    positions: HashMap<String, usize>,
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<V> OrderedIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `key` and return its ordinal.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> EscherResult<usize> {
        let key = key.into();
        if self.positions.contains_key(&key) {
            return Err(Report::new(EscherError::DuplicateKey { key }));
        }

        let ordinal = self.entries.len();
        self.positions.insert(key.clone(), ordinal);
        self.entries.push((key, value));
        Ok(ordinal)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.positions.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_by_ordinal(&self, ordinal: usize) -> Option<&V> {
        self.entries.get(ordinal).map(|(_, value)| value)
    }

    pub fn key_of(&self, ordinal: usize) -> Option<&str> {
        self.entries.get(ordinal).map(|(key, _)| key.as_str())
    }

    pub fn ordinal_of(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, value)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }
}
