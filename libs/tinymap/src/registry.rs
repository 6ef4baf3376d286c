use std::collections::HashMap;
use std::fmt;

use crate::shape::ShapeKey;

/// Ordered (source, destination) pair a conversion is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    source: ShapeKey,
    destination: ShapeKey,
}

impl ConversionKey {
    pub fn new(source: ShapeKey, destination: ShapeKey) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn of<S: 'static, D: 'static>() -> Self {
        Self::new(ShapeKey::of::<S>(), ShapeKey::of::<D>())
    }

    pub fn source(&self) -> ShapeKey {
        self.source
    }

    pub fn destination(&self) -> ShapeKey {
        self.destination
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Conversions by type pair.
///
/// A plain map: no locking, no lazy initialisation. Populate it before
/// sharing; `insert` needs `&mut self`, so the borrow checker keeps
/// registration and lookups from overlapping.
pub struct Registry<V> {
    entries: HashMap<ConversionKey, V>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Registry<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: ConversionKey, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &ConversionKey) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConversionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConversionKey> {
        self.entries.keys()
    }
}
