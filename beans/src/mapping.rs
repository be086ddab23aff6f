//! Path mappings: requested identifier to "wished" target.

use crate::core::{Identifier, Key};
use std::collections::HashMap;

/// A mapping from an alias or token to the target it stands for.
///
/// Targets may be another alias or token (an indirection), a
/// [`FactoryBean`](crate::FactoryBean) wrapper, or a concrete instance.
/// Mappings must form a DAG; cycles are reported as
/// [`Error::MappingCycle`](crate::Error::MappingCycle) during resolution.
#[derive(Clone, Debug, Default)]
pub struct PathMapping {
  entries: HashMap<Key, Identifier>,
}

impl PathMapping {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn with(mut self, key: impl Into<Key>, target: impl Into<Identifier>) -> Self {
    self.set(key, target);
    self
  }

  /// Inserts or replaces a mapping entry, returning the previous target.
  pub fn set(&mut self, key: impl Into<Key>, target: impl Into<Identifier>) -> Option<Identifier> {
    self.entries.insert(key.into(), target.into())
  }

  pub fn unset(&mut self, key: &Key) -> Option<Identifier> {
    self.entries.remove(key)
  }

  pub fn get(&self, key: &Key) -> Option<&Identifier> {
    self.entries.get(key)
  }

  pub fn contains(&self, key: &Key) -> bool {
    self.entries.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Key, &Identifier)> {
    self.entries.iter()
  }

  /// Returns a copy of `self` with `overrides` applied on top.
  /// On key collision the override wins.
  pub fn merged<I>(&self, overrides: I) -> PathMapping
  where
    I: IntoIterator<Item = (Key, Identifier)>,
  {
    let mut merged = self.clone();
    merged.entries.extend(overrides);
    merged
  }
}

impl<K, T> FromIterator<(K, T)> for PathMapping
where
  K: Into<Key>,
  T: Into<Identifier>,
{
  fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
    let mut mapping = PathMapping::new();
    for (key, target) in iter {
      mapping.set(key, target);
    }
    mapping
  }
}

impl<K, T> Extend<(K, T)> for PathMapping
where
  K: Into<Key>,
  T: Into<Identifier>,
{
  fn extend<I: IntoIterator<Item = (K, T)>>(&mut self, iter: I) {
    for (key, target) in iter {
      self.set(key, target);
    }
  }
}
