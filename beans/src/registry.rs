//! The definition registry and the process-wide bean store.

use crate::core::{Instance, Token};
use crate::definition::BeanDefinition;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Bean definitions plus the store for `global`-scoped beans.
///
/// A registry is shared by `Arc` between every container that should see the
/// same definitions and the same global beans. Build one per application (or
/// per test) and hand it to [`Container::builder`](crate::Container::builder).
///
/// Nothing guards first access to a global token: two containers racing to
/// build the same global bean may both construct it, and the first insert wins.
#[derive(Default)]
pub struct Registry {
  definitions: RwLock<Vec<BeanDefinition>>,
  globals: DashMap<Token, Instance>,
}

impl Registry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a shareable registry holding `definitions`, in order.
  pub fn with_definitions(definitions: impl IntoIterator<Item = BeanDefinition>) -> Arc<Self> {
    let registry = Self::new();
    registry.definitions.write().extend(definitions);
    Arc::new(registry)
  }

  /// Appends a definition. Lookups return the first definition for a token.
  pub fn register(&self, definition: BeanDefinition) {
    self.definitions.write().push(definition);
  }

  /// Appends `definition` unless its token already has one. Returns whether it was added.
  pub(crate) fn register_if_absent(&self, definition: BeanDefinition) -> bool {
    let mut definitions = self.definitions.write();
    if definitions.iter().any(|d| d.token == definition.token) {
      return false;
    }
    definitions.push(definition);
    true
  }

  /// The first definition registered for `token`.
  pub fn definition(&self, token: &Token) -> Option<BeanDefinition> {
    self
      .definitions
      .read()
      .iter()
      .find(|d| &d.token == token)
      .cloned()
  }

  /// Whether `token` has a definition.
  pub fn has_definition(&self, token: &Token) -> bool {
    self.definitions.read().iter().any(|d| &d.token == token)
  }

  /// Number of definitions, declared beans included.
  pub fn definitions_len(&self) -> usize {
    self.definitions.read().len()
  }

  /// The global bean built for `token`, if any.
  pub fn global_instance(&self, token: &Token) -> Option<Instance> {
    self.globals.get(token).map(|entry| entry.value().clone())
  }

  /// Number of global beans built so far.
  pub fn globals_len(&self) -> usize {
    self.globals.len()
  }

  /// Stores a global bean unless one is already there; returns the stored instance.
  pub(crate) fn cache_global(&self, token: &Token, instance: Instance) -> Instance {
    self
      .globals
      .entry(token.clone())
      .or_insert(instance)
      .value()
      .clone()
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("definitions", &self.definitions_len())
      .field("globals", &self.globals_len())
      .finish()
  }
}
