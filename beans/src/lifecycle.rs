//! Start/stop/close and per-bean disposal.

use crate::container::{Container, Inner};
use crate::core::{Instance, Key};
use crate::definition::{BeanDefinition, Hook};
use crate::error::{Error, Result};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// An entry of the instance cache.
pub(crate) struct CachedBean {
  pub(crate) instance: Instance,
  /// Insertion order; stop and reverse lookup walk entries oldest first.
  pub(crate) seq: u64,
  /// Taken (and so cleared) when the bean is disposed. A failing disposer
  /// puts back the ones after it.
  pub(crate) disposers: Option<Vec<Hook>>,
  pub(crate) pre_destroy: Option<Hook>,
}

impl Inner {
  /// Caches `instance` under `key` unless another instance got there first.
  /// Returns whichever instance ends up cached.
  pub(crate) fn cache_instance(&self, key: Key, instance: Instance, definition: &BeanDefinition) -> Instance {
    let (disposers, pre_destroy) = match &definition.factory {
      Some(factory) => (
        factory.metadata().disposers.clone(),
        factory.metadata().pre_destroy.clone(),
      ),
      None => (Vec::new(), None),
    };
    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
    self
      .instances
      .entry(key)
      .or_insert_with(|| CachedBean {
        instance,
        seq,
        disposers: Some(disposers),
        pre_destroy,
      })
      .instance
      .clone()
  }

  /// Cache keys, oldest first.
  fn ordered_keys(&self) -> Vec<Key> {
    let mut entries: Vec<(u64, Key)> = self
      .instances
      .iter()
      .map(|entry| (entry.seq, entry.key().clone()))
      .collect();
    entries.sort_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, key)| key).collect()
  }

  /// The first cache key holding `instance`.
  fn key_of(&self, instance: &Instance) -> Option<Key> {
    self
      .instances
      .iter()
      .filter(|entry| entry.instance.ptr_eq(instance))
      .min_by_key(|entry| entry.seq)
      .map(|entry| entry.key().clone())
  }

  fn dispose_key(&self, key: &Key) -> Result<()> {
    // The shard lock must be released before user hooks run.
    let (instance, disposers) = match self.instances.get_mut(key) {
      Some(mut entry) => (entry.instance.clone(), entry.disposers.take()),
      None => return Err(Error::NoSuchInstance),
    };
    let mut pending = disposers.unwrap_or_default().into_iter();
    while let Some(hook) = pending.next() {
      debug!(container = %self.config.name, %key, hook = %hook.name, "Running disposer");
      if let Err(source) = (hook.call)(&instance) {
        // Hand the disposers that never ran back to the entry so a retry runs them.
        if let Some(mut entry) = self.instances.get_mut(key) {
          entry.disposers = Some(pending.collect());
        }
        return Err(Error::Hook {
          key: key.clone(),
          hook: hook.name.clone(),
          source,
        });
      }
    }
    Ok(())
  }

  fn destroy_key(&self, key: &Key) -> Result<()> {
    self.dispose_key(key)?;
    let (instance, pre_destroy) = match self.instances.get_mut(key) {
      Some(mut entry) => (entry.instance.clone(), entry.pre_destroy.take()),
      None => return Err(Error::NoSuchInstance),
    };
    if let Some(hook) = pre_destroy {
      debug!(container = %self.config.name, %key, hook = %hook.name, "Running pre-destroy hook");
      (hook.call)(&instance).map_err(|source| Error::Hook {
        key: key.clone(),
        hook: hook.name.clone(),
        source,
      })?;
    }
    self.instances.remove(key);
    Ok(())
  }
}

impl Container {
  /// Marks the container as running.
  pub fn start(&self) -> Result<()> {
    if self.is_closed() {
      return Err(Error::Closed);
    }
    if self
      .inner
      .running
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return Err(Error::AlreadyRunning);
    }
    info!(container = %self.name(), "Container started");
    Ok(())
  }

  /// Disposes every cached bean, then destroys every cached bean, emptying the cache.
  ///
  /// All disposers run before any pre-destroy hook. Global beans live in the
  /// registry and are left alone.
  pub fn stop(&self) -> Result<()> {
    if !self.is_running() {
      return Err(Error::NotRunning);
    }
    let keys = self.inner.ordered_keys();
    for key in &keys {
      self.inner.dispose_key(key)?;
    }
    for key in &keys {
      self.inner.destroy_key(key)?;
    }
    self.inner.running.store(false, Ordering::Release);
    info!(container = %self.name(), destroyed = keys.len(), "Container stopped");
    Ok(())
  }

  /// Stops the container if it is running, then drops its mapping and cache.
  ///
  /// A closed container rejects `start` and every mapping or lookup call.
  pub fn close(&self) -> Result<()> {
    if self.is_running() {
      self.stop()?;
    }
    *self.inner.mapping.write() = None;
    self.inner.instances.clear();
    self.inner.closed.store(true, Ordering::Release);
    info!(container = %self.name(), "Container closed");
    Ok(())
  }

  /// Whether `start` has been called without a matching `stop`.
  pub fn is_running(&self) -> bool {
    self.inner.running.load(Ordering::Acquire)
  }

  /// Whether `close` has completed.
  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::Acquire)
  }

  /// Number of entries in the instance cache, prototypes included.
  pub fn cached_len(&self) -> usize {
    self.inner.instances.len()
  }

  /// Runs the disposers of a cached bean. Disposers run at most once per bean.
  pub fn dispose_bean(&self, instance: &Instance) -> Result<()> {
    let key = self.inner.key_of(instance).ok_or(Error::NoSuchInstance)?;
    self.inner.dispose_key(&key)
  }

  /// Disposes a cached bean, runs its pre-destroy hook and evicts it from the cache.
  pub fn destroy_bean(&self, instance: &Instance) -> Result<()> {
    let key = self.inner.key_of(instance).ok_or(Error::NoSuchInstance)?;
    self.inner.destroy_key(&key)
  }
}
