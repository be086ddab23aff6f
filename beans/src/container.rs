//! The main `Container` struct: path resolution and bean lookup.

use crate::config::ContainerConfig;
use crate::core::{FactoryBean, Identifier, Instance, Key, ResolutionChain, Token};
use crate::definition::Scope;
use crate::error::{Error, Result};
use crate::lifecycle::CachedBean;
use crate::mapping::PathMapping;
use crate::registry::Registry;
use crate::resource::{NoResources, ResourceLoader};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Weak};
use tracing::trace;

/// The bean container.
///
/// A `Container` is a cheap handle; clones share the same state. Beans are
/// looked up through the path mapping, the instance cache, the parent
/// container and finally the bean definitions of the shared [`Registry`].
#[derive(Clone)]
pub struct Container {
  pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
  pub(crate) config: ContainerConfig,
  pub(crate) registry: Arc<Registry>,
  pub(crate) loader: Arc<dyn ResourceLoader>,
  parent: RwLock<Option<Weak<Inner>>>,
  /// `None` once the container has been closed.
  pub(crate) mapping: RwLock<Option<PathMapping>>,
  pub(crate) instances: DashMap<Key, CachedBean>,
  pub(crate) next_seq: AtomicU64,
  pub(crate) running: AtomicBool,
  pub(crate) closed: AtomicBool,
}

/// Builder for [`Container`].
pub struct ContainerBuilder {
  config: ContainerConfig,
  registry: Option<Arc<Registry>>,
  loader: Option<Arc<dyn ResourceLoader>>,
  parent: Option<Container>,
  mapping: PathMapping,
}

impl ContainerBuilder {
  /// Replaces the whole configuration.
  pub fn config(mut self, config: ContainerConfig) -> Self {
    self.config = config;
    self
  }

  /// Overrides the configured name.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.config.name = name.into();
    self
  }

  /// Shares an existing registry. Defaults to a fresh, empty one.
  pub fn registry(mut self, registry: Arc<Registry>) -> Self {
    self.registry = Some(registry);
    self
  }

  /// Sets the resource loader. Defaults to [`NoResources`].
  pub fn loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
    self.loader = Some(Arc::new(loader));
    self
  }

  /// Links the new container to `parent`, held weakly.
  pub fn parent(mut self, parent: &Container) -> Self {
    self.parent = Some(parent.clone());
    self
  }

  /// Seeds the path mapping.
  pub fn mapping(mut self, mapping: PathMapping) -> Self {
    self.mapping = mapping;
    self
  }

  /// Validates the configuration and creates the container.
  pub fn build(self) -> Result<Container> {
    self.config.validate()?;
    let inner = Inner::new(
      self.config,
      self.registry.unwrap_or_default(),
      self.loader.unwrap_or_else(|| Arc::new(NoResources)),
      self.parent.map(|p| Arc::downgrade(&p.inner)),
      self.mapping,
    );
    Ok(Container {
      inner: Arc::new(inner),
    })
  }
}

impl Inner {
  fn new(
    config: ContainerConfig,
    registry: Arc<Registry>,
    loader: Arc<dyn ResourceLoader>,
    parent: Option<Weak<Inner>>,
    mapping: PathMapping,
  ) -> Self {
    Self {
      config,
      registry,
      loader,
      parent: RwLock::new(parent),
      mapping: RwLock::new(Some(mapping)),
      instances: DashMap::new(),
      next_seq: AtomicU64::new(0),
      running: AtomicBool::new(false),
      closed: AtomicBool::new(false),
    }
  }

  pub(crate) fn parent(&self) -> Option<Arc<Inner>> {
    self.parent.read().as_ref().and_then(Weak::upgrade)
  }

  pub(crate) fn cached(&self, key: &Key) -> Option<Instance> {
    self.instances.get(key).map(|entry| entry.instance.clone())
  }

  /// Whether `key` appears in the local or the extra mapping.
  fn is_mapped(&self, key: &Key, extra: &PathMapping) -> Result<bool> {
    let mapping = self.mapping.read();
    let mapping = mapping.as_ref().ok_or(Error::Closed)?;
    Ok(mapping.contains(key) || extra.contains(key))
  }

  /// The path resolver: cache, local mapping, extra mapping, then the parent chain.
  pub(crate) fn resolve(&self, key: &Key, extra: &PathMapping) -> Result<Option<Identifier>> {
    if let Some(instance) = self.cached(key) {
      return Ok(Some(Identifier::Instance(instance)));
    }

    let local = {
      let mapping = self.mapping.read();
      let mapping = mapping.as_ref().ok_or(Error::Closed)?;
      mapping.get(key).cloned()
    };
    if let Some(target) = local.or_else(|| extra.get(key).cloned()) {
      trace!(container = %self.config.name, %key, target = %target.describe(), "Path resolved");
      return Ok(Some(target));
    }

    match self.parent() {
      Some(parent) => parent.resolve(key, extra),
      None => Ok(None),
    }
  }
}

impl Container {
  /// Creates a container with default configuration on top of `registry`.
  pub fn new(registry: Arc<Registry>) -> Self {
    Container {
      inner: Arc::new(Inner::new(
        ContainerConfig::default(),
        registry,
        Arc::new(NoResources),
        None,
        PathMapping::new(),
      )),
    }
  }

  /// Starts a [`ContainerBuilder`] with the default configuration.
  pub fn builder() -> ContainerBuilder {
    ContainerBuilder {
      config: ContainerConfig::default(),
      registry: None,
      loader: None,
      parent: None,
      mapping: PathMapping::new(),
    }
  }

  /// Creates a child of `self` sharing the same registry and resource loader.
  pub fn child(&self, name: impl Into<String>) -> Container {
    let config = ContainerConfig {
      name: name.into(),
      ..self.inner.config.clone()
    };
    Container {
      inner: Arc::new(Inner::new(
        config,
        self.inner.registry.clone(),
        self.inner.loader.clone(),
        Some(Arc::downgrade(&self.inner)),
        PathMapping::new(),
      )),
    }
  }

  /// The container name, used in log fields.
  pub fn name(&self) -> &str {
    &self.inner.config.name
  }

  /// The configuration this container was built with.
  pub fn config(&self) -> &ContainerConfig {
    &self.inner.config
  }

  /// The definition registry shared with child containers.
  pub fn registry(&self) -> &Arc<Registry> {
    &self.inner.registry
  }

  /// Whether both handles refer to the same container.
  pub fn same_container(&self, other: &Container) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  // --- Hierarchy ---

  /// Sets the parent used for lookup delegation. The parent is not kept alive by the child.
  pub fn set_parent(&self, parent: &Container) {
    *self.inner.parent.write() = Some(Arc::downgrade(&parent.inner));
  }

  /// Detaches the container from its parent.
  pub fn clear_parent(&self) {
    *self.inner.parent.write() = None;
  }

  /// The parent, if one is set and still alive.
  pub fn parent(&self) -> Option<Container> {
    self.inner.parent().map(|inner| Container { inner })
  }

  // --- Path mapping ---

  /// Maps `key` to `target`, replacing any previous entry.
  pub fn set(&self, key: impl Into<Key>, target: impl Into<Identifier>) -> Result<()> {
    let mut mapping = self.inner.mapping.write();
    let mapping = mapping.as_mut().ok_or(Error::Closed)?;
    mapping.set(key, target);
    Ok(())
  }

  /// Removes the entry for `key`, returning its previous target.
  pub fn unset(&self, key: impl Into<Key>) -> Result<Option<Identifier>> {
    let mut mapping = self.inner.mapping.write();
    let mapping = mapping.as_mut().ok_or(Error::Closed)?;
    Ok(mapping.unset(&key.into()))
  }

  /// Applies every entry of `entries` to the path mapping.
  pub fn configure<I, K, T>(&self, entries: I) -> Result<()>
  where
    I: IntoIterator<Item = (K, T)>,
    K: Into<Key>,
    T: Into<Identifier>,
  {
    let mut mapping = self.inner.mapping.write();
    let mapping = mapping.as_mut().ok_or(Error::Closed)?;
    mapping.extend(entries);
    Ok(())
  }

  /// Maps each key to a lazy wrapper that resolves the same key in `source`.
  ///
  /// The wrappers hold `source` weakly; once it is dropped they fail with
  /// [`Error::Closed`].
  pub fn inherit<I, K>(&self, source: &Container, keys: I) -> Result<()>
  where
    I: IntoIterator<Item = K>,
    K: Into<Key>,
  {
    let mut mapping = self.inner.mapping.write();
    let mapping = mapping.as_mut().ok_or(Error::Closed)?;
    for key in keys {
      let key = key.into();
      mapping.set(key.clone(), inherited(Arc::downgrade(&source.inner), key));
    }
    Ok(())
  }

  /// Runs the path resolver for `key` without building anything.
  pub fn resolve_bean(&self, key: impl Into<Key>, extra: &PathMapping) -> Result<Option<Identifier>> {
    self.inner.resolve(&key.into(), extra)
  }

  // --- Resolution ---

  /// Resolves a required bean, building it if needed.
  pub async fn get_bean(&self, wished: impl Into<Identifier>) -> Result<Instance> {
    let wished = wished.into();
    let describe = wished.describe();
    self
      .get_bean_inner(wished, true, &PathMapping::new(), 0)
      .await?
      .ok_or(Error::NothingResolved(describe))
  }

  /// Resolves a bean with an explicit `required` flag and a per-call extra mapping.
  ///
  /// With `required == false`, a missing definition or an alias that leads
  /// nowhere yields `Ok(None)` instead of an error.
  pub async fn get_bean_with(
    &self,
    wished: impl Into<Identifier>,
    required: bool,
    extra: &PathMapping,
  ) -> Result<Option<Instance>> {
    self.get_bean_inner(wished.into(), required, extra, 0).await
  }

  /// Resolves a required bean and downcasts it to `T`.
  pub async fn get<T: Any + Send + Sync>(&self, wished: impl Into<Identifier>) -> Result<Arc<T>> {
    let wished = wished.into();
    let describe = wished.describe();
    let instance = self.get_bean(wished).await?;
    instance.downcast::<T>().ok_or(Error::TypeMismatch {
      key: describe,
      expected: std::any::type_name::<T>(),
    })
  }

  /// Resolves a required bean registered as a trait object.
  pub async fn get_trait<I: ?Sized + Any + Send + Sync>(&self, wished: impl Into<Identifier>) -> Result<Arc<I>> {
    let wished = wished.into();
    let describe = wished.describe();
    let instance = self.get_bean(wished).await?;
    instance.downcast_trait::<I>().ok_or(Error::TypeMismatch {
      key: describe,
      expected: std::any::type_name::<I>(),
    })
  }

  pub(crate) fn get_bean_inner<'a>(
    &'a self,
    wished: Identifier,
    required: bool,
    extra: &'a PathMapping,
    depth: usize,
  ) -> BoxFuture<'a, Result<Option<Instance>>> {
    async move {
      let mut chain = self.chain();
      let mut wished = wished;
      loop {
        match wished {
          Identifier::Alias(alias) => {
            let key = Key::Alias(alias);
            chain.enter(&key)?;
            match self.inner.resolve(&key, extra)? {
              Some(target) => wished = target,
              None => return missing_alias(key, required),
            }
          }
          Identifier::Token(token) => {
            let key = Key::Token(token.clone());
            chain.enter(&key)?;
            if let Some(instance) = self.inner.cached(&key) {
              trace!(container = %self.name(), %token, "Cache hit");
              return Ok(Some(instance));
            }
            let target = if self.inner.is_mapped(&key, extra)? {
              self.inner.resolve(&key, extra)?
            } else {
              // The parent may only redirect; building happens here.
              match self.inner.parent() {
                Some(parent) => parent.resolve(&key, extra)?,
                None => None,
              }
            };
            match target {
              Some(target) => wished = target,
              None => return self.build_by_token(&token, required, extra, depth).await,
            }
          }
          Identifier::LazyFactory(factory) => return factory.produce_async().await,
          Identifier::Instance(instance) => return Ok(Some(instance)),
        }
      }
    }
    .boxed()
  }

  /// Resolves a bean that must already exist; never builds singletons or globals.
  pub fn get_cached_bean(&self, wished: impl Into<Identifier>) -> Result<Instance> {
    let wished = wished.into();
    let describe = wished.describe();
    self
      .get_cached_bean_with(wished, true, &PathMapping::new())?
      .ok_or(Error::NothingResolved(describe))
  }

  /// Like [`Container::get_cached_bean`], with an extra per-call mapping.
  /// Returns `Ok(None)` when nothing resolves and `required` is false.
  pub fn get_cached_bean_with(
    &self,
    wished: impl Into<Identifier>,
    required: bool,
    extra: &PathMapping,
  ) -> Result<Option<Instance>> {
    let mut chain = self.chain();
    let mut wished = wished.into();
    loop {
      match wished {
        Identifier::Alias(alias) => {
          let key = Key::Alias(alias);
          chain.enter(&key)?;
          match self.inner.resolve(&key, extra)? {
            Some(target) => wished = target,
            None => return missing_alias(key, required),
          }
        }
        Identifier::Token(token) => {
          let key = Key::Token(token.clone());
          chain.enter(&key)?;
          if let Some(instance) = self.inner.cached(&key) {
            return Ok(Some(instance));
          }
          let target = if self.inner.is_mapped(&key, extra)? {
            self.inner.resolve(&key, extra)?
          } else {
            match self.inner.parent() {
              Some(parent) => parent.resolve(&key, extra)?,
              None => None,
            }
          };
          match target {
            Some(target) => wished = target,
            None => return self.cached_by_token(&token, required),
          }
        }
        Identifier::LazyFactory(factory) => return factory.produce(),
        Identifier::Instance(instance) => return Ok(Some(instance)),
      }
    }
  }

  /// Typed [`Container::get_cached_bean`].
  pub fn get_cached<T: Any + Send + Sync>(&self, wished: impl Into<Identifier>) -> Result<Arc<T>> {
    let wished = wished.into();
    let describe = wished.describe();
    let instance = self.get_cached_bean(wished)?;
    instance.downcast::<T>().ok_or(Error::TypeMismatch {
      key: describe,
      expected: std::any::type_name::<T>(),
    })
  }

  fn cached_by_token(&self, token: &Token, required: bool) -> Result<Option<Instance>> {
    let definition = match self.inner.registry.definition(token) {
      Some(definition) => definition,
      None if required => return Err(Error::NoDefinition(token.clone())),
      None => return Ok(None),
    };
    definition.validate()?;
    match definition.scope {
      // Not in the local cache, or resolution would have stopped earlier.
      Scope::Singleton => Err(Error::NotInstantiated(token.clone())),
      Scope::Global => self
        .inner
        .registry
        .global_instance(token)
        .map(Some)
        .ok_or_else(|| Error::NotInstantiated(token.clone())),
      Scope::Prototype => Err(Error::PrototypeNotCached(token.clone())),
    }
  }

  /// Fetches text through the configured resource loader.
  pub async fn get_resource(&self, url: &str) -> Result<String> {
    self
      .inner
      .loader
      .fetch_resource(url)
      .await
      .map_err(|source| Error::Transport {
        url: url.to_string(),
        source,
      })
  }

  fn chain(&self) -> ResolutionChain {
    ResolutionChain::new(
      self.inner.config.detect_cycles,
      self.inner.config.max_resolution_depth,
    )
  }
}

fn missing_alias(key: Key, required: bool) -> Result<Option<Instance>> {
  match (key, required) {
    (_, false) => Ok(None),
    (Key::Alias(alias), true) => Err(Error::UnresolvedAlias(alias)),
    (Key::Token(token), true) => Err(Error::NoDefinition(token)),
  }
}

fn inherited(source: Weak<Inner>, key: Key) -> FactoryBean {
  let cached_source = source.clone();
  let cached_key = key.clone();
  FactoryBean::with_async(
    move || {
      let source = upgrade(&cached_source)?;
      source.get_cached_bean_with(cached_key.clone(), true, &PathMapping::new())
    },
    move || {
      let source = source.clone();
      let key = key.clone();
      async move {
        let source = upgrade(&source)?;
        source.get_bean_with(key, true, &PathMapping::new()).await
      }
      .boxed()
    },
  )
}

fn upgrade(source: &Weak<Inner>) -> Result<Container> {
  source
    .upgrade()
    .map(|inner| Container { inner })
    .ok_or(Error::Closed)
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("name", &self.inner.config.name)
      .field("running", &self.is_running())
      .field("closed", &self.is_closed())
      .field("cached", &self.cached_len())
      .finish()
  }
}
