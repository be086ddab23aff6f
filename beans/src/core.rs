//! Core identifier and instance types shared by every part of the container.

use crate::error::{Error, Result};
use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque, identity-compared key naming a bean definition.
///
/// Two tokens are equal only if one is a clone of the other; the name is a
/// label for logs and error messages and plays no part in comparison.
#[derive(Clone)]
pub struct Token {
  id: u64,
  name: Arc<str>,
}

impl Token {
  /// Creates a new token, distinct from every other token in the process.
  pub fn new(name: impl Into<Arc<str>>) -> Self {
    Self {
      id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
      name: name.into(),
    }
  }

  /// Creates a fresh internal key, used to park prototype instances in the cache.
  pub(crate) fn anonymous(of: &Token) -> Self {
    Self::new(format!("{}<prototype>", of.name))
  }

  /// The human-readable name; two tokens may share it.
  pub fn name(&self) -> &str {
    &self.name
  }
}

impl PartialEq for Token {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Token {}

impl Hash for Token {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Token({}#{})", self.name, self.id)
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.name, self.id)
  }
}

/// A lookup key in a path mapping or an instance cache.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
  Alias(String),
  Token(Token),
}

impl fmt::Debug for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Key::Alias(alias) => write!(f, "Alias({:?})", alias),
      Key::Token(token) => write!(f, "{:?}", token),
    }
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Key::Alias(alias) => write!(f, "'{}'", alias),
      Key::Token(token) => write!(f, "{}", token),
    }
  }
}

impl From<&str> for Key {
  fn from(alias: &str) -> Self {
    Key::Alias(alias.to_owned())
  }
}

impl From<String> for Key {
  fn from(alias: String) -> Self {
    Key::Alias(alias)
  }
}

impl From<Token> for Key {
  fn from(token: Token) -> Self {
    Key::Token(token)
  }
}

impl From<&Token> for Key {
  fn from(token: &Token) -> Self {
    Key::Token(token.clone())
  }
}

/// A live bean: a shared, type-erased value.
///
/// Concrete types are stored directly. Trait objects are stored as an
/// `Arc<I>` inside the erased box, see [`Instance::from_trait`].
#[derive(Clone)]
pub struct Instance {
  value: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl Instance {
  /// Wraps a concrete value.
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Self::from_arc(Arc::new(value))
  }

  /// Wraps an already shared value without reallocating.
  pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      value,
      type_name: std::any::type_name::<T>(),
    }
  }

  /// Wraps a trait object so it can later be recovered with [`Instance::downcast_trait`].
  pub fn from_trait<I: ?Sized + Any + Send + Sync>(value: Arc<I>) -> Self {
    Self {
      value: Arc::new(value),
      type_name: std::any::type_name::<I>(),
    }
  }

  /// A typed handle to the value, if it is a `T`.
  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.value.clone().downcast::<T>().ok()
  }

  /// Borrows the value as a `T`.
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.value.downcast_ref::<T>()
  }

  /// Recovers a trait object stored with [`Instance::from_trait`].
  pub fn downcast_trait<I: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<I>> {
    self.value.downcast_ref::<Arc<I>>().cloned()
  }

  /// Whether the value is a `T`.
  pub fn is<T: Any>(&self) -> bool {
    self.value.is::<T>()
  }

  /// The `TypeId` of the stored value (not of the `Arc` around it).
  pub fn value_type_id(&self) -> TypeId {
    (*self.value).type_id()
  }

  /// Type name of the stored value, for error messages.
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// Identity comparison: both handles point at the same allocation.
  pub fn ptr_eq(&self, other: &Instance) -> bool {
    std::ptr::eq(
      Arc::as_ptr(&self.value) as *const (),
      Arc::as_ptr(&other.value) as *const (),
    )
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Instance({} @ {:p})", self.type_name, Arc::as_ptr(&self.value) as *const ())
  }
}

type ProduceFn = Arc<dyn Fn() -> Result<Option<Instance>> + Send + Sync>;
type ProduceAsyncFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Option<Instance>>> + Send + Sync>;

/// A lazy wrapper around a zero-argument producer.
///
/// The container calls the producer whenever the wrapper is reached during
/// resolution and hands back whatever it returns, without caching or wiring.
#[derive(Clone)]
pub struct FactoryBean {
  produce: ProduceFn,
  produce_async: Option<ProduceAsyncFn>,
}

impl FactoryBean {
  /// A producer used for both the async and the cached resolution paths.
  pub fn new<F>(produce: F) -> Self
  where
    F: Fn() -> Result<Option<Instance>> + Send + Sync + 'static,
  {
    Self {
      produce: Arc::new(produce),
      produce_async: None,
    }
  }

  /// A producer with a dedicated async variant. `produce` serves the cached path.
  pub fn with_async<F, A>(produce: F, produce_async: A) -> Self
  where
    F: Fn() -> Result<Option<Instance>> + Send + Sync + 'static,
    A: Fn() -> BoxFuture<'static, Result<Option<Instance>>> + Send + Sync + 'static,
  {
    Self {
      produce: Arc::new(produce),
      produce_async: Some(Arc::new(produce_async)),
    }
  }

  pub(crate) fn produce(&self) -> Result<Option<Instance>> {
    (self.produce)()
  }

  pub(crate) async fn produce_async(&self) -> Result<Option<Instance>> {
    match &self.produce_async {
      Some(produce) => produce().await,
      None => (self.produce)(),
    }
  }
}

impl fmt::Debug for FactoryBean {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FactoryBean")
      .field("async", &self.produce_async.is_some())
      .finish()
  }
}

/// Anything that can be asked of a container, or stored as a mapping target.
#[derive(Clone, Debug)]
pub enum Identifier {
  Alias(String),
  Token(Token),
  LazyFactory(FactoryBean),
  Instance(Instance),
}

impl Identifier {
  /// The mapping key for aliases and tokens; `None` for wrappers and instances.
  pub fn key(&self) -> Option<Key> {
    match self {
      Identifier::Alias(alias) => Some(Key::Alias(alias.clone())),
      Identifier::Token(token) => Some(Key::Token(token.clone())),
      Identifier::LazyFactory(_) | Identifier::Instance(_) => None,
    }
  }

  /// A short rendering for log lines and error messages.
  pub fn describe(&self) -> String {
    match self {
      Identifier::Alias(alias) => format!("'{}'", alias),
      Identifier::Token(token) => token.to_string(),
      Identifier::LazyFactory(_) => "<factory bean>".to_string(),
      Identifier::Instance(instance) => format!("<instance of {}>", instance.type_name()),
    }
  }
}

impl From<&str> for Identifier {
  fn from(alias: &str) -> Self {
    Identifier::Alias(alias.to_owned())
  }
}

impl From<String> for Identifier {
  fn from(alias: String) -> Self {
    Identifier::Alias(alias)
  }
}

impl From<Token> for Identifier {
  fn from(token: Token) -> Self {
    Identifier::Token(token)
  }
}

impl From<&Token> for Identifier {
  fn from(token: &Token) -> Self {
    Identifier::Token(token.clone())
  }
}

impl From<Key> for Identifier {
  fn from(key: Key) -> Self {
    match key {
      Key::Alias(alias) => Identifier::Alias(alias),
      Key::Token(token) => Identifier::Token(token),
    }
  }
}

impl From<&Key> for Identifier {
  fn from(key: &Key) -> Self {
    key.clone().into()
  }
}

impl From<Instance> for Identifier {
  fn from(instance: Instance) -> Self {
    Identifier::Instance(instance)
  }
}

impl From<FactoryBean> for Identifier {
  fn from(factory: FactoryBean) -> Self {
    Identifier::LazyFactory(factory)
  }
}

/// Tracks the keys visited while following one chain of indirections.
///
/// A chain that comes back to a key it already passed through is a mapping
/// cycle. Every top-level resolution starts its own chain, so a dependency
/// that refers back to a bean under construction is not a cycle here.
pub(crate) struct ResolutionChain {
  visited: Vec<Key>,
  detect_cycles: bool,
  max_depth: usize,
}

impl ResolutionChain {
  pub(crate) fn new(detect_cycles: bool, max_depth: usize) -> Self {
    Self {
      visited: Vec::new(),
      detect_cycles,
      max_depth,
    }
  }

  pub(crate) fn enter(&mut self, key: &Key) -> Result<()> {
    if self.detect_cycles && self.visited.contains(key) {
      let mut chain = self
        .visited
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>();
      chain.push(key.to_string());
      return Err(Error::MappingCycle {
        chain: chain.join(" -> "),
      });
    }
    if self.visited.len() >= self.max_depth {
      return Err(Error::DepthExceeded {
        key: key.to_string(),
        max_depth: self.max_depth,
      });
    }
    self.visited.push(key.clone());
    Ok(())
  }
}
