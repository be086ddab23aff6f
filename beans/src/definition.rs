//! Bean definitions and the static metadata attached to factory types.
//!
//! Everything the container needs to know about a bean type is declared up
//! front in a [`FactoryType`]: how to construct it, which properties are
//! autowired or filled from resources, which disposers and hooks it has, and
//! which further beans it declares when it acts as a configuration bean.

use crate::container::Container;
use crate::core::{Identifier, Instance, Token};
use crate::error::{BoxError, Error, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// Lifetime and sharing policy of a bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
  /// One instance per container.
  #[default]
  Singleton,
  /// One instance per [`Registry`](crate::Registry), shared by every container built on it.
  Global,
  /// A fresh instance on every resolution.
  Prototype,
}

impl FromStr for Scope {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "singleton" => Ok(Scope::Singleton),
      "global" => Ok(Scope::Global),
      "prototype" => Ok(Scope::Prototype),
      other => Err(Error::InvalidConfig(format!("unsupported scope '{}'", other))),
    }
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Scope::Singleton => "singleton",
      Scope::Global => "global",
      Scope::Prototype => "prototype",
    };
    f.write_str(s)
  }
}

// --- Property slots ---

/// An autowired property. Starts empty and is filled exactly once by the container.
///
/// A wired slot may still hold `None` when the dependency was optional and
/// nothing resolved.
pub struct Autowired<T: ?Sized> {
  cell: OnceCell<Option<Arc<T>>>,
}

impl<T: ?Sized> Autowired<T> {
  pub fn new() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }

  /// A slot that is already populated, as if wired by hand.
  pub fn wired(value: Arc<T>) -> Self {
    Self {
      cell: OnceCell::with_value(Some(value)),
    }
  }

  pub fn get(&self) -> Option<Arc<T>> {
    self.cell.get().and_then(|value| value.clone())
  }

  pub fn is_wired(&self) -> bool {
    self.cell.get().is_some()
  }

  fn fill(&self, value: Option<Arc<T>>) -> bool {
    self.cell.set(value).is_ok()
  }
}

impl<T: ?Sized> Default for Autowired<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: ?Sized> fmt::Debug for Autowired<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Autowired")
      .field("wired", &self.is_wired())
      .finish()
  }
}

/// A property filled with text fetched through the container's resource loader.
#[derive(Debug, Default)]
pub struct ResourceText {
  cell: OnceCell<String>,
}

impl ResourceText {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self) -> Option<&str> {
    self.cell.get().map(String::as_str)
  }

  pub fn is_loaded(&self) -> bool {
    self.cell.get().is_some()
  }
}

#[derive(Debug)]
pub(crate) enum SlotError {
  /// The bean is not of the type the descriptor was declared for.
  WrongBean(&'static str),
  /// The resolved value is not of the property's type.
  WrongValue(&'static str),
  Occupied,
}

type IsEmptyFn = Arc<dyn Fn(&Instance) -> std::result::Result<bool, SlotError> + Send + Sync>;
type FillFn<V> = Arc<dyn Fn(&Instance, V) -> std::result::Result<(), SlotError> + Send + Sync>;

/// Type-erased access to one property of one bean type.
pub(crate) struct Slot<V> {
  pub(crate) is_empty: IsEmptyFn,
  pub(crate) fill: FillFn<V>,
}

impl<V> Clone for Slot<V> {
  fn clone(&self) -> Self {
    Self {
      is_empty: self.is_empty.clone(),
      fill: self.fill.clone(),
    }
  }
}

fn bean_ref<B: Any>(bean: &Instance) -> std::result::Result<&B, SlotError> {
  bean
    .downcast_ref::<B>()
    .ok_or(SlotError::WrongBean(std::any::type_name::<B>()))
}

// --- Descriptors ---

/// Declares one autowired property of a bean type.
#[derive(Clone)]
pub struct Dependency {
  pub property: String,
  pub wished: Option<Identifier>,
  pub required: bool,
  /// When set, the bean's resolver is asked for extra mapping entries under this key.
  pub resolve_key: Option<String>,
  pub(crate) slot: Slot<Option<Instance>>,
}

impl Dependency {
  /// A dependency on a concrete type. It has no target until [`Dependency::target`] is called.
  pub fn new<B, T>(property: impl Into<String>, field: fn(&B) -> &Autowired<T>) -> Self
  where
    B: Any + Send + Sync,
    T: Any + Send + Sync,
  {
    let slot = Slot {
      is_empty: Arc::new(move |bean: &Instance| -> std::result::Result<bool, SlotError> {
        Ok(!field(bean_ref::<B>(bean)?).is_wired())
      }),
      fill: Arc::new(move |bean: &Instance, value: Option<Instance>| -> std::result::Result<(), SlotError> {
        let value = match value {
          Some(instance) => Some(
            instance
              .downcast::<T>()
              .ok_or(SlotError::WrongValue(std::any::type_name::<T>()))?,
          ),
          None => None,
        };
        if field(bean_ref::<B>(bean)?).fill(value) {
          Ok(())
        } else {
          Err(SlotError::Occupied)
        }
      }),
    };
    Self::with_slot(property.into(), slot)
  }

  /// A dependency on a trait object registered with [`Instance::from_trait`].
  pub fn of_trait<B, I>(property: impl Into<String>, field: fn(&B) -> &Autowired<I>) -> Self
  where
    B: Any + Send + Sync,
    I: ?Sized + Any + Send + Sync,
  {
    let slot = Slot {
      is_empty: Arc::new(move |bean: &Instance| -> std::result::Result<bool, SlotError> {
        Ok(!field(bean_ref::<B>(bean)?).is_wired())
      }),
      fill: Arc::new(move |bean: &Instance, value: Option<Instance>| -> std::result::Result<(), SlotError> {
        let value = match value {
          Some(instance) => Some(
            instance
              .downcast_trait::<I>()
              .ok_or(SlotError::WrongValue(std::any::type_name::<I>()))?,
          ),
          None => None,
        };
        if field(bean_ref::<B>(bean)?).fill(value) {
          Ok(())
        } else {
          Err(SlotError::Occupied)
        }
      }),
    };
    Self::with_slot(property.into(), slot)
  }

  fn with_slot(property: String, slot: Slot<Option<Instance>>) -> Self {
    Self {
      property,
      wished: None,
      required: true,
      resolve_key: None,
      slot,
    }
  }

  pub fn target(mut self, wished: impl Into<Identifier>) -> Self {
    self.wished = Some(wished.into());
    self
  }

  pub fn optional(mut self) -> Self {
    self.required = false;
    self
  }

  pub fn resolve_key(mut self, key: impl Into<String>) -> Self {
    self.resolve_key = Some(key.into());
    self
  }
}

impl fmt::Debug for Dependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dependency")
      .field("property", &self.property)
      .field("wished", &self.wished)
      .field("required", &self.required)
      .field("resolve_key", &self.resolve_key)
      .finish()
  }
}

/// Declares one property filled from a resource url.
#[derive(Clone)]
pub struct ResourceDescriptor {
  pub property: String,
  pub url: Option<String>,
  pub(crate) slot: Slot<String>,
}

impl ResourceDescriptor {
  pub fn new<B>(property: impl Into<String>, field: fn(&B) -> &ResourceText) -> Self
  where
    B: Any + Send + Sync,
  {
    let slot = Slot {
      is_empty: Arc::new(move |bean: &Instance| -> std::result::Result<bool, SlotError> {
        Ok(!field(bean_ref::<B>(bean)?).is_loaded())
      }),
      fill: Arc::new(move |bean: &Instance, text: String| -> std::result::Result<(), SlotError> {
        if field(bean_ref::<B>(bean)?).cell.set(text).is_ok() {
          Ok(())
        } else {
          Err(SlotError::Occupied)
        }
      }),
    };
    Self {
      property: property.into(),
      url: None,
      slot,
    }
  }

  pub fn url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }
}

impl fmt::Debug for ResourceDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceDescriptor")
      .field("property", &self.property)
      .field("url", &self.url)
      .finish()
  }
}

// --- Hooks ---

pub(crate) type SyncHookFn = Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type AsyncHookFn = Arc<dyn Fn(Instance) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A named synchronous hook: a disposer or a pre-destroy hook.
#[derive(Clone)]
pub struct Hook {
  pub name: String,
  pub(crate) call: SyncHookFn,
}

impl Hook {
  pub fn new<B, F>(name: impl Into<String>, hook: F) -> Self
  where
    B: Any + Send + Sync,
    F: Fn(&B) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let call = move |bean: &Instance| -> Result<(), BoxError> {
      let bean = bean.downcast_ref::<B>().ok_or_else(|| wrong_type::<B>(bean))?;
      hook(bean)
    };
    Self {
      name: name.into(),
      call: Arc::new(call),
    }
  }
}

impl fmt::Debug for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Hook({})", self.name)
  }
}

/// A post-construct hook, awaited before the bean is handed out.
#[derive(Clone)]
pub struct PostConstruct {
  pub name: String,
  pub(crate) call: AsyncHookFn,
}

impl PostConstruct {
  pub fn new<B, F>(name: impl Into<String>, hook: F) -> Self
  where
    B: Any + Send + Sync,
    F: Fn(&B) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let call = move |bean: Instance| -> BoxFuture<'static, Result<(), BoxError>> {
      let outcome = match bean.downcast_ref::<B>() {
        Some(typed) => hook(typed),
        None => Err(wrong_type::<B>(&bean)),
      };
      futures_util::future::ready(outcome).boxed()
    };
    Self {
      name: name.into(),
      call: Arc::new(call),
    }
  }

  pub fn new_async<B, F, Fut>(name: impl Into<String>, hook: F) -> Self
  where
    B: Any + Send + Sync,
    F: Fn(Arc<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
  {
    let call = move |bean: Instance| -> BoxFuture<'static, Result<(), BoxError>> {
      match bean.downcast::<B>() {
        Some(typed) => hook(typed).boxed(),
        None => futures_util::future::ready(Err(wrong_type::<B>(&bean))).boxed(),
      }
    };
    Self {
      name: name.into(),
      call: Arc::new(call),
    }
  }
}

impl fmt::Debug for PostConstruct {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PostConstruct({})", self.name)
  }
}

fn wrong_type<B>(bean: &Instance) -> BoxError {
  format!(
    "expected bean of type {}, found {}",
    std::any::type_name::<B>(),
    bean.type_name()
  )
  .into()
}

// --- Factory methods ---

type MethodFn = Arc<dyn Fn(Instance) -> BoxFuture<'static, Result<Instance, BoxError>> + Send + Sync>;

/// A named method on a host object that produces a bean.
#[derive(Clone)]
pub struct FactoryMethod {
  pub name: String,
  pub(crate) call: MethodFn,
}

impl FactoryMethod {
  pub fn new<H, T, F>(name: impl Into<String>, method: F) -> Self
  where
    H: Any + Send + Sync,
    T: Any + Send + Sync,
    F: Fn(&H) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let call = move |host: Instance| -> BoxFuture<'static, Result<Instance, BoxError>> {
      let produced = match host.downcast_ref::<H>() {
        Some(typed) => method(typed).map(Instance::new),
        None => Err(wrong_type::<H>(&host)),
      };
      futures_util::future::ready(produced).boxed()
    };
    Self {
      name: name.into(),
      call: Arc::new(call),
    }
  }

  /// A factory method whose result is only available after awaiting.
  pub fn new_async<H, T, F, Fut>(name: impl Into<String>, method: F) -> Self
  where
    H: Any + Send + Sync,
    T: Any + Send + Sync,
    F: Fn(Arc<H>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
  {
    let call = move |host: Instance| -> BoxFuture<'static, Result<Instance, BoxError>> {
      match host.downcast::<H>() {
        Some(typed) => method(typed).map(|produced| produced.map(Instance::new)).boxed(),
        None => futures_util::future::ready(Err(wrong_type::<H>(&host))).boxed(),
      }
    };
    Self {
      name: name.into(),
      call: Arc::new(call),
    }
  }
}

impl fmt::Debug for FactoryMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "FactoryMethod({})", self.name)
  }
}

/// A bean declared by a configuration bean, produced by one of its methods.
#[derive(Clone, Debug)]
pub struct BeanMethod {
  pub token: Token,
  pub scope: Scope,
  pub method: FactoryMethod,
}

// --- Metadata and factory types ---

/// The static capability table of a factory type.
#[derive(Clone, Debug, Default)]
pub struct BeanMetadata {
  pub dependencies: Vec<Dependency>,
  pub resources: Vec<ResourceDescriptor>,
  pub disposers: Vec<Hook>,
  pub post_construct: Option<PostConstruct>,
  pub pre_destroy: Option<Hook>,
  pub beans: Vec<BeanMethod>,
}

type ConstructFn = Arc<dyn Fn(&Container) -> Result<Instance, BoxError> + Send + Sync>;

/// A constructible bean type together with its metadata.
#[derive(Clone)]
pub struct FactoryType {
  type_name: &'static str,
  construct: ConstructFn,
  metadata: BeanMetadata,
}

impl FactoryType {
  /// Starts declaring a factory type. The constructor receives the owning container.
  pub fn builder<B, F>(construct: F) -> FactoryTypeBuilder<B>
  where
    B: Any + Send + Sync,
    F: Fn(&Container) -> Result<B, BoxError> + Send + Sync + 'static,
  {
    FactoryTypeBuilder {
      factory: FactoryType {
        type_name: std::any::type_name::<B>(),
        construct: Arc::new(move |container: &Container| construct(container).map(Instance::new)),
        metadata: BeanMetadata::default(),
      },
      _bean: PhantomData,
    }
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn metadata(&self) -> &BeanMetadata {
    &self.metadata
  }

  pub(crate) fn construct(&self, container: &Container) -> Result<Instance, BoxError> {
    (self.construct)(container)
  }
}

impl fmt::Debug for FactoryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FactoryType")
      .field("type_name", &self.type_name)
      .field("metadata", &self.metadata)
      .finish()
  }
}

/// Typed builder for [`FactoryType`].
pub struct FactoryTypeBuilder<B> {
  factory: FactoryType,
  _bean: PhantomData<fn() -> B>,
}

impl<B: Any + Send + Sync> FactoryTypeBuilder<B> {
  /// Autowires `property` with the bean resolved from `target`.
  pub fn autowire<T: Any + Send + Sync>(
    self,
    property: &str,
    field: fn(&B) -> &Autowired<T>,
    target: impl Into<Identifier>,
  ) -> Self {
    self.dependency(Dependency::new(property, field).target(target))
  }

  pub fn dependency(mut self, dependency: Dependency) -> Self {
    self.factory.metadata.dependencies.push(dependency);
    self
  }

  pub fn resource(self, property: &str, field: fn(&B) -> &ResourceText, url: impl Into<String>) -> Self {
    self.resource_descriptor(ResourceDescriptor::new(property, field).url(url))
  }

  pub fn resource_descriptor(mut self, resource: ResourceDescriptor) -> Self {
    self.factory.metadata.resources.push(resource);
    self
  }

  pub fn disposer<F>(mut self, name: &str, disposer: F) -> Self
  where
    F: Fn(&B) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.factory.metadata.disposers.push(Hook::new(name, disposer));
    self
  }

  pub fn post_construct<F>(mut self, name: &str, hook: F) -> Self
  where
    F: Fn(&B) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.factory.metadata.post_construct = Some(PostConstruct::new(name, hook));
    self
  }

  pub fn post_construct_async<F, Fut>(mut self, name: &str, hook: F) -> Self
  where
    F: Fn(Arc<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
  {
    self.factory.metadata.post_construct = Some(PostConstruct::new_async(name, hook));
    self
  }

  pub fn pre_destroy<F>(mut self, name: &str, hook: F) -> Self
  where
    F: Fn(&B) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.factory.metadata.pre_destroy = Some(Hook::new(name, hook));
    self
  }

  /// Declares a bean produced by `method` on instances of this type.
  /// Instantiating this type registers the declared bean with the registry.
  pub fn declare_bean<T, F>(self, token: &Token, scope: Scope, name: &str, method: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&B) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    self.declare(token, scope, FactoryMethod::new(name, method))
  }

  pub fn declare_bean_async<T, F, Fut>(self, token: &Token, scope: Scope, name: &str, method: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(Arc<B>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
  {
    self.declare(token, scope, FactoryMethod::new_async(name, method))
  }

  fn declare(self, token: &Token, scope: Scope, method: FactoryMethod) -> Self {
    self.bean_method(BeanMethod {
      token: token.clone(),
      scope,
      method,
    })
  }

  /// Declares a bean from a prepared [`BeanMethod`].
  pub fn bean_method(mut self, bean: BeanMethod) -> Self {
    self.factory.metadata.beans.push(bean);
    self
  }

  pub fn build(self) -> FactoryType {
    self.factory
  }
}

// --- Definitions ---

/// Describes how to produce the bean named by `token`.
///
/// Exactly one of `bean` (a host object, used with `factory_property`) and
/// `factory` must be set; anything else is rejected when the bean is built.
#[derive(Clone)]
pub struct BeanDefinition {
  pub token: Token,
  pub scope: Scope,
  pub bean: Option<Instance>,
  pub factory: Option<FactoryType>,
  pub factory_property: Option<FactoryMethod>,
  pub resolver: Option<Identifier>,
}

impl BeanDefinition {
  /// A definition with neither a host object nor a factory type.
  pub fn new(token: &Token, scope: Scope) -> Self {
    Self {
      token: token.clone(),
      scope,
      bean: None,
      factory: None,
      factory_property: None,
      resolver: None,
    }
  }

  /// A definition built by a factory type.
  pub fn from_factory(token: &Token, scope: Scope, factory: FactoryType) -> Self {
    Self {
      factory: Some(factory),
      ..Self::new(token, scope)
    }
  }

  /// A definition produced by calling `method` on `host`.
  pub fn from_method(token: &Token, scope: Scope, host: Instance, method: FactoryMethod) -> Self {
    Self {
      bean: Some(host),
      factory_property: Some(method),
      ..Self::new(token, scope)
    }
  }

  /// Names the resolver bean asked for dynamic dependency keys.
  pub fn with_resolver(mut self, resolver: impl Into<Identifier>) -> Self {
    self.resolver = Some(resolver.into());
    self
  }

  pub(crate) fn validate(&self) -> Result<()> {
    match (&self.bean, &self.factory) {
      (Some(_), Some(_)) => Err(Error::InvalidDefinition {
        token: self.token.clone(),
        reason: "both a host bean and a factory type are set",
      }),
      (None, None) => Err(Error::InvalidDefinition {
        token: self.token.clone(),
        reason: "neither a host bean nor a factory type is set",
      }),
      _ => Ok(()),
    }
  }
}

impl fmt::Debug for BeanDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BeanDefinition")
      .field("token", &self.token)
      .field("scope", &self.scope)
      .field("bean", &self.bean)
      .field("factory", &self.factory.as_ref().map(FactoryType::type_name))
      .field("factory_property", &self.factory_property)
      .field("resolver", &self.resolver)
      .finish()
  }
}
