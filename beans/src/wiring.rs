//! Building beans from their definitions: instantiation, autowiring,
//! resource injection, configuration-bean expansion and post-construct.

use crate::container::Container;
use crate::core::{Instance, Key, Token};
use crate::definition::{BeanDefinition, BeanMetadata, Scope, SlotError};
use crate::error::{Error, Result};
use crate::mapping::PathMapping;
use crate::resolver::DependencyResolver;
use tracing::{debug, warn};

impl Container {
  /// Produces the bean for `token` according to its definition and scope.
  pub(crate) async fn build_by_token(
    &self,
    token: &Token,
    required: bool,
    extra: &PathMapping,
    depth: usize,
  ) -> Result<Option<Instance>> {
    let max_depth = self.inner.config.max_resolution_depth;
    if depth > max_depth {
      return Err(Error::DepthExceeded {
        key: token.to_string(),
        max_depth,
      });
    }

    let definition = match self.inner.registry.definition(token) {
      Some(definition) => definition,
      None if required => return Err(Error::NoDefinition(token.clone())),
      None => return Ok(None),
    };
    definition.validate()?;

    let instance = match definition.scope {
      Scope::Singleton => {
        let key = Key::Token(token.clone());
        if let Some(existing) = self.inner.cached(&key) {
          return Ok(Some(existing));
        }
        let fresh = self.instantiate(&definition).await?;
        let stored = self.inner.cache_instance(key, fresh.clone(), &definition);
        if !stored.ptr_eq(&fresh) {
          warn!(container = %self.name(), %token, "Lost singleton construction race, using the cached bean");
          return Ok(Some(stored));
        }
        fresh
      }
      Scope::Global => {
        if let Some(existing) = self.inner.registry.global_instance(token) {
          return Ok(Some(existing));
        }
        let fresh = self.instantiate(&definition).await?;
        let stored = self.inner.registry.cache_global(token, fresh.clone());
        if !stored.ptr_eq(&fresh) {
          warn!(container = %self.name(), %token, "Lost global construction race, using the stored bean");
          return Ok(Some(stored));
        }
        fresh
      }
      Scope::Prototype => {
        let fresh = self.instantiate(&definition).await?;
        let key = Key::Token(Token::anonymous(token));
        self.inner.cache_instance(key, fresh.clone(), &definition);
        fresh
      }
    };

    if let Some(factory) = &definition.factory {
      let metadata = factory.metadata();
      self.autowire_at(&instance, &definition, extra, depth).await?;
      self.inject_resources(&instance, &definition).await?;
      self.register_declared_beans(&instance, metadata)?;
      if let Some(hook) = &metadata.post_construct {
        (hook.call)(instance.clone()).await.map_err(|source| Error::Hook {
          key: Key::Token(token.clone()),
          hook: hook.name.clone(),
          source,
        })?;
      }
    }

    debug!(container = %self.name(), %token, scope = %definition.scope, "Bean built");
    Ok(Some(instance))
  }

  async fn instantiate(&self, definition: &BeanDefinition) -> Result<Instance> {
    let token = &definition.token;
    if let Some(factory) = &definition.factory {
      return factory.construct(self).map_err(|source| Error::Construction {
        token: token.clone(),
        source,
      });
    }

    let host = definition.bean.clone().ok_or_else(|| Error::InvalidDefinition {
      token: token.clone(),
      reason: "a factory property requires a host bean",
    })?;
    let method = definition.factory_property.as_ref().ok_or_else(|| Error::InvalidDefinition {
      token: token.clone(),
      reason: "a host bean requires a factory property",
    })?;
    (method.call)(host).await.map_err(|source| Error::Construction {
      token: token.clone(),
      source,
    })
  }

  /// Fills every autowired property of `bean` declared by `definition`'s factory type.
  ///
  /// Fails with [`Error::AlreadyPopulated`] if any of those properties is
  /// already set, so wiring the same bean twice is an error.
  pub async fn autowire(&self, bean: &Instance, definition: &BeanDefinition, extra: &PathMapping) -> Result<()> {
    self.autowire_at(bean, definition, extra, 0).await
  }

  async fn autowire_at(
    &self,
    bean: &Instance,
    definition: &BeanDefinition,
    extra: &PathMapping,
    depth: usize,
  ) -> Result<()> {
    let Some(factory) = &definition.factory else {
      return Ok(());
    };
    let token = &definition.token;

    for dependency in &factory.metadata().dependencies {
      let property = &dependency.property;
      match (dependency.slot.is_empty)(bean) {
        Ok(true) => {}
        Ok(false) => return Err(slot_error(token, property, SlotError::Occupied)),
        Err(error) => return Err(slot_error(token, property, error)),
      }
      let wished = dependency
        .wished
        .clone()
        .ok_or_else(|| Error::MissingDependencyTarget {
          token: token.clone(),
          property: property.clone(),
        })?;

      let merged;
      let working = match &dependency.resolve_key {
        Some(resolve_key) => {
          let resolver_id = definition.resolver.clone().ok_or_else(|| Error::MissingResolver {
            token: token.clone(),
            property: property.clone(),
            key: resolve_key.clone(),
          })?;
          let describe = resolver_id.describe();
          let resolver = self
            .get_bean_inner(resolver_id, true, extra, depth + 1)
            .await?
            .and_then(|instance| instance.downcast_trait::<dyn DependencyResolver>())
            .ok_or_else(|| Error::NotAResolver(describe))?;
          let entries = resolver
            .resolve(resolve_key, bean)
            .await
            .map_err(|source| Error::Resolver {
              key: resolve_key.clone(),
              source,
            })?;
          match entries {
            Some(entries) => {
              debug!(container = %self.name(), %token, key = %resolve_key, entries = entries.len(), "Resolver supplied mapping entries");
              merged = extra.merged(entries);
              &merged
            }
            None => extra,
          }
        }
        None => extra,
      };

      let value = self
        .get_bean_inner(wished, dependency.required, working, depth + 1)
        .await?;
      (dependency.slot.fill)(bean, value).map_err(|error| slot_error(token, property, error))?;
    }
    Ok(())
  }

  /// Loads every resource property of `bean` declared by `definition`'s factory type.
  pub async fn inject_resources(&self, bean: &Instance, definition: &BeanDefinition) -> Result<()> {
    let Some(factory) = &definition.factory else {
      return Ok(());
    };
    let token = &definition.token;

    for resource in &factory.metadata().resources {
      let property = &resource.property;
      match (resource.slot.is_empty)(bean) {
        Ok(true) => {}
        Ok(false) => return Err(slot_error(token, property, SlotError::Occupied)),
        Err(error) => return Err(slot_error(token, property, error)),
      }
      let url = resource.url.as_deref().ok_or_else(|| Error::MissingResourceUrl {
        token: token.clone(),
        property: property.clone(),
      })?;
      let text = self.get_resource(url).await?;
      (resource.slot.fill)(bean, text).map_err(|error| slot_error(token, property, error))?;
    }
    Ok(())
  }

  /// Registers the beans declared by a configuration bean and drops any
  /// placeholder mapping entries under their tokens.
  fn register_declared_beans(&self, host: &Instance, metadata: &BeanMetadata) -> Result<()> {
    if metadata.beans.is_empty() {
      return Ok(());
    }
    let mut mapping = self.inner.mapping.write();
    let mapping = mapping.as_mut().ok_or(Error::Closed)?;
    for declared in &metadata.beans {
      let definition =
        BeanDefinition::from_method(&declared.token, declared.scope, host.clone(), declared.method.clone());
      if self.inner.registry.register_if_absent(definition) {
        debug!(container = %self.name(), token = %declared.token, method = %declared.method.name, "Registered declared bean");
      }
      mapping.unset(&Key::Token(declared.token.clone()));
    }
    Ok(())
  }
}

fn slot_error(token: &Token, property: &str, error: SlotError) -> Error {
  match error {
    SlotError::Occupied => Error::AlreadyPopulated {
      token: token.clone(),
      property: property.to_string(),
    },
    SlotError::WrongBean(expected) => Error::TypeMismatch {
      key: token.to_string(),
      expected,
    },
    SlotError::WrongValue(expected) => Error::TypeMismatch {
      key: format!("{}.{}", token, property),
      expected,
    },
  }
}
