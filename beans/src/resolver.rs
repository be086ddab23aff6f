//! The resolver-bean seam used for dynamic dependency mapping.

use crate::core::{Identifier, Instance, Key};
use crate::error::BoxError;
use async_trait::async_trait;

/// A bean that supplies extra mapping entries while another bean is autowired.
///
/// Register implementations as trait objects so the container can find them:
///
/// ```
/// use fibre_beans::{DependencyResolver, Identifier, Instance, Key, BoxError};
/// use std::sync::Arc;
///
/// struct ByTenant;
///
/// #[fibre_beans::async_trait]
/// impl DependencyResolver for ByTenant {
///   async fn resolve(
///     &self,
///     key: &str,
///     _bean: &Instance,
///   ) -> Result<Option<Vec<(Key, Identifier)>>, BoxError> {
///     Ok(Some(vec![(Key::from("store"), Identifier::from(format!("store.{}", key)))]))
///   }
/// }
///
/// let resolver = Instance::from_trait::<dyn DependencyResolver>(Arc::new(ByTenant));
/// assert!(resolver.downcast_trait::<dyn DependencyResolver>().is_some());
/// ```
#[async_trait]
pub trait DependencyResolver: Send + Sync {
  /// Returns mapping entries for the dependency tagged `key` on `bean`, or
  /// `None` to leave the mapping as it is.
  async fn resolve(&self, key: &str, bean: &Instance) -> Result<Option<Vec<(Key, Identifier)>>, BoxError>;
}
