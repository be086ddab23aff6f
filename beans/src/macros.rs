//! Public macros for ergonomic bean resolution.

/// Resolves a required bean from a container, building it if needed.
///
/// Expands to an `.await`, so it can only be used inside async code. It
/// panics if the bean cannot be resolved or has the wrong type.
///
/// # Panics
///
/// This macro will panic if resolution fails. For a non-panicking version,
/// use `container.get::<T>(...)` or `container.get_trait::<dyn T>(...)` directly.
///
/// # Examples
///
/// ```
/// use fibre_beans::{resolve, BeanDefinition, Container, FactoryType, Registry, Scope, Token};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///   let token = Token::new("message");
///   let registry = Registry::with_definitions([BeanDefinition::from_factory(
///     &token,
///     Scope::Singleton,
///     FactoryType::builder(|_| Ok(String::from("hello"))).build(),
///   )]);
///   let container = Container::new(registry);
///
///   let message = resolve!(container, String, &token);
///   assert_eq!(*message, "hello");
/// }
/// ```
#[macro_export]
macro_rules! resolve {
  // Arm for resolving a trait object: resolve!(container, trait MyTrait, wished)
  ($container:expr, trait $trait_ident:ident, $wished:expr) => {
    $container
      .get_trait::<dyn $trait_ident>($wished)
      .await
      .unwrap_or_else(|e| {
        panic!(
          "Failed to resolve required bean {}: {}",
          std::any::type_name::<dyn $trait_ident>(),
          e
        )
      })
  };

  // Arm for resolving a concrete type: resolve!(container, MyBean, wished)
  ($container:expr, $type:ty, $wished:expr) => {
    $container
      .get::<$type>($wished)
      .await
      .unwrap_or_else(|e| panic!("Failed to resolve required bean {}: {}", std::any::type_name::<$type>(), e))
  };
}

/// Like [`resolve!`], but only returns beans that already exist. Does not await.
///
/// # Panics
///
/// Panics if the bean is missing, has not been instantiated, or has the wrong type.
#[macro_export]
macro_rules! resolve_cached {
  ($container:expr, $type:ty, $wished:expr) => {
    $container
      .get_cached::<$type>($wished)
      .unwrap_or_else(|e| panic!("Failed to resolve cached bean {}: {}", std::any::type_name::<$type>(), e))
  };
}
