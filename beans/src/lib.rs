//! # Fibre Beans
//!
//! An async, hierarchical bean container for Rust.
//!
//! Beans are described up front by [`BeanDefinition`]s held in a shared
//! [`Registry`]. A [`Container`] builds them on demand, wires their
//! dependencies, loads their resources, runs their lifecycle hooks and caches
//! them according to their [`Scope`].
//!
//! ## Core Concepts
//!
//! - **Tokens and aliases**: a [`Token`] names a bean definition and is compared
//!   by identity; an alias is a plain string that the path mapping redirects.
//! - **Path mapping**: each container maps aliases and tokens to other
//!   identifiers, to lazy [`FactoryBean`] wrappers, or to live instances.
//!   Unresolved lookups fall back to the parent container.
//! - **Scopes**: `singleton` (one per container), `global` (one per registry)
//!   and `prototype` (fresh on every lookup).
//! - **Metadata**: a [`FactoryType`] declares autowired properties, resource
//!   properties, disposers, post-construct and pre-destroy hooks, and further
//!   beans produced by its methods.
//! - **Lifecycle**: `start`, `stop` and `close` drive disposal and destruction
//!   of cached beans.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_beans::{Autowired, BeanDefinition, Container, FactoryType, Registry, Scope, Token};
//!
//! struct Database {
//!   url: String,
//! }
//!
//! struct Repository {
//!   db: Autowired<Database>,
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!   let db = Token::new("db");
//!   let repository = Token::new("repository");
//!
//!   let registry = Registry::with_definitions([
//!     BeanDefinition::from_factory(
//!       &db,
//!       Scope::Singleton,
//!       FactoryType::builder(|_| Ok(Database { url: "memory://".to_string() })).build(),
//!     ),
//!     BeanDefinition::from_factory(
//!       &repository,
//!       Scope::Prototype,
//!       FactoryType::builder(|_| Ok(Repository { db: Autowired::new() }))
//!         .autowire("db", |r| &r.db, "database")
//!         .build(),
//!     ),
//!   ]);
//!
//!   let container = Container::new(registry);
//!   container.set("database", &db).unwrap();
//!
//!   let repo = container.get::<Repository>(&repository).await.unwrap();
//!   assert_eq!(repo.db.get().unwrap().url, "memory://");
//! }
//! ```

mod config;
mod container;
mod core;
mod definition;
mod error;
mod lifecycle;
mod macros;
mod mapping;
mod registry;
mod resolver;
mod resource;
mod wiring;

pub use crate::config::ContainerConfig;
pub use crate::container::{Container, ContainerBuilder};
pub use crate::core::{FactoryBean, Identifier, Instance, Key, Token};
pub use crate::definition::{
  Autowired, BeanDefinition, BeanMetadata, BeanMethod, Dependency, FactoryMethod, FactoryType, FactoryTypeBuilder,
  Hook, PostConstruct, ResourceDescriptor, ResourceText, Scope,
};
pub use crate::error::{BoxError, Error, ErrorKind, Result};
pub use crate::mapping::PathMapping;
pub use crate::registry::Registry;
pub use crate::resolver::DependencyResolver;
pub use crate::resource::{NoResources, ResourceLoader, StaticResources};

pub use async_trait::async_trait;
