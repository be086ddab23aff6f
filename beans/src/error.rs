use crate::core::{Key, Token};
use thiserror::Error;

/// A boxed error returned by user code: constructors, factory methods, hooks,
/// resolver beans and resource loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`Error`], so callers can branch on the kind of
/// failure without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// A bean definition, descriptor or mapping is malformed.
  Configuration,
  /// A requested bean could not be produced.
  Resolution,
  /// The container or a bean is in the wrong state for the operation.
  State,
  /// A user-supplied constructor, factory method or lifecycle hook failed.
  Hook,
  /// The resource loader failed to fetch a resource.
  Transport,
}

/// The main error type for the `fibre_beans` library.
#[derive(Debug, Error)]
pub enum Error {
  // --- Configuration ---
  #[error("Invalid bean definition for {token}: {reason}")]
  InvalidDefinition { token: Token, reason: &'static str },

  #[error("Bean {token} declares a dependency on property '{property}' without a target")]
  MissingDependencyTarget { token: Token, property: String },

  #[error("Bean {token} declares a resource on property '{property}' without a url")]
  MissingResourceUrl { token: Token, property: String },

  #[error("Bean {token} uses dynamic key '{key}' on '{property}' but has no resolver bean")]
  MissingResolver {
    token: Token,
    property: String,
    key: String,
  },

  #[error("Path mapping cycle detected: {chain}")]
  MappingCycle { chain: String },

  #[error("Resolution exceeded the maximum depth of {max_depth} while resolving {key}")]
  DepthExceeded { key: String, max_depth: usize },

  #[error("Invalid container configuration: {0}")]
  InvalidConfig(String),

  // --- Resolution ---
  #[error("No bean definition registered for {0}")]
  NoDefinition(Token),

  #[error("Alias '{0}' does not resolve to any bean")]
  UnresolvedAlias(String),

  #[error("Bean {0} has not been instantiated yet")]
  NotInstantiated(Token),

  #[error("Prototype bean {0} cannot be resolved through the cached path")]
  PrototypeNotCached(Token),

  #[error("Bean resolved for {key} is not of type {expected}")]
  TypeMismatch { key: String, expected: &'static str },

  #[error("{0} resolved to nothing")]
  NothingResolved(String),

  #[error("Resolver bean {0} does not implement DependencyResolver")]
  NotAResolver(String),

  // --- State ---
  #[error("Container is already running")]
  AlreadyRunning,

  #[error("Container is not running")]
  NotRunning,

  #[error("Container is not configured (it has been closed)")]
  Closed,

  #[error("Property '{property}' of bean {token} should not be pre-populated")]
  AlreadyPopulated { token: Token, property: String },

  #[error("No such bean instance in the container")]
  NoSuchInstance,

  // --- Hook ---
  #[error("Failed to construct bean {token}: {source}")]
  Construction {
    token: Token,
    #[source]
    source: BoxError,
  },

  #[error("Hook '{hook}' failed on bean at {key}: {source}")]
  Hook {
    key: Key,
    hook: String,
    #[source]
    source: BoxError,
  },

  #[error("Resolver bean failed for key '{key}': {source}")]
  Resolver {
    key: String,
    #[source]
    source: BoxError,
  },

  // --- Transport ---
  #[error("Failed to fetch resource '{url}': {source}")]
  Transport {
    url: String,
    #[source]
    source: BoxError,
  },
}

impl Error {
  /// Returns the coarse kind of this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidDefinition { .. }
      | Error::MissingDependencyTarget { .. }
      | Error::MissingResourceUrl { .. }
      | Error::MissingResolver { .. }
      | Error::MappingCycle { .. }
      | Error::DepthExceeded { .. }
      | Error::InvalidConfig(_) => ErrorKind::Configuration,

      Error::NoDefinition(_)
      | Error::UnresolvedAlias(_)
      | Error::NotInstantiated(_)
      | Error::PrototypeNotCached(_)
      | Error::TypeMismatch { .. }
      | Error::NothingResolved(_)
      | Error::NotAResolver(_) => ErrorKind::Resolution,

      Error::AlreadyRunning
      | Error::NotRunning
      | Error::Closed
      | Error::AlreadyPopulated { .. }
      | Error::NoSuchInstance => ErrorKind::State,

      Error::Construction { .. } | Error::Hook { .. } | Error::Resolver { .. } => ErrorKind::Hook,

      Error::Transport { .. } => ErrorKind::Transport,
    }
  }
}

/// A specialized `Result` type for `fibre_beans` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
