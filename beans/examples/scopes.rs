use fibre_beans::{resolve, BeanDefinition, Container, FactoryType, Registry, Scope, Token};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple bean that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

// A global, thread-safe counter to generate unique IDs.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn tracker(label: &'static str) -> FactoryType {
  FactoryType::builder(move |_| {
    println!("Creating {} RequestTracker...", label);
    Ok(RequestTracker {
      id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
    })
  })
  .build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let singleton = Token::new("singleton_tracker");
  let prototype = Token::new("prototype_tracker");
  let global = Token::new("global_tracker");

  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&singleton, Scope::Singleton, tracker("SINGLETON")),
    BeanDefinition::from_factory(&prototype, Scope::Prototype, tracker("PROTOTYPE")),
    BeanDefinition::from_factory(&global, Scope::Global, tracker("GLOBAL")),
  ]);
  let first = Container::new(registry.clone());
  let second = Container::new(registry);

  println!("--- Resolving Singletons ---");
  let s1 = resolve!(first, RequestTracker, &singleton);
  let s2 = resolve!(first, RequestTracker, &singleton);
  println!("Singleton 1 ID: {}, Singleton 2 ID: {}", s1.id, s2.id);
  assert!(Arc::ptr_eq(&s1, &s2), "Singleton instances should be identical");
  let other = resolve!(second, RequestTracker, &singleton);
  assert!(
    !Arc::ptr_eq(&s1, &other),
    "Each container owns its singletons"
  );
  println!("Singletons are shared within a container only, as expected.\n");

  println!("--- Resolving Prototypes ---");
  let p1 = resolve!(first, RequestTracker, &prototype);
  let p2 = resolve!(first, RequestTracker, &prototype);
  println!("Prototype 1 ID: {}, Prototype 2 ID: {}", p1.id, p2.id);
  assert!(!Arc::ptr_eq(&p1, &p2), "Prototype instances should be different");
  println!("Prototype instances are different pointers, as expected.\n");

  println!("--- Resolving Globals ---");
  let g1 = resolve!(first, RequestTracker, &global);
  let g2 = resolve!(second, RequestTracker, &global);
  println!("Global 1 ID: {}, Global 2 ID: {}", g1.id, g2.id);
  assert!(Arc::ptr_eq(&g1, &g2), "Global instances are shared by every container");
  println!("Global instances are the same pointer across containers, as expected.");
}
