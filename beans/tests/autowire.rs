use fibre_beans::{
  async_trait, Autowired, BeanDefinition, BoxError, Container, Dependency, DependencyResolver, Error, ErrorKind,
  FactoryType, Identifier, Instance, Key, PathMapping, Registry, ResourceDescriptor, ResourceText, Scope,
  StaticResources, Token,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

struct Store {
  label: &'static str,
}

struct Service {
  store: Autowired<Store>,
}

impl Service {
  fn new() -> Self {
    Self { store: Autowired::new() }
  }
}

fn store_factory(label: &'static str) -> FactoryType {
  FactoryType::builder(move |_| Ok(Store { label })).build()
}

// --- Dependencies ---

#[tokio::test]
async fn test_dependency_is_wired_through_the_mapping() {
  // Arrange
  let store = Token::new("store");
  let service = Token::new("service");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&store, Scope::Singleton, store_factory("main")),
    BeanDefinition::from_factory(
      &service,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Service::new()))
        .autowire("store", |s| &s.store, "store")
        .build(),
    ),
  ]);
  let container = Container::new(registry);
  container.set("store", &store).unwrap();

  // Act
  let bean = container.get::<Service>(&service).await.unwrap();

  // Assert
  let wired = bean.store.get().unwrap();
  assert_eq!(wired.label, "main");
  let direct = container.get::<Store>(&store).await.unwrap();
  assert!(Arc::ptr_eq(&wired, &direct));
}

#[tokio::test]
async fn test_optional_dependency_may_stay_empty() {
  // Arrange
  let service = Token::new("service");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &service,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Service::new()))
      .dependency(Dependency::new("store", |s: &Service| &s.store).target("store").optional())
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let bean = container.get::<Service>(&service).await.unwrap();

  // Assert
  assert!(bean.store.is_wired());
  assert!(bean.store.get().is_none());
}

#[tokio::test]
async fn test_required_dependency_must_resolve() {
  // Arrange
  let service = Token::new("service");
  let missing = Token::new("missing");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &service,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Service::new()))
      .autowire("store", |s| &s.store, &missing)
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&service).await.unwrap_err();

  // Assert
  assert!(matches!(error, Error::NoDefinition(t) if t == missing));
}

#[tokio::test]
async fn test_dependency_without_target_is_a_configuration_error() {
  // Arrange
  let service = Token::new("service");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &service,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Service::new()))
      .dependency(Dependency::new("store", |s: &Service| &s.store))
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&service).await.unwrap_err();

  // Assert
  assert!(matches!(&error, Error::MissingDependencyTarget { property, .. } if property == "store"));
  assert_eq!(error.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_autowiring_twice_is_rejected() {
  // Arrange
  let store = Token::new("store");
  let service = Token::new("service");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&store, Scope::Singleton, store_factory("main")),
    BeanDefinition::from_factory(
      &service,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Service::new()))
        .autowire("store", |s| &s.store, &store)
        .build(),
    ),
  ]);
  let container = Container::new(registry.clone());
  let bean = container.get_bean(&service).await.unwrap();
  let definition = registry.definition(&service).unwrap();

  // Act
  let error = container
    .autowire(&bean, &definition, &PathMapping::new())
    .await
    .unwrap_err();

  // Assert
  assert!(matches!(&error, Error::AlreadyPopulated { property, .. } if property == "store"));
  assert_eq!(error.kind(), ErrorKind::State);
}

#[tokio::test]
async fn test_pre_populated_property_is_rejected() {
  // Arrange
  let store = Token::new("store");
  let service = Token::new("service");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&store, Scope::Singleton, store_factory("main")),
    BeanDefinition::from_factory(
      &service,
      Scope::Singleton,
      FactoryType::builder(|_| {
        Ok(Service {
          store: Autowired::wired(Arc::new(Store { label: "by hand" })),
        })
      })
      .autowire("store", |s| &s.store, &store)
      .build(),
    ),
  ]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&service).await.unwrap_err();

  // Assert
  assert!(matches!(error, Error::AlreadyPopulated { .. }));
}

struct Node {
  name: &'static str,
  peer: Autowired<Node>,
}

#[tokio::test]
async fn test_singletons_may_depend_on_each_other() {
  // Arrange
  let left = Token::new("left");
  let right = Token::new("right");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(
      &left,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Node { name: "left", peer: Autowired::new() }))
        .autowire("peer", |n| &n.peer, &right)
        .build(),
    ),
    BeanDefinition::from_factory(
      &right,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Node { name: "right", peer: Autowired::new() }))
        .autowire("peer", |n| &n.peer, &left)
        .build(),
    ),
  ]);
  let container = Container::new(registry);

  // Act
  let left_bean = container.get::<Node>(&left).await.unwrap();

  // Assert
  let right_bean = left_bean.peer.get().unwrap();
  assert_eq!(right_bean.name, "right");
  assert!(Arc::ptr_eq(&right_bean.peer.get().unwrap(), &left_bean));
}

trait Clock: Send + Sync {
  fn now(&self) -> u64;
}

struct FixedClock;

impl Clock for FixedClock {
  fn now(&self) -> u64 {
    1_000
  }
}

struct Scheduler {
  clock: Autowired<dyn Clock>,
}

#[tokio::test]
async fn test_trait_object_dependency() {
  // Arrange
  let scheduler = Token::new("scheduler");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &scheduler,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Scheduler { clock: Autowired::new() }))
      .dependency(Dependency::of_trait("clock", |s: &Scheduler| &s.clock).target("clock"))
      .build(),
  )]);
  let container = Container::new(registry);
  let clock: Arc<dyn Clock> = Arc::new(FixedClock);
  container.set("clock", Instance::from_trait(clock)).unwrap();

  // Act
  let bean = container.get::<Scheduler>(&scheduler).await.unwrap();

  // Assert
  assert_eq!(bean.clock.get().unwrap().now(), 1_000);
}

// --- Resolver beans ---

struct TenantResolver {
  target: Token,
}

#[async_trait]
impl DependencyResolver for TenantResolver {
  async fn resolve(&self, key: &str, _bean: &Instance) -> Result<Option<Vec<(Key, Identifier)>>, BoxError> {
    match key {
      "tenant" => Ok(Some(vec![(Key::from("store"), Identifier::from(&self.target))])),
      _ => Ok(None),
    }
  }
}

fn resolver_setup(resolve_key: &str) -> (Container, Token) {
  let shared = Token::new("shared");
  let tenant = Token::new("tenant");
  let service = Token::new("service");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&shared, Scope::Singleton, store_factory("shared")),
    BeanDefinition::from_factory(&tenant, Scope::Singleton, store_factory("tenant")),
    BeanDefinition::from_factory(
      &service,
      Scope::Prototype,
      FactoryType::builder(|_| Ok(Service::new()))
        .dependency(
          Dependency::new("store", |s: &Service| &s.store)
            .target("store")
            .resolve_key(resolve_key),
        )
        .build(),
    )
    .with_resolver("resolver"),
  ]);
  let container = Container::new(registry);
  let resolver: Arc<dyn DependencyResolver> = Arc::new(TenantResolver { target: tenant });
  container.set("resolver", Instance::from_trait(resolver)).unwrap();
  (container, service)
}

#[tokio::test]
async fn test_resolver_entries_override_the_extra_mapping() {
  // Arrange
  let (container, service) = resolver_setup("tenant");
  let unused = Token::new("unused");
  let extra = PathMapping::new().with("store", &unused);

  // Act
  let bean = container.get_bean_with(&service, true, &extra).await.unwrap().unwrap();

  // Assert
  let bean = bean.downcast::<Service>().unwrap();
  assert_eq!(bean.store.get().unwrap().label, "tenant");
}

#[tokio::test]
async fn test_resolver_without_entries_falls_back_to_the_mapping() {
  // Arrange
  let (container, service) = resolver_setup("other");
  let registry = container.registry().clone();
  let shared = Token::new("fallback");
  registry.register(BeanDefinition::from_factory(&shared, Scope::Singleton, store_factory("fallback")));
  container.set("store", &shared).unwrap();

  // Act
  let bean = container.get::<Service>(&service).await.unwrap();

  // Assert
  assert_eq!(bean.store.get().unwrap().label, "fallback");
}

#[tokio::test]
async fn test_dynamic_key_requires_a_resolver() {
  // Arrange
  let service = Token::new("service");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &service,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Service::new()))
      .dependency(
        Dependency::new("store", |s: &Service| &s.store)
          .target("store")
          .resolve_key("tenant"),
      )
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&service).await.unwrap_err();

  // Assert
  assert!(matches!(&error, Error::MissingResolver { key, .. } if key == "tenant"));
}

#[tokio::test]
async fn test_resolver_must_implement_the_resolver_trait() {
  // Arrange
  let (container, service) = resolver_setup("tenant");
  container.set("resolver", Instance::new(String::from("not a resolver"))).unwrap();

  // Act
  let error = container.get_bean(&service).await.unwrap_err();

  // Assert
  assert!(matches!(error, Error::NotAResolver(_)));
}

// --- Resources ---

struct Template {
  body: ResourceText,
}

#[tokio::test]
async fn test_resources_are_loaded_through_the_loader() {
  // Arrange
  let template = Token::new("template");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &template,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Template { body: ResourceText::new() }))
      .resource("body", |t| &t.body, "mem://greeting")
      .build(),
  )]);
  let container = Container::builder()
    .registry(registry)
    .loader(StaticResources::new().with("mem://greeting", "Hello, {name}!"))
    .build()
    .unwrap();

  // Act
  let bean = container.get::<Template>(&template).await.unwrap();

  // Assert
  assert_eq!(bean.body.get(), Some("Hello, {name}!"));
}

#[tokio::test]
async fn test_resource_without_url_is_a_configuration_error() {
  // Arrange
  let template = Token::new("template");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &template,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Template { body: ResourceText::new() }))
      .resource_descriptor(ResourceDescriptor::new("body", |t: &Template| &t.body))
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&template).await.unwrap_err();

  // Assert
  assert!(matches!(&error, Error::MissingResourceUrl { property, .. } if property == "body"));
}

#[tokio::test]
async fn test_loader_failures_surface_as_transport_errors() {
  // Arrange
  let template = Token::new("template");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &template,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Template { body: ResourceText::new() }))
      .resource("body", |t| &t.body, "mem://missing")
      .build(),
  )]);
  let container = Container::builder()
    .registry(registry)
    .loader(StaticResources::new())
    .build()
    .unwrap();

  // Act
  let error = container.get_bean(&template).await.unwrap_err();

  // Assert
  assert!(matches!(&error, Error::Transport { url, .. } if url == "mem://missing"));
  assert_eq!(error.kind(), ErrorKind::Transport);
}

// --- Configuration beans ---

struct Settings {
  prefix: &'static str,
}

#[derive(Debug)]
struct Greeting(String);

#[tokio::test]
async fn test_configuration_bean_registers_declared_beans() {
  // Arrange
  let settings = Token::new("settings");
  let greeting = Token::new("greeting");
  let farewell = Token::new("farewell");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &settings,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Settings { prefix: ">> " }))
      .declare_bean(&greeting, Scope::Singleton, "greeting", |s: &Settings| {
        Ok(Greeting(format!("{}hello", s.prefix)))
      })
      .declare_bean_async(&farewell, Scope::Prototype, "farewell", |s: Arc<Settings>| async move {
        Ok::<_, BoxError>(Greeting(format!("{}bye", s.prefix)))
      })
      .build(),
  )]);
  let container = Container::new(registry.clone());
  container.set(&greeting, "placeholder").unwrap();
  let before = container.get_bean_with(&farewell, false, &PathMapping::new()).await.unwrap();

  // Act
  container.get_bean(&settings).await.unwrap();
  let hello = container.get::<Greeting>(&greeting).await.unwrap();
  let bye_once = container.get::<Greeting>(&farewell).await.unwrap();
  let bye_twice = container.get::<Greeting>(&farewell).await.unwrap();

  // Assert
  assert!(before.is_none());
  assert_eq!(hello.0, ">> hello");
  assert_eq!(bye_once.0, ">> bye");
  assert!(!Arc::ptr_eq(&bye_once, &bye_twice));
  assert_eq!(registry.definitions_len(), 3);
  let declared = registry.definition(&greeting).unwrap();
  assert!(declared.factory.is_none() && declared.factory_property.is_some() && declared.resolver.is_none());
  // The placeholder mapping entry was dropped so the token reaches its definition.
  assert!(container.resolve_bean(&greeting, &PathMapping::new()).unwrap().is_some());
  assert!(container.unset(&greeting).unwrap().is_none());
}

#[tokio::test]
async fn test_declared_beans_do_not_replace_existing_definitions() {
  // Arrange
  let settings = Token::new("settings");
  let greeting = Token::new("greeting");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(
      &greeting,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Greeting("original".to_string()))).build(),
    ),
    BeanDefinition::from_factory(
      &settings,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Settings { prefix: "" }))
        .declare_bean(&greeting, Scope::Singleton, "greeting", |_: &Settings| {
          Ok(Greeting("declared".to_string()))
        })
        .build(),
    ),
  ]);
  let container = Container::new(registry.clone());

  // Act
  container.get_bean(&settings).await.unwrap();
  let greeting_bean = container.get::<Greeting>(&greeting).await.unwrap();

  // Assert
  assert_eq!(greeting_bean.0, "original");
  assert_eq!(registry.definitions_len(), 2);
}

// --- Post-construct ---

struct Pool {
  store: Autowired<Store>,
  ready: AtomicBool,
}

#[tokio::test]
async fn test_post_construct_runs_after_wiring() {
  // Arrange
  let store = Token::new("store");
  let pool = Token::new("pool");
  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(&store, Scope::Singleton, store_factory("main")),
    BeanDefinition::from_factory(
      &pool,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(Pool { store: Autowired::new(), ready: AtomicBool::new(false) }))
        .autowire("store", |p| &p.store, &store)
        .post_construct("warm_up", |p: &Pool| {
          if !p.store.is_wired() {
            return Err("store not wired".into());
          }
          p.ready.store(true, Ordering::SeqCst);
          Ok::<_, BoxError>(())
        })
        .build(),
    ),
  ]);
  let container = Container::new(registry);

  // Act
  let bean = container.get::<Pool>(&pool).await.unwrap();

  // Assert
  assert!(bean.ready.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_async_post_construct_is_awaited_once() {
  // Arrange
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let pool = Token::new("pool");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &pool,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Pool { store: Autowired::new(), ready: AtomicBool::new(false) }))
      .post_construct_async("connect", move |p: Arc<Pool>| {
        let counter = counter.clone();
        async move {
          tokio::task::yield_now().await;
          counter.fetch_add(1, Ordering::SeqCst);
          p.ready.store(true, Ordering::SeqCst);
          Ok::<_, BoxError>(())
        }
      })
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let first = container.get::<Pool>(&pool).await.unwrap();
  let second = container.get::<Pool>(&pool).await.unwrap();

  // Assert
  assert!(first.ready.load(Ordering::SeqCst));
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_post_construct_is_reported() {
  // Arrange
  let seen = Arc::new(Mutex::new(Vec::<&'static str>::new()));
  let log = seen.clone();
  let pool = Token::new("pool");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &pool,
    Scope::Singleton,
    FactoryType::builder(|_| Ok(Pool { store: Autowired::new(), ready: AtomicBool::new(false) }))
      .post_construct("verify", move |_: &Pool| {
        log.lock().push("verify");
        Err("not ready".into())
      })
      .build(),
  )]);
  let container = Container::new(registry);

  // Act
  let error = container.get_bean(&pool).await.unwrap_err();

  // Assert
  assert!(matches!(&error, Error::Hook { hook, .. } if hook == "verify"));
  assert_eq!(*seen.lock(), vec!["verify"]);
}
