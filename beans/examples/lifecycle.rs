use fibre_beans::{Autowired, BeanDefinition, Container, FactoryType, Registry, Scope, StaticResources, Token};
use fibre_beans::ResourceText;

struct ConnectionPool {
  size: usize,
}

struct ReportService {
  pool: Autowired<ConnectionPool>,
  template: ResourceText,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new("fibre_beans=debug"))
    .init();

  let pool = Token::new("pool");
  let reports = Token::new("reports");

  let registry = Registry::with_definitions([
    BeanDefinition::from_factory(
      &pool,
      Scope::Singleton,
      FactoryType::builder(|_| Ok(ConnectionPool { size: 4 }))
        .disposer("drain", |p: &ConnectionPool| {
          println!("Draining {} connections", p.size);
          Ok(())
        })
        .pre_destroy("close", |_: &ConnectionPool| {
          println!("Pool closed");
          Ok(())
        })
        .build(),
    ),
    BeanDefinition::from_factory(
      &reports,
      Scope::Singleton,
      FactoryType::builder(|_| {
        Ok(ReportService {
          pool: Autowired::new(),
          template: ResourceText::new(),
        })
      })
      .autowire("pool", |r| &r.pool, "pool")
      .resource("template", |r| &r.template, "mem://report")
      .post_construct("announce", |r: &ReportService| {
        println!("ReportService ready with template {:?}", r.template.get());
        Ok(())
      })
      .pre_destroy("flush", |_: &ReportService| {
        println!("Flushing pending reports");
        Ok(())
      })
      .build(),
    ),
  ]);

  let container = Container::builder()
    .name("app")
    .registry(registry)
    .loader(StaticResources::new().with("mem://report", "Report for {day}"))
    .build()
    .expect("valid configuration");
  container.set("pool", &pool).unwrap();

  container.start().unwrap();
  let service = container.get::<ReportService>(&reports).await.unwrap();
  println!(
    "Pool size seen by the service: {}",
    service.pool.get().map(|p| p.size).unwrap_or_default()
  );

  // Disposers run for every bean before any pre-destroy hook.
  container.stop().unwrap();
  assert_eq!(container.cached_len(), 0);

  container.close().unwrap();
  assert!(container.start().is_err());
}
