use fibre_beans::{BeanDefinition, Container, FactoryType, Instance, Registry, Scope, Token};

struct DataSource {
  data: String,
}

// A function that resolves its data source through whatever container it is given.
// By accepting a `&Container`, it can be tested with a controlled environment.
async fn process_data(container: &Container) -> String {
  let source = container
    .get::<DataSource>("data_source")
    .await
    .expect("Data source not found in container");
  format!("Processed: {}", source.data.to_uppercase())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  let production = Token::new("production_source");
  let registry = Registry::with_definitions([BeanDefinition::from_factory(
    &production,
    Scope::Singleton,
    FactoryType::builder(|_| {
      Ok(DataSource {
        data: "production data".to_string(),
      })
    })
    .build(),
  )]);

  let application = Container::builder()
    .name("application")
    .registry(registry)
    .build()
    .expect("valid configuration");
  application.set("data_source", &production).unwrap();

  // --- Child container overriding one alias ---
  println!("--- Running with a child container ---");
  let test_container = application.child("test");
  test_container
    .set(
      "data_source",
      Instance::new(DataSource {
        data: "test data".to_string(),
      }),
    )
    .unwrap();

  let result = process_data(&test_container).await;
  println!("Result: {}", result);
  assert_eq!(result, "Processed: TEST DATA");

  // --- Verify Isolation ---
  // The override registered in `test_container` must not leak into its parent.
  let parent_result = process_data(&application).await;
  println!("Parent result: {}", parent_result);
  assert_eq!(parent_result, "Processed: PRODUCTION DATA");

  // --- Delegation ---
  // A child without its own entry falls back to the parent's mapping.
  let request_container = application.child("request");
  let delegated = process_data(&request_container).await;
  assert_eq!(delegated, "Processed: PRODUCTION DATA");

  println!("\nVerified that child overrides stay local while lookups still delegate upward.");
}
