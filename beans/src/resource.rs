//! The resource loader seam.

use crate::error::BoxError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Fetches text content by url. Failures are propagated to the caller unchanged.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
  async fn fetch_resource(&self, url: &str) -> Result<String, BoxError>;
}

/// The loader used when none is configured; every fetch fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResources;

#[async_trait]
impl ResourceLoader for NoResources {
  async fn fetch_resource(&self, url: &str) -> Result<String, BoxError> {
    Err(format!("no resource loader configured to fetch '{}'", url).into())
  }
}

/// An in-memory loader serving fixed content per url.
#[derive(Debug, Default, Clone)]
pub struct StaticResources {
  entries: HashMap<String, String>,
}

impl StaticResources {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
    self.entries.insert(url.into(), content.into());
    self
  }
}

#[async_trait]
impl ResourceLoader for StaticResources {
  async fn fetch_resource(&self, url: &str) -> Result<String, BoxError> {
    self
      .entries
      .get(url)
      .cloned()
      .ok_or_else(|| format!("resource not found: {}", url).into())
  }
}
