//! Container configuration.

use crate::error::{Error, Result};
use serde::Deserialize;

fn default_name() -> String {
  "container".to_string()
}

fn default_detect_cycles() -> bool {
  true
}

fn default_max_resolution_depth() -> usize {
  64
}

/// Tunables for a [`Container`](crate::Container).
///
/// ```yaml
/// name: request
/// detect_cycles: true
/// max_resolution_depth: 32
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
  /// Label used in log events.
  #[serde(default = "default_name")]
  pub name: String,
  /// Fail path-mapping cycles with `Error::MappingCycle` instead of looping.
  #[serde(default = "default_detect_cycles")]
  pub detect_cycles: bool,
  /// Upper bound on nested resolutions: indirection steps plus dependency depth.
  #[serde(default = "default_max_resolution_depth")]
  pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      detect_cycles: default_detect_cycles(),
      max_resolution_depth: default_max_resolution_depth(),
    }
  }
}

impl ContainerConfig {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Self::default()
    }
  }

  pub fn from_yaml_str(source: &str) -> Result<Self> {
    let config: ContainerConfig =
      serde_yaml::from_str(source).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub(crate) fn validate(&self) -> Result<()> {
    if self.max_resolution_depth == 0 {
      return Err(Error::InvalidConfig(
        "max_resolution_depth must be greater than zero".to_string(),
      ));
    }
    Ok(())
  }
}
