//! Dispatch tuning knobs.

use serde::{Deserialize, Serialize};

/// Configuration for the matcher and the dispatch retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
  /// Radius of the first candidate search ring, in kilometres.
  pub initial_radius_km: f64,
  /// The radius stops doubling once it reaches this bound (inclusive).
  pub max_radius_km:     f64,
  /// Match/reserve rounds per dispatch before giving up.
  pub max_attempts:      u32,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      initial_radius_km: 1.0,
      max_radius_km:     16.0,
      max_attempts:      3,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_describe_a_bounded_search() {
    let config = DispatchConfig::default();
    assert!(config.initial_radius_km > 0.0);
    assert!(config.max_radius_km >= config.initial_radius_km);
    assert!(config.max_attempts > 0);
  }

  #[test]
  fn missing_fields_fall_back_to_defaults() {
    let config: DispatchConfig = serde_json::from_str("{\"max_attempts\": 5}").unwrap();
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.initial_radius_km, DispatchConfig::default().initial_radius_km);
  }
}
