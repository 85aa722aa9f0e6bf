//! Fare computation: base fare plus a per-kilometre rate over the
//! straight-line origin → destination distance.

use crate::geo::Coordinates;

/// Base fare in currency units.
pub const BASE_FARE: f64 = 2.50;

/// Per-kilometre rate in currency units.
pub const PER_KM_RATE: f64 = 1.50;

/// Fare for a trip, rounded to cents.
pub fn fare_for(origin: &Coordinates, destination: &Coordinates) -> f64 {
  let distance_km = origin.distance_km(destination);
  let fare = BASE_FARE + distance_km * PER_KM_RATE;
  (fare * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_distance_trip_costs_base_fare() {
    let p = Coordinates::new(37.7749, -122.4194);
    assert_eq!(fare_for(&p, &p), BASE_FARE);
  }

  #[test]
  fn fare_grows_with_distance() {
    let origin = Coordinates::new(37.7749, -122.4194);
    let near = Coordinates::new(37.7849, -122.4194);
    let far = Coordinates::new(37.8749, -122.4194);
    assert!(fare_for(&origin, &far) > fare_for(&origin, &near));
    assert!(fare_for(&origin, &near) > BASE_FARE);
  }

  #[test]
  fn fare_matches_formula_to_the_cent() {
    let origin = Coordinates::new(37.7749, -122.4194);
    let destination = Coordinates::new(37.8044, -122.2712);
    let expected = BASE_FARE + origin.distance_km(&destination) * PER_KM_RATE;
    assert!((fare_for(&origin, &destination) - expected).abs() <= 0.005);
  }
}
