//! Geographic primitives: WGS-84 coordinates and straight-line distance.
//!
//! The engine performs nearest-available greedy matching over great-circle
//! distance only. Road routing and geocoding are external collaborators.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lat: f64,
  pub lng: f64,
}

impl Coordinates {
  pub fn new(lat: f64, lng: f64) -> Self { Self { lat, lng } }

  /// Great-circle (haversine) distance to `other`, in kilometres.
  pub fn distance_km(&self, other: &Coordinates) -> f64 {
    let (lat1, lon1) = (self.lat.to_radians(), self.lng.to_radians());
    let (lat2, lon2) = (other.lat.to_radians(), other.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
  }
}
