//! Driver — the 1:1 extension of a [`User`](crate::user::User) with the
//! driver role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

/// Rating assigned to a newly registered driver.
pub const DEFAULT_RATING: f64 = 4.5;

/// Lowest and highest representable rating.
pub const RATING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=5.0;

/// The driver's dispatch state.
///
/// Externally there are exactly two observable states: eligible for
/// matching ([`Idle`](Self::Idle)) or not. The three-way split keeps a
/// manual offline toggle distinct from an automatic reservation, so a
/// driver cannot mark themselves available mid-ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
  /// Deliberately off duty. Location may be stale or absent.
  Offline,
  /// On duty with a known location; eligible for assignment.
  Idle,
  /// Held by a ride in assigned, enroute, or started status.
  Reserved,
}

impl DriverStatus {
  /// The externally observable availability flag.
  pub fn is_available(&self) -> bool { matches!(self, Self::Idle) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
  /// Same UUID as the owning user; the row is cascade-deleted with it.
  pub driver_id:  Uuid,
  pub vehicle:    String,
  pub license:    String,
  /// Bounded to [`RATING_RANGE`]; defaults to [`DEFAULT_RATING`].
  pub rating:     f64,
  pub status:     DriverStatus,
  /// Last reported position. `None` until the driver first comes online.
  pub location:   Option<Coordinates>,
  pub updated_at: DateTime<Utc>,
}

/// Input for [`DispatchStore::add_driver`](crate::store::DispatchStore::add_driver).
/// The referenced user must already exist with [`Role::Driver`](crate::user::Role).
#[derive(Debug, Clone)]
pub struct NewDriver {
  pub user_id: Uuid,
  pub vehicle: String,
  pub license: String,
}

/// Clamp a proposed rating into the representable range.
pub fn clamp_rating(rating: f64) -> f64 {
  rating.clamp(*RATING_RANGE.start(), *RATING_RANGE.end())
}
