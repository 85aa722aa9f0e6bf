//! Ride — the central entity the lifecycle state machine governs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

/// The ride's position in the lifecycle.
///
/// Legal transitions are defined solely by
/// [`lifecycle::plan`](crate::lifecycle::plan); the storage layer's enum
/// column does not enforce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
  Requested,
  Assigned,
  Enroute,
  Started,
  Completed,
  Canceled,
}

impl RideStatus {
  /// Terminal states admit no further transition.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::Canceled)
  }

  /// Whether the driver reference must be set in this status. Outside of
  /// administrative driver deletion, `ride.driver_id` is non-null iff
  /// this returns `true`.
  pub fn requires_driver(&self) -> bool {
    matches!(
      self,
      Self::Assigned | Self::Enroute | Self::Started | Self::Completed
    )
  }

  /// Whether a ride in this status holds its driver's reservation.
  pub fn holds_reservation(&self) -> bool {
    matches!(self, Self::Assigned | Self::Enroute | Self::Started)
  }

  /// Stable lowercase tag, also used as the event kind for transitions.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Requested => "requested",
      Self::Assigned => "assigned",
      Self::Enroute => "enroute",
      Self::Started => "started",
      Self::Completed => "completed",
      Self::Canceled => "canceled",
    }
  }
}

impl std::fmt::Display for RideStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
  pub ride_id:     Uuid,
  pub rider_id:    Uuid,
  /// Set on assignment; cleared on cancellation and when the driver's
  /// user is deleted administratively.
  pub driver_id:   Option<Uuid>,
  pub origin:      Coordinates,
  pub destination: Coordinates,
  pub status:      RideStatus,
  /// Computed at drop-off; `None` until the ride completes.
  pub fare:        Option<f64>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// A rider's submission seeking a driver match.
#[derive(Debug, Clone)]
pub struct RideRequest {
  pub rider_id:    Uuid,
  pub origin:      Coordinates,
  pub destination: Coordinates,
}
