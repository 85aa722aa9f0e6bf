//! Ride events — the append-only audit log attached to each ride.
//!
//! Events are never updated or deleted; rows go away only via the ride
//! cascade on administrative deletion. The latest status-bearing event for
//! a ride always agrees with the ride's current status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{lifecycle::Actor, ride::RideStatus};

/// The typed payload of a ride event. The variant's kind tag is also the
/// `kind` discriminant stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
  /// Recorded when the ride row is first persisted.
  Requested { rider_id: Uuid },

  /// Recorded once per applied lifecycle transition.
  Transition {
    from:   RideStatus,
    to:     RideStatus,
    actor:  Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
  },

  /// Recorded when a dispatch attempt exhausts matching with no driver.
  /// The ride stays requested; `attempts` counts match/reserve rounds.
  MatchFailed { attempts: u32 },
}

impl EventPayload {
  /// The kind tag stored alongside the JSON payload. Transitions are
  /// tagged with the status they produce (`assigned`, `enroute`, ...).
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Requested { .. } => "requested",
      Self::Transition { to, .. } => to.as_str(),
      Self::MatchFailed { .. } => "match_failed",
    }
  }

  /// The ride status this event implies, if it is status-bearing.
  pub fn implied_status(&self) -> Option<RideStatus> {
    match self {
      Self::Requested { .. } => Some(RideStatus::Requested),
      Self::Transition { to, .. } => Some(*to),
      Self::MatchFailed { .. } => None,
    }
  }
}

/// One row of the per-ride audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideEvent {
  pub event_id:    Uuid,
  pub ride_id:     Uuid,
  pub payload:     EventPayload,
  pub recorded_at: DateTime<Utc>,
}

impl RideEvent {
  /// Build an event stamped `recorded_at` for insertion alongside the
  /// state change it describes.
  pub fn new(ride_id: Uuid, payload: EventPayload, recorded_at: DateTime<Utc>) -> Self {
    Self {
      event_id: Uuid::new_v4(),
      ride_id,
      payload,
      recorded_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transition_kind_tag_is_target_status() {
    let payload = EventPayload::Transition {
      from:   RideStatus::Requested,
      to:     RideStatus::Assigned,
      actor:  Actor::System,
      reason: None,
    };
    assert_eq!(payload.kind(), "assigned");
    assert_eq!(payload.implied_status(), Some(RideStatus::Assigned));
  }

  #[test]
  fn match_failed_implies_no_status() {
    let payload = EventPayload::MatchFailed { attempts: 3 };
    assert_eq!(payload.kind(), "match_failed");
    assert_eq!(payload.implied_status(), None);
  }

  #[test]
  fn payload_round_trips_through_json() {
    let payload = EventPayload::Transition {
      from:   RideStatus::Started,
      to:     RideStatus::Canceled,
      actor:  Actor::Rider,
      reason: Some("changed plans".into()),
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("\"kind\":\"transition\""));
    let back: EventPayload = serde_json::from_str(&json).unwrap();
    match back {
      EventPayload::Transition { to, reason, .. } => {
        assert_eq!(to, RideStatus::Canceled);
        assert_eq!(reason.as_deref(), Some("changed plans"));
      }
      other => panic!("unexpected payload: {other:?}"),
    }
  }
}
