//! The ride lifecycle state machine.
//!
//! Planning is pure: given the ride as currently read and an action, it
//! either produces a [`Transition`] describing every effect the store must
//! commit atomically, reports a benign duplicate ([`Step::NoOp`]), or
//! rejects the action with [`Error::InvalidTransition`]. Nothing here
//! touches storage. The store re-plans against the rows it reads inside
//! its own transaction, so a stale planning read can never commit an
//! illegal step.
//!
//! Legal transitions:
//!
//! ```text
//! requested -> assigned -> enroute -> started -> completed
//! requested | assigned | enroute | started -> canceled
//! ```
//!
//! `completed` and `canceled` are terminal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::Error,
  fare::fare_for,
  ride::{Ride, RideStatus},
};

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Who initiated an action. Recorded on the transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
  Rider,
  Driver,
  System,
}

/// An inbound trigger attempting to advance a ride through its lifecycle.
#[derive(Debug, Clone)]
pub enum RideAction {
  /// The matcher selected `driver_id`; reserve the driver and assign.
  Assign { driver_id: Uuid },
  /// The assigned driver confirmed they are heading to the pickup.
  ConfirmEnroute { driver_id: Uuid },
  /// The assigned driver confirmed the rider is on board.
  ConfirmPickup { driver_id: Uuid },
  /// The assigned driver confirmed drop-off.
  ConfirmDropoff { driver_id: Uuid },
  /// The rider or the driver abandoned the ride.
  Cancel {
    actor:  Actor,
    reason: Option<String>,
  },
}

// ─── Planned transitions ─────────────────────────────────────────────────────

/// How the driver's reservation changes when a transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEffect {
  /// Leave the driver untouched.
  None,
  /// Flip the chosen driver from idle to reserved (assignment).
  Reserve(Uuid),
  /// Return the assigned driver to idle (completion or cancellation).
  Release(Uuid),
}

/// A fully planned transition: the new status plus every side effect that
/// must commit in the same transaction, or not at all.
#[derive(Debug, Clone)]
pub struct Transition {
  pub from:          RideStatus,
  pub to:            RideStatus,
  pub actor:         Actor,
  pub reason:        Option<String>,
  pub driver_effect: DriverEffect,
  /// Set on completion only: the fare to record on the ride, for which a
  /// pending payment is created in the same transaction.
  pub fare:          Option<f64>,
}

/// The outcome of planning an action against the current state.
#[derive(Debug, Clone)]
pub enum Step {
  /// Apply this transition atomically.
  Apply(Transition),
  /// The action re-delivers the trigger that produced the current state.
  /// Succeed without doing anything — duplicate and out-of-order delivery
  /// of driver confirmations must be idempotent.
  NoOp,
}

// ─── Planner ─────────────────────────────────────────────────────────────────

/// Plan `action` against the ride as currently read.
pub fn plan(ride: &Ride, action: &RideAction) -> Result<Step, Error> {
  match action {
    RideAction::Assign { driver_id } => match ride.status {
      RideStatus::Requested => Ok(Step::Apply(Transition {
        from:          RideStatus::Requested,
        to:            RideStatus::Assigned,
        actor:         Actor::System,
        reason:        None,
        driver_effect: DriverEffect::Reserve(*driver_id),
        fare:          None,
      })),
      // A retried reservation may re-deliver the assignment it already won.
      RideStatus::Assigned if ride.driver_id == Some(*driver_id) => Ok(Step::NoOp),
      from => Err(Error::InvalidTransition {
        from,
        attempted: RideStatus::Assigned,
      }),
    },

    RideAction::ConfirmEnroute { driver_id } => confirm(
      ride,
      *driver_id,
      RideStatus::Assigned,
      RideStatus::Enroute,
      DriverEffect::None,
      None,
    ),

    RideAction::ConfirmPickup { driver_id } => confirm(
      ride,
      *driver_id,
      RideStatus::Enroute,
      RideStatus::Started,
      DriverEffect::None,
      None,
    ),

    RideAction::ConfirmDropoff { driver_id } => confirm(
      ride,
      *driver_id,
      RideStatus::Started,
      RideStatus::Completed,
      DriverEffect::Release(*driver_id),
      Some(fare_for(&ride.origin, &ride.destination)),
    ),

    RideAction::Cancel { actor, reason } => {
      if ride.status.is_terminal() {
        return Err(Error::InvalidTransition {
          from:      ride.status,
          attempted: RideStatus::Canceled,
        });
      }
      Ok(Step::Apply(Transition {
        from:          ride.status,
        to:            RideStatus::Canceled,
        actor:         *actor,
        reason:        reason.clone(),
        driver_effect: match ride.driver_id {
          Some(driver_id) => DriverEffect::Release(driver_id),
          None => DriverEffect::None,
        },
        fare:          None,
      }))
    }
  }
}

/// Shared guard logic for the three driver confirmations.
///
/// The acting driver must be the assigned driver. Re-delivering the trigger
/// whose target state the ride is already in is a no-op; any other mismatch
/// is a rejected transition.
fn confirm(
  ride: &Ride,
  driver_id: Uuid,
  from: RideStatus,
  to: RideStatus,
  driver_effect: DriverEffect,
  fare: Option<f64>,
) -> Result<Step, Error> {
  if ride.driver_id != Some(driver_id) {
    return Err(Error::InvalidTransition {
      from: ride.status,
      attempted: to,
    });
  }
  if ride.status == to {
    return Ok(Step::NoOp);
  }
  if ride.status != from {
    return Err(Error::InvalidTransition {
      from: ride.status,
      attempted: to,
    });
  }
  Ok(Step::Apply(Transition {
    from,
    to,
    actor: Actor::Driver,
    reason: None,
    driver_effect,
    fare,
  }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
