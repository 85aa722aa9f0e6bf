//! The dispatch coordinator: request intake, the optimistic match/reserve
//! retry loop, and the lifecycle entry points for riders and drivers.

use std::{collections::HashSet, sync::Arc};

use hail_core::{
  Error as CoreError,
  driver::Driver,
  geo::Coordinates,
  lifecycle::{Actor, RideAction},
  processor::PaymentProcessor,
  ride::{Ride, RideRequest},
  store::{DispatchStore, ReserveOutcome, TransitionOutcome},
};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
  availability::AvailabilityIndex,
  config::DispatchConfig,
  error::{Error, Result},
  matcher::Matcher,
  payment,
};

/// How a dispatch request concluded. Both arms carry the persisted ride;
/// an unmatched request is a recorded fact, not an error.
#[derive(Debug)]
pub enum DispatchOutcome {
  /// A driver was reserved and the ride is `assigned`.
  Assigned(Ride),
  /// No driver was assigned: matching exhausted its attempts (the ride
  /// remains `requested` with a `match_failed` event), or a concurrent
  /// cancellation closed the ride mid-dispatch.
  NoCandidate(Ride),
}

/// The engine's front door. Cheap to clone; every clone shares the same
/// store and processor, and concurrent coordinators coordinate only
/// through the store's transactions.
pub struct Coordinator<S, P> {
  store:     Arc<S>,
  processor: Arc<P>,
  config:    DispatchConfig,
  matcher:   Matcher<S>,
}

impl<S, P> Coordinator<S, P>
where
  S: DispatchStore + 'static,
  P: PaymentProcessor + 'static,
{
  pub fn new(store: Arc<S>, processor: Arc<P>, config: DispatchConfig) -> Self {
    let matcher = Matcher::new(AvailabilityIndex::new(Arc::clone(&store)), config.clone());
    Self { store, processor, config, matcher }
  }

  /// The availability surface, for driver on/off-duty toggles.
  pub fn availability(&self) -> AvailabilityIndex<S> {
    AvailabilityIndex::new(Arc::clone(&self.store))
  }

  // ── Dispatch ──────────────────────────────────────────────────────────────

  /// Persist the request and try to assign a driver.
  ///
  /// Each round takes a fresh availability snapshot, matches, and attempts
  /// an atomic reservation. A driver lost to a concurrent dispatch is
  /// excluded and the round retried, up to `max_attempts` rounds. Running
  /// out of rounds or candidates leaves the ride `requested` with a
  /// `match_failed` event.
  pub async fn dispatch(&self, request: RideRequest) -> Result<DispatchOutcome> {
    let ride = self.store.create_ride(request).await.map_err(Error::store)?;
    let span = info_span!("dispatch", ride_id = %ride.ride_id);
    self.assign_loop(ride).instrument(span).await
  }

  async fn assign_loop(&self, ride: Ride) -> Result<DispatchOutcome> {
    let mut excluded: HashSet<Uuid> = HashSet::new();
    let mut attempts = 0;

    while attempts < self.config.max_attempts {
      attempts += 1;

      let Some(candidate) = self.matcher.select(ride.origin, &excluded).await? else {
        break;
      };

      match self
        .store
        .reserve(ride.ride_id, candidate.driver_id)
        .await
        .map_err(Error::store)?
      {
        ReserveOutcome::Reserved(ride) => {
          info!(driver_id = %candidate.driver_id, attempts, "driver assigned");
          return Ok(DispatchOutcome::Assigned(ride));
        }
        ReserveOutcome::Conflict => {
          debug!(driver_id = %candidate.driver_id, attempts, "reservation conflict");
          excluded.insert(candidate.driver_id);
        }
        ReserveOutcome::RideClosed => {
          // A concurrent cancellation won. Nothing left to match; this is
          // not a match failure, so no audit event is recorded.
          debug!(attempts, "ride closed during dispatch");
          let ride = self
            .store
            .get_ride(ride.ride_id)
            .await
            .map_err(Error::store)?
            .unwrap_or(ride);
          return Ok(DispatchOutcome::NoCandidate(ride));
        }
      }
    }

    warn!(attempts, "no driver matched");
    self
      .store
      .record_match_failed(ride.ride_id, attempts)
      .await
      .map_err(Error::store)?;
    Ok(DispatchOutcome::NoCandidate(ride))
  }

  // ── Driver confirmations ──────────────────────────────────────────────────

  /// The assigned driver confirmed they are heading to the pickup.
  pub async fn confirm_enroute(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride> {
    self
      .transition(ride_id, RideAction::ConfirmEnroute { driver_id })
      .await
  }

  /// The assigned driver confirmed the rider is on board.
  pub async fn confirm_pickup(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride> {
    self
      .transition(ride_id, RideAction::ConfirmPickup { driver_id })
      .await
  }

  /// The assigned driver confirmed drop-off.
  ///
  /// Completion (fare, pending payment, driver release, event) commits in
  /// one store transaction; settlement then runs in the background so the
  /// ride-state commit never waits on the payment processor.
  pub async fn confirm_dropoff(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride> {
    let outcome = self
      .store
      .apply(ride_id, RideAction::ConfirmDropoff { driver_id })
      .await
      .map_err(Error::store)?;

    match outcome {
      TransitionOutcome::Applied { ride, .. } => {
        info!(%ride_id, fare = ride.fare, "ride completed");
        self.spawn_settlement(ride.ride_id);
        Ok(ride)
      }
      // Duplicate drop-off: settlement was already spawned by the first.
      TransitionOutcome::NoOp(ride) => Ok(ride),
      TransitionOutcome::Rejected { from, attempted } => {
        Err(Error::Core(CoreError::InvalidTransition { from, attempted }))
      }
    }
  }

  // ── Cancellation ──────────────────────────────────────────────────────────

  /// Cancel the ride on behalf of `actor`. Releases the assigned driver,
  /// if any. Rejected once the ride is terminal.
  pub async fn cancel(
    &self,
    ride_id: Uuid,
    actor: Actor,
    reason: Option<String>,
  ) -> Result<Ride> {
    self
      .transition(ride_id, RideAction::Cancel { actor, reason })
      .await
  }

  // ── Availability toggles ──────────────────────────────────────────────────

  pub async fn mark_available(&self, driver_id: Uuid, location: Coordinates) -> Result<Driver> {
    self.availability().mark_available(driver_id, location).await
  }

  pub async fn mark_unavailable(&self, driver_id: Uuid) -> Result<Driver> {
    self.availability().mark_unavailable(driver_id).await
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn transition(&self, ride_id: Uuid, action: RideAction) -> Result<Ride> {
    match self.store.apply(ride_id, action).await.map_err(Error::store)? {
      TransitionOutcome::Applied { ride, .. } => Ok(ride),
      TransitionOutcome::NoOp(ride) => Ok(ride),
      TransitionOutcome::Rejected { from, attempted } => {
        Err(Error::Core(CoreError::InvalidTransition { from, attempted }))
      }
    }
  }

  fn spawn_settlement(&self, ride_id: Uuid) {
    let store = Arc::clone(&self.store);
    let processor = Arc::clone(&self.processor);
    tokio::spawn(async move {
      if let Err(e) = payment::settle(store.as_ref(), processor.as_ref(), ride_id).await {
        error!(%ride_id, error = %e, "billing exception");
      }
    });
  }
}

impl<S, P> Clone for Coordinator<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      processor: Arc::clone(&self.processor),
      config:    self.config.clone(),
      matcher:   self.matcher.clone(),
    }
  }
}
