//! The `DispatchStore` trait and supporting outcome types.
//!
//! The trait is implemented by storage backends (e.g. `hail-store-sqlite`).
//! The dispatch engine (`hail-dispatch`) depends on this abstraction, not
//! on any concrete backend.
//!
//! Contention is part of the contract, not an error: a reservation that
//! loses a race reports [`ReserveOutcome::Conflict`], and a guard that
//! fails inside the store's transaction reports
//! [`TransitionOutcome::Rejected`]. Both are ordinary values so callers
//! generic over `Self::Error` can react to them without downcasting.

use std::future::Future;

use uuid::Uuid;

use crate::{
  driver::{Driver, NewDriver},
  event::RideEvent,
  geo::Coordinates,
  lifecycle::RideAction,
  payment::{Payment, PaymentStatus},
  ride::{Ride, RideRequest, RideStatus},
  user::{NewUser, User},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// One row of the availability snapshot: an idle driver with a known
/// location, as of the moment the snapshot was taken.
#[derive(Debug, Clone)]
pub struct AvailableDriver {
  pub driver_id:  Uuid,
  pub location:   Coordinates,
  pub rating:     f64,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Result of an atomic reservation attempt.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
  /// Both rows committed: the ride is assigned and the driver reserved.
  Reserved(Ride),
  /// Another coordinator claimed the driver between the availability
  /// snapshot and this commit. Retried with the driver excluded, never
  /// surfaced.
  Conflict,
  /// The ride itself left `requested` (a concurrent cancellation or
  /// assignment won). The driver is untouched and dispatch for this ride
  /// is over; retrying other drivers would be pointless.
  RideClosed,
}

/// Result of applying a lifecycle action to a ride.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
  /// The transition committed; `event` is the audit record inserted in
  /// the same transaction.
  Applied { ride: Ride, event: RideEvent },
  /// Duplicate trigger delivery; the ride already reflects the action.
  NoOp(Ride),
  /// A guard failed. Nothing was written; the racing commit that got
  /// there first wins.
  Rejected {
    from:      RideStatus,
    attempted: RideStatus,
  },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the transactional entity store.
///
/// Every method that mutates both a ride and its driver commits those rows
/// in a single transaction: all effects land or none do, with no
/// externally visible intermediate state.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait DispatchStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users & drivers ───────────────────────────────────────────────────

  /// Create and persist a new user. The contact identifier is unique.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by UUID. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Administratively delete a user. Cascades the driver record; rides
  /// that referenced the driver keep their rows with `driver_id` cleared.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Register the driver extension for an existing user with the driver
  /// role. New drivers start offline with the default rating.
  fn add_driver(
    &self,
    input: NewDriver,
  ) -> impl Future<Output = Result<Driver, Self::Error>> + Send + '_;

  /// Retrieve a driver by UUID. Returns `None` if not found.
  fn get_driver(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Driver>, Self::Error>> + Send + '_;

  // ── Availability ──────────────────────────────────────────────────────

  /// Manual on-duty toggle: set the driver idle at `location`. Errors if
  /// the driver is currently reserved for an active ride.
  fn set_driver_available(
    &self,
    driver_id: Uuid,
    location: Coordinates,
  ) -> impl Future<Output = Result<Driver, Self::Error>> + Send + '_;

  /// Manual off-duty toggle. Errors if the driver is currently reserved.
  fn set_driver_offline(
    &self,
    driver_id: Uuid,
  ) -> impl Future<Output = Result<Driver, Self::Error>> + Send + '_;

  /// Point-in-time snapshot of drivers eligible for assignment. Staleness
  /// between this read and a reservation is expected; [`Self::reserve`]
  /// re-checks under the transaction.
  fn available_drivers(
    &self,
  ) -> impl Future<Output = Result<Vec<AvailableDriver>, Self::Error>> + Send + '_;

  // ── Rides ─────────────────────────────────────────────────────────────

  /// Persist a new ride in `requested` status, together with its
  /// `requested` audit event.
  fn create_ride(
    &self,
    request: RideRequest,
  ) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  /// Retrieve a ride by UUID. Returns `None` if not found.
  fn get_ride(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Ride>, Self::Error>> + Send + '_;

  /// Administrative deletion. Cascades the ride's events and payments.
  /// Normal-flow cancellation is a status, never a deletion.
  fn delete_ride(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Transitions ───────────────────────────────────────────────────────

  /// Atomic reservation: within one transaction, re-check that the ride
  /// is still `requested` and the driver still idle, then flip the driver
  /// to reserved, assign the ride, and insert the `assigned` event.
  /// A stale driver reports [`ReserveOutcome::Conflict`]; a ride that
  /// already left `requested` reports [`ReserveOutcome::RideClosed`].
  fn reserve(
    &self,
    ride_id: Uuid,
    driver_id: Uuid,
  ) -> impl Future<Output = Result<ReserveOutcome, Self::Error>> + Send + '_;

  /// Apply a lifecycle action. The store re-plans the action against the
  /// rows it reads inside the transaction and commits every planned
  /// effect (ride status, driver release, fare, pending payment, event)
  /// together.
  fn apply(
    &self,
    ride_id: Uuid,
    action: RideAction,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  /// Record that dispatch exhausted matching for this ride without a
  /// driver. The ride stays `requested`.
  fn record_match_failed(
    &self,
    ride_id: Uuid,
    attempts: u32,
  ) -> impl Future<Output = Result<RideEvent, Self::Error>> + Send + '_;

  // ── Audit & payments ──────────────────────────────────────────────────

  /// All events for a ride, oldest first.
  fn events_for(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RideEvent>, Self::Error>> + Send + '_;

  /// The ride's payment, if one was created (i.e. the ride completed).
  fn payment_for(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Option<Payment>, Self::Error>> + Send + '_;

  /// Advance a payment through settlement. Records the processor
  /// reference when one is supplied. Never touches the ride.
  fn set_payment_status(
    &self,
    payment_id: Uuid,
    status: PaymentStatus,
    processor_ref: Option<String>,
  ) -> impl Future<Output = Result<Payment, Self::Error>> + Send + '_;
}
