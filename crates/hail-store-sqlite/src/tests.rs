use hail_core::{
  Error as CoreError,
  driver::{DEFAULT_RATING, DriverStatus, NewDriver},
  event::EventPayload,
  fare::fare_for,
  geo::Coordinates,
  lifecycle::{Actor, RideAction},
  payment::{CURRENCY, PaymentStatus},
  ride::{RideRequest, RideStatus},
  store::{DispatchStore, ReserveOutcome, TransitionOutcome},
  user::{NewUser, Role},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.unwrap()
}

fn downtown() -> Coordinates { Coordinates::new(37.7749, -122.4194) }
fn uptown() -> Coordinates { Coordinates::new(37.8044, -122.2712) }

fn new_user(tag: &str, role: Role) -> NewUser {
  NewUser {
    display_name: format!("{tag} person"),
    contact:      format!("{tag}@example.com"),
    credential:   "hunter2".into(),
    role,
  }
}

async fn seed_rider(store: &SqliteStore, tag: &str) -> Uuid {
  store.add_user(new_user(tag, Role::Rider)).await.unwrap().user_id
}

/// Register a driver user, its driver record, and bring it online.
async fn seed_idle_driver(store: &SqliteStore, tag: &str, at: Coordinates) -> Uuid {
  let user = store.add_user(new_user(tag, Role::Driver)).await.unwrap();
  store
    .add_driver(NewDriver {
      user_id: user.user_id,
      vehicle: "Toyota Prius".into(),
      license: "7ABC123".into(),
    })
    .await
    .unwrap();
  store.set_driver_available(user.user_id, at).await.unwrap();
  user.user_id
}

/// Request a ride and reserve `driver_id` for it.
async fn seed_assigned_ride(store: &SqliteStore, rider_id: Uuid, driver_id: Uuid) -> Uuid {
  let ride = store
    .create_ride(RideRequest {
      rider_id,
      origin:      downtown(),
      destination: uptown(),
    })
    .await
    .unwrap();
  match store.reserve(ride.ride_id, driver_id).await.unwrap() {
    ReserveOutcome::Reserved(_) => ride.ride_id,
    other => panic!("seed reservation failed: {other:?}"),
  }
}

fn applied(outcome: TransitionOutcome) -> hail_core::ride::Ride {
  match outcome {
    TransitionOutcome::Applied { ride, .. } => ride,
    other => panic!("expected Applied, got {other:?}"),
  }
}

// ─── Users & drivers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let store = store().await;
  let user = store.add_user(new_user("ada", Role::Rider)).await.unwrap();

  let found = store.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(found.display_name, "ada person");
  assert_eq!(found.role, Role::Rider);

  assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_contact_is_rejected() {
  let store = store().await;
  store.add_user(new_user("ada", Role::Rider)).await.unwrap();
  assert!(store.add_user(new_user("ada", Role::Driver)).await.is_err());
}

#[tokio::test]
async fn new_drivers_start_offline_with_the_default_rating() {
  let store = store().await;
  let user = store.add_user(new_user("dan", Role::Driver)).await.unwrap();
  let driver = store
    .add_driver(NewDriver {
      user_id: user.user_id,
      vehicle: "Honda Civic".into(),
      license: "8XYZ900".into(),
    })
    .await
    .unwrap();

  assert_eq!(driver.status, DriverStatus::Offline);
  assert_eq!(driver.rating, DEFAULT_RATING);
  assert!(driver.location.is_none());

  let found = store.get_driver(user.user_id).await.unwrap().unwrap();
  assert_eq!(found.status, DriverStatus::Offline);
}

#[tokio::test]
async fn driver_registration_requires_an_existing_driver_role_user() {
  let store = store().await;

  let err = store
    .add_driver(NewDriver {
      user_id: Uuid::new_v4(),
      vehicle: "Ford Focus".into(),
      license: "NOPE".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::UserNotFound(_))));

  let rider = store.add_user(new_user("ada", Role::Rider)).await.unwrap();
  let err = store
    .add_driver(NewDriver {
      user_id: rider.user_id,
      vehicle: "Ford Focus".into(),
      license: "NOPE".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotADriver(_))));
}

// ─── Availability ────────────────────────────────────────────────────────────

#[tokio::test]
async fn availability_toggles_update_status_and_location() {
  let store = store().await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;

  let snapshot = store.available_drivers().await.unwrap();
  assert_eq!(snapshot.len(), 1);
  assert_eq!(snapshot[0].driver_id, driver_id);
  assert_eq!(snapshot[0].location, downtown());

  let driver = store.set_driver_offline(driver_id).await.unwrap();
  assert_eq!(driver.status, DriverStatus::Offline);
  // Last known location survives going off duty.
  assert_eq!(driver.location, Some(downtown()));

  assert!(store.available_drivers().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_reserved_driver_cannot_toggle_availability() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  seed_assigned_ride(&store, rider_id, driver_id).await;

  let err = store.set_driver_offline(driver_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DriverReserved(_))));

  let err = store.set_driver_available(driver_id, uptown()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DriverReserved(_))));
}

#[tokio::test]
async fn toggling_an_unknown_driver_fails() {
  let store = store().await;
  let err = store.set_driver_offline(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DriverNotFound(_))));
}

// ─── Rides ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_ride_persists_the_requested_event() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;

  let ride = store
    .create_ride(RideRequest {
      rider_id,
      origin:      downtown(),
      destination: uptown(),
    })
    .await
    .unwrap();
  assert_eq!(ride.status, RideStatus::Requested);
  assert!(ride.driver_id.is_none());
  assert!(ride.fare.is_none());

  let events = store.events_for(ride.ride_id).await.unwrap();
  assert_eq!(events.len(), 1);
  match &events[0].payload {
    EventPayload::Requested { rider_id: r } => assert_eq!(*r, rider_id),
    other => panic!("unexpected payload: {other:?}"),
  }
}

#[tokio::test]
async fn create_ride_for_an_unknown_rider_fails() {
  let store = store().await;
  let err = store
    .create_ride(RideRequest {
      rider_id:    Uuid::new_v4(),
      origin:      downtown(),
      destination: uptown(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::UserNotFound(_))));
}

// ─── Reservation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reserve_assigns_the_ride_and_holds_the_driver() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let ride = store.get_ride(ride_id).await.unwrap().unwrap();
  assert_eq!(ride.status, RideStatus::Assigned);
  assert_eq!(ride.driver_id, Some(driver_id));

  let driver = store.get_driver(driver_id).await.unwrap().unwrap();
  assert_eq!(driver.status, DriverStatus::Reserved);
  assert!(store.available_drivers().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_driver_already_reserved_conflicts() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  seed_assigned_ride(&store, rider_id, driver_id).await;

  let other_rider = seed_rider(&store, "bob").await;
  let other_ride = store
    .create_ride(RideRequest {
      rider_id:    other_rider,
      origin:      uptown(),
      destination: downtown(),
    })
    .await
    .unwrap();

  let outcome = store.reserve(other_ride.ride_id, driver_id).await.unwrap();
  assert!(matches!(outcome, ReserveOutcome::Conflict));

  // Nothing was written for the losing attempt.
  let ride = store.get_ride(other_ride.ride_id).await.unwrap().unwrap();
  assert_eq!(ride.status, RideStatus::Requested);
  assert!(ride.driver_id.is_none());
  assert_eq!(store.events_for(other_ride.ride_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_ride_that_left_requested_is_closed_to_reservation() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let late_driver = seed_idle_driver(&store, "eve", uptown()).await;
  let outcome = store.reserve(ride_id, late_driver).await.unwrap();
  assert!(matches!(outcome, ReserveOutcome::RideClosed));

  // The late driver is untouched by the losing attempt.
  let driver = store.get_driver(late_driver).await.unwrap().unwrap();
  assert_eq!(driver.status, DriverStatus::Idle);
}

#[tokio::test]
async fn a_canceled_ride_is_closed_not_conflicted() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;

  let ride = store
    .create_ride(RideRequest {
      rider_id,
      origin:      downtown(),
      destination: uptown(),
    })
    .await
    .unwrap();
  store
    .apply(ride.ride_id, RideAction::Cancel { actor: Actor::Rider, reason: None })
    .await
    .unwrap();

  let outcome = store.reserve(ride.ride_id, driver_id).await.unwrap();
  assert!(matches!(outcome, ReserveOutcome::RideClosed));

  let driver = store.get_driver(driver_id).await.unwrap().unwrap();
  assert_eq!(driver.status, DriverStatus::Idle);
}

#[tokio::test]
async fn reserving_an_unknown_ride_fails() {
  let store = store().await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let err = store.reserve(Uuid::new_v4(), driver_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::RideNotFound(_))));
}

// ─── Lifecycle transitions ───────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_completes_bills_and_releases() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let ride = applied(
    store
      .apply(ride_id, RideAction::ConfirmEnroute { driver_id })
      .await
      .unwrap(),
  );
  assert_eq!(ride.status, RideStatus::Enroute);

  let ride = applied(
    store
      .apply(ride_id, RideAction::ConfirmPickup { driver_id })
      .await
      .unwrap(),
  );
  assert_eq!(ride.status, RideStatus::Started);

  let ride = applied(
    store
      .apply(ride_id, RideAction::ConfirmDropoff { driver_id })
      .await
      .unwrap(),
  );
  assert_eq!(ride.status, RideStatus::Completed);

  let expected_fare = fare_for(&downtown(), &uptown());
  assert_eq!(ride.fare, Some(expected_fare));

  // Completion created the pending payment in the same transaction.
  let payment = store.payment_for(ride_id).await.unwrap().unwrap();
  assert_eq!(payment.amount, expected_fare);
  assert_eq!(payment.currency, CURRENCY);
  assert_eq!(payment.status, PaymentStatus::Pending);

  // And released the driver back to the idle pool.
  let driver = store.get_driver(driver_id).await.unwrap().unwrap();
  assert_eq!(driver.status, DriverStatus::Idle);

  let kinds: Vec<&str> = store
    .events_for(ride_id)
    .await
    .unwrap()
    .iter()
    .map(|e| e.payload.kind())
    .collect();
  assert_eq!(kinds, ["requested", "assigned", "enroute", "started", "completed"]);
}

#[tokio::test]
async fn duplicate_confirmations_are_noops_and_write_nothing() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  store
    .apply(ride_id, RideAction::ConfirmEnroute { driver_id })
    .await
    .unwrap();
  let outcome = store
    .apply(ride_id, RideAction::ConfirmEnroute { driver_id })
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::NoOp(_)));

  // One requested, one assigned, one enroute. No duplicate event.
  assert_eq!(store.events_for(ride_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn duplicate_dropoff_does_not_double_bill() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  for action in [
    RideAction::ConfirmEnroute { driver_id },
    RideAction::ConfirmPickup { driver_id },
    RideAction::ConfirmDropoff { driver_id },
  ] {
    store.apply(ride_id, action).await.unwrap();
  }

  let outcome = store
    .apply(ride_id, RideAction::ConfirmDropoff { driver_id })
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::NoOp(_)));
  assert!(store.payment_for(ride_id).await.unwrap().is_some());
  assert_eq!(store.events_for(ride_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn a_confirmation_from_the_wrong_driver_is_rejected() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let impostor = seed_idle_driver(&store, "eve", uptown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let outcome = store
    .apply(ride_id, RideAction::ConfirmEnroute { driver_id: impostor })
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    TransitionOutcome::Rejected {
      from:      RideStatus::Assigned,
      attempted: RideStatus::Enroute,
    }
  ));

  let ride = store.get_ride(ride_id).await.unwrap().unwrap();
  assert_eq!(ride.status, RideStatus::Assigned);
}

#[tokio::test]
async fn out_of_order_confirmations_are_rejected() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let outcome = store
    .apply(ride_id, RideAction::ConfirmDropoff { driver_id })
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Rejected { .. }));
  assert!(store.payment_for(ride_id).await.unwrap().is_none());
}

#[tokio::test]
async fn cancellation_releases_the_driver_without_billing() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  let ride = applied(
    store
      .apply(
        ride_id,
        RideAction::Cancel { actor: Actor::Rider, reason: Some("changed plans".into()) },
      )
      .await
      .unwrap(),
  );
  assert_eq!(ride.status, RideStatus::Canceled);
  assert!(ride.driver_id.is_none());
  assert!(ride.fare.is_none());
  assert!(store.payment_for(ride_id).await.unwrap().is_none());

  let driver = store.get_driver(driver_id).await.unwrap().unwrap();
  assert_eq!(driver.status, DriverStatus::Idle);
}

#[tokio::test]
async fn cancelling_a_terminal_ride_is_rejected() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  store
    .apply(ride_id, RideAction::Cancel { actor: Actor::Driver, reason: None })
    .await
    .unwrap();

  let outcome = store
    .apply(ride_id, RideAction::Cancel { actor: Actor::Rider, reason: None })
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    TransitionOutcome::Rejected { from: RideStatus::Canceled, .. }
  ));
}

#[tokio::test]
async fn the_latest_status_event_always_matches_the_ride() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  store
    .apply(ride_id, RideAction::ConfirmEnroute { driver_id })
    .await
    .unwrap();

  let ride = store.get_ride(ride_id).await.unwrap().unwrap();
  let events = store.events_for(ride_id).await.unwrap();
  let implied = events
    .iter()
    .rev()
    .find_map(|e| e.payload.implied_status())
    .unwrap();
  assert_eq!(implied, ride.status);
}

// ─── Match failure accounting ────────────────────────────────────────────────

#[tokio::test]
async fn match_failure_is_recorded_without_touching_the_ride() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let ride = store
    .create_ride(RideRequest {
      rider_id,
      origin:      downtown(),
      destination: uptown(),
    })
    .await
    .unwrap();

  let event = store.record_match_failed(ride.ride_id, 3).await.unwrap();
  assert!(matches!(event.payload, EventPayload::MatchFailed { attempts: 3 }));

  let ride = store.get_ride(ride.ride_id).await.unwrap().unwrap();
  assert_eq!(ride.status, RideStatus::Requested);
  assert_eq!(store.events_for(ride.ride_id).await.unwrap().len(), 2);
}

// ─── Payments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settlement_advances_the_payment_and_keeps_the_reference() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;
  for action in [
    RideAction::ConfirmEnroute { driver_id },
    RideAction::ConfirmPickup { driver_id },
    RideAction::ConfirmDropoff { driver_id },
  ] {
    store.apply(ride_id, action).await.unwrap();
  }
  let payment = store.payment_for(ride_id).await.unwrap().unwrap();

  let payment = store
    .set_payment_status(
      payment.payment_id,
      PaymentStatus::Authorized,
      Some("auth-42".into()),
    )
    .await
    .unwrap();
  assert_eq!(payment.status, PaymentStatus::Authorized);
  assert_eq!(payment.processor_ref.as_deref(), Some("auth-42"));

  // Capture without a new reference keeps the recorded one.
  let payment = store
    .set_payment_status(payment.payment_id, PaymentStatus::Captured, None)
    .await
    .unwrap();
  assert_eq!(payment.status, PaymentStatus::Captured);
  assert_eq!(payment.processor_ref.as_deref(), Some("auth-42"));
}

#[tokio::test]
async fn settling_an_unknown_payment_fails() {
  let store = store().await;
  let err = store
    .set_payment_status(Uuid::new_v4(), PaymentStatus::Captured, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PaymentNotFound(_))));
}

// ─── Administrative deletion ─────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_driver_user_cascades_and_clears_assignments() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;

  store.delete_user(driver_id).await.unwrap();

  assert!(store.get_user(driver_id).await.unwrap().is_none());
  assert!(store.get_driver(driver_id).await.unwrap().is_none());

  // The ride row survives with its assignment cleared.
  let ride = store.get_ride(ride_id).await.unwrap().unwrap();
  assert!(ride.driver_id.is_none());
}

#[tokio::test]
async fn deleting_a_ride_cascades_events_and_payments() {
  let store = store().await;
  let rider_id = seed_rider(&store, "ada").await;
  let driver_id = seed_idle_driver(&store, "dan", downtown()).await;
  let ride_id = seed_assigned_ride(&store, rider_id, driver_id).await;
  for action in [
    RideAction::ConfirmEnroute { driver_id },
    RideAction::ConfirmPickup { driver_id },
    RideAction::ConfirmDropoff { driver_id },
  ] {
    store.apply(ride_id, action).await.unwrap();
  }

  store.delete_ride(ride_id).await.unwrap();

  assert!(store.get_ride(ride_id).await.unwrap().is_none());
  assert!(store.events_for(ride_id).await.unwrap().is_empty());
  assert!(store.payment_for(ride_id).await.unwrap().is_none());

  let err = store.delete_ride(ride_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::RideNotFound(_))));
}

#[tokio::test]
async fn deleting_an_unknown_user_fails() {
  let store = store().await;
  let err = store.delete_user(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::UserNotFound(_))));
}
