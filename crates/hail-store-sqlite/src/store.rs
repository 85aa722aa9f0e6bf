//! [`SqliteStore`] — the SQLite implementation of [`DispatchStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use hail_core::{
  Error as CoreError,
  driver::{DEFAULT_RATING, Driver, DriverStatus, NewDriver},
  event::{EventPayload, RideEvent},
  geo::Coordinates,
  lifecycle::{self, Actor, DriverEffect, RideAction, Step},
  payment::{CURRENCY, Payment, PaymentStatus},
  ride::{Ride, RideRequest, RideStatus},
  store::{AvailableDriver, DispatchStore, ReserveOutcome, TransitionOutcome},
  user::{NewUser, Role, User},
};

use crate::{
  Error, Result,
  encode::{
    RawDriver, RawPayment, RawRide, RawUser, decode_driver_status, decode_dt,
    decode_uuid, encode_driver_status, encode_dt, encode_payment_status,
    encode_ride_status, encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hail dispatch store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// access is serialised onto the connection's worker thread; multi-row
/// transitions run inside explicit transactions so an aborted operation
/// can never leave a ride and its driver half-updated.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DispatchStore impl ──────────────────────────────────────────────────────

impl DispatchStore for SqliteStore {
  type Error = Error;

  // ── Users & drivers ───────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:      Uuid::new_v4(),
      display_name: input.display_name,
      contact:      input.contact,
      credential:   input.credential,
      role:         input.role,
      created_at:   Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.display_name.clone();
    let contact  = user.contact.clone();
    let cred     = user.credential.clone();
    let role_str = encode_role(user.role).to_owned();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, display_name, contact, credential, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, contact, cred, role_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, display_name, contact, credential, role, created_at
               FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawUser {
                  user_id:      row.get(0)?,
                  display_name: row.get(1)?,
                  contact:      row.get(2)?,
                  credential:   row.get(3)?,
                  role:         row.get(4)?,
                  created_at:   row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn delete_user(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if deleted == 0 {
      return Err(Error::Core(CoreError::UserNotFound(id)));
    }
    Ok(())
  }

  async fn add_driver(&self, input: NewDriver) -> Result<Driver> {
    let driver = Driver {
      driver_id:  input.user_id,
      vehicle:    input.vehicle,
      license:    input.license,
      rating:     DEFAULT_RATING,
      status:     DriverStatus::Offline,
      location:   None,
      updated_at: Utc::now(),
    };

    let id_str     = encode_uuid(driver.driver_id);
    let vehicle    = driver.vehicle.clone();
    let license    = driver.license.clone();
    let status_str = encode_driver_status(driver.status).to_owned();
    let at_str     = encode_dt(driver.updated_at);

    let out: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let role: Option<String> = tx
          .query_row(
            "SELECT role FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;

        let res = match role.as_deref() {
          None => Err(Error::Core(CoreError::UserNotFound(input.user_id))),
          Some(r) if r != encode_role(Role::Driver) => {
            Err(Error::Core(CoreError::NotADriver(input.user_id)))
          }
          Some(_) => {
            tx.execute(
              "INSERT INTO drivers (driver_id, vehicle, license, rating, status, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
              rusqlite::params![id_str, vehicle, license, DEFAULT_RATING, status_str, at_str],
            )?;
            tx.commit()?;
            Ok(())
          }
        };
        Ok(res)
      })
      .await?;
    out?;

    Ok(driver)
  }

  async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDriver> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT driver_id, vehicle, license, rating, status, lat, lng, updated_at
               FROM drivers WHERE driver_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawDriver {
                  driver_id:  row.get(0)?,
                  vehicle:    row.get(1)?,
                  license:    row.get(2)?,
                  rating:     row.get(3)?,
                  status:     row.get(4)?,
                  lat:        row.get(5)?,
                  lng:        row.get(6)?,
                  updated_at: row.get(7)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDriver::into_driver).transpose()
  }

  // ── Availability ──────────────────────────────────────────────────────────

  async fn set_driver_available(&self, driver_id: Uuid, location: Coordinates) -> Result<Driver> {
    self
      .toggle_driver(driver_id, DriverStatus::Idle, Some(location))
      .await
  }

  async fn set_driver_offline(&self, driver_id: Uuid) -> Result<Driver> {
    self.toggle_driver(driver_id, DriverStatus::Offline, None).await
  }

  async fn available_drivers(&self) -> Result<Vec<AvailableDriver>> {
    struct RawAvailable {
      driver_id:  String,
      lat:        f64,
      lng:        f64,
      rating:     f64,
      updated_at: String,
    }

    let raws: Vec<RawAvailable> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT driver_id, lat, lng, rating, updated_at
           FROM drivers
           WHERE status = 'idle' AND lat IS NOT NULL AND lng IS NOT NULL",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawAvailable {
              driver_id:  row.get(0)?,
              lat:        row.get(1)?,
              lng:        row.get(2)?,
              rating:     row.get(3)?,
              updated_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| {
        Ok(AvailableDriver {
          driver_id:  decode_uuid(&raw.driver_id)?,
          location:   Coordinates::new(raw.lat, raw.lng),
          rating:     raw.rating,
          updated_at: decode_dt(&raw.updated_at)?,
        })
      })
      .collect()
  }

  // ── Rides ─────────────────────────────────────────────────────────────────

  async fn create_ride(&self, request: RideRequest) -> Result<Ride> {
    let now = Utc::now();
    let ride = Ride {
      ride_id:     Uuid::new_v4(),
      rider_id:    request.rider_id,
      driver_id:   None,
      origin:      request.origin,
      destination: request.destination,
      status:      RideStatus::Requested,
      fare:        None,
      created_at:  now,
      updated_at:  now,
    };

    let event = RideEvent::new(
      ride.ride_id,
      EventPayload::Requested { rider_id: ride.rider_id },
      now,
    );

    let ride_id_str  = encode_uuid(ride.ride_id);
    let rider_id_str = encode_uuid(ride.rider_id);
    let status_str   = encode_ride_status(ride.status).to_owned();
    let at_str       = encode_dt(now);
    let origin       = ride.origin;
    let destination  = ride.destination;
    let event_row    = encode_event(&event)?;

    let out: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let rider_exists: bool = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![rider_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if !rider_exists {
          return Ok(Err(Error::Core(CoreError::UserNotFound(request.rider_id))));
        }

        tx.execute(
          "INSERT INTO rides (
             ride_id, rider_id, driver_id,
             origin_lat, origin_lng, dest_lat, dest_lng,
             status, fare, created_at, updated_at
           ) VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?8)",
          rusqlite::params![
            ride_id_str,
            rider_id_str,
            origin.lat,
            origin.lng,
            destination.lat,
            destination.lng,
            status_str,
            at_str,
          ],
        )?;
        insert_event(&tx, &event_row)?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    out?;

    Ok(ride)
  }

  async fn get_ride(&self, id: Uuid) -> Result<Option<Ride>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRide> = self
      .conn
      .call(move |conn| Ok(query_ride_raw(conn, &id_str)?))
      .await?;

    raw.map(RawRide::into_ride).transpose()
  }

  async fn delete_ride(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM rides WHERE ride_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if deleted == 0 {
      return Err(Error::Core(CoreError::RideNotFound(id)));
    }
    Ok(())
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  async fn reserve(&self, ride_id: Uuid, driver_id: Uuid) -> Result<ReserveOutcome> {
    let out: Result<ReserveOutcome> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Ok(reserve_in_tx(tx, ride_id, driver_id))
      })
      .await?;
    out
  }

  async fn apply(&self, ride_id: Uuid, action: RideAction) -> Result<TransitionOutcome> {
    let out: Result<TransitionOutcome> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Ok(apply_in_tx(tx, ride_id, &action))
      })
      .await?;
    out
  }

  async fn record_match_failed(&self, ride_id: Uuid, attempts: u32) -> Result<RideEvent> {
    let event = RideEvent::new(ride_id, EventPayload::MatchFailed { attempts }, Utc::now());
    let event_row = encode_event(&event)?;
    let id_str = encode_uuid(ride_id);

    let out: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM rides WHERE ride_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(Err(Error::Core(CoreError::RideNotFound(ride_id))));
        }

        insert_event(&tx, &event_row)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    out?;

    Ok(event)
  }

  // ── Audit & payments ──────────────────────────────────────────────────────

  async fn events_for(&self, ride_id: Uuid) -> Result<Vec<RideEvent>> {
    let id_str = encode_uuid(ride_id);

    let raws: Vec<crate::encode::RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, ride_id, payload, recorded_at
           FROM ride_events
           WHERE ride_id = ?1
           ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(crate::encode::RawEvent {
              event_id:    row.get(0)?,
              ride_id:     row.get(1)?,
              payload:     row.get(2)?,
              recorded_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(crate::encode::RawEvent::into_event)
      .collect()
  }

  async fn payment_for(&self, ride_id: Uuid) -> Result<Option<Payment>> {
    let id_str = encode_uuid(ride_id);

    let raw: Option<RawPayment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT payment_id, ride_id, amount, currency, status, processor_ref, created_at
               FROM payments WHERE ride_id = ?1",
              rusqlite::params![id_str],
              map_payment_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPayment::into_payment).transpose()
  }

  async fn set_payment_status(
    &self,
    payment_id: Uuid,
    status: PaymentStatus,
    processor_ref: Option<String>,
  ) -> Result<Payment> {
    let id_str     = encode_uuid(payment_id);
    let status_str = encode_payment_status(status).to_owned();
    let ref_param  = processor_ref;

    let out: Result<RawPayment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawPayment> = tx
          .query_row(
            "SELECT payment_id, ride_id, amount, currency, status, processor_ref, created_at
             FROM payments WHERE payment_id = ?1",
            rusqlite::params![id_str],
            map_payment_row,
          )
          .optional()?;

        let Some(mut raw) = raw else {
          return Ok(Err(Error::Core(CoreError::PaymentNotFound(payment_id))));
        };

        // A reference, once recorded, is never cleared by a later step.
        if let Some(r) = &ref_param {
          raw.processor_ref = Some(r.clone());
        }
        raw.status = status_str.clone();

        tx.execute(
          "UPDATE payments SET status = ?2, processor_ref = ?3 WHERE payment_id = ?1",
          rusqlite::params![id_str, status_str, raw.processor_ref],
        )?;

        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    out?.into_payment()
  }
}

impl SqliteStore {
  /// Shared implementation of the manual availability toggles. Guarded:
  /// a reserved driver can only be released by the lifecycle.
  async fn toggle_driver(
    &self,
    driver_id: Uuid,
    to: DriverStatus,
    location: Option<Coordinates>,
  ) -> Result<Driver> {
    let id_str     = encode_uuid(driver_id);
    let status_str = encode_driver_status(to).to_owned();
    let now        = Utc::now();
    let at_str     = encode_dt(now);

    let out: Result<RawDriver> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawDriver> = tx
          .query_row(
            "SELECT driver_id, vehicle, license, rating, status, lat, lng, updated_at
             FROM drivers WHERE driver_id = ?1",
            rusqlite::params![id_str],
            map_driver_row,
          )
          .optional()?;

        let Some(mut raw) = raw else {
          return Ok(Err(Error::Core(CoreError::DriverNotFound(driver_id))));
        };
        if raw.status == encode_driver_status(DriverStatus::Reserved) {
          return Ok(Err(Error::Core(CoreError::DriverReserved(driver_id))));
        }

        if let Some(loc) = location {
          raw.lat = Some(loc.lat);
          raw.lng = Some(loc.lng);
        }
        raw.status = status_str.clone();
        raw.updated_at = at_str.clone();

        tx.execute(
          "UPDATE drivers SET status = ?2, lat = ?3, lng = ?4, updated_at = ?5
           WHERE driver_id = ?1",
          rusqlite::params![id_str, status_str, raw.lat, raw.lng, at_str],
        )?;

        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    out?.into_driver()
  }
}

// ─── Transactional helpers ───────────────────────────────────────────────────
//
// These run on the connection's worker thread, inside an open transaction.
// Returning early drops the transaction, which rolls it back; only the
// success paths commit. Errors map through `crate::Error` so decode and
// serde failures propagate without partial writes.

/// A pre-serialised event ready for insertion.
struct EventRow {
  event_id:    String,
  ride_id:     String,
  kind:        String,
  payload:     String,
  recorded_at: String,
}

fn encode_event(event: &RideEvent) -> Result<EventRow> {
  Ok(EventRow {
    event_id:    encode_uuid(event.event_id),
    ride_id:     encode_uuid(event.ride_id),
    kind:        event.payload.kind().to_owned(),
    payload:     serde_json::to_string(&event.payload)?,
    recorded_at: encode_dt(event.recorded_at),
  })
}

// Returns the raw rusqlite error so callers on either side of the
// closure boundary can convert it to their own error type.
fn insert_event(tx: &rusqlite::Transaction<'_>, row: &EventRow) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO ride_events (event_id, ride_id, kind, payload, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![row.event_id, row.ride_id, row.kind, row.payload, row.recorded_at],
  )?;
  Ok(())
}

fn map_driver_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDriver> {
  Ok(RawDriver {
    driver_id:  row.get(0)?,
    vehicle:    row.get(1)?,
    license:    row.get(2)?,
    rating:     row.get(3)?,
    status:     row.get(4)?,
    lat:        row.get(5)?,
    lng:        row.get(6)?,
    updated_at: row.get(7)?,
  })
}

fn map_payment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPayment> {
  Ok(RawPayment {
    payment_id:    row.get(0)?,
    ride_id:       row.get(1)?,
    amount:        row.get(2)?,
    currency:      row.get(3)?,
    status:        row.get(4)?,
    processor_ref: row.get(5)?,
    created_at:    row.get(6)?,
  })
}

fn query_ride_raw(conn: &rusqlite::Connection, id_str: &str) -> rusqlite::Result<Option<RawRide>> {
  conn
    .query_row(
      "SELECT ride_id, rider_id, driver_id,
              origin_lat, origin_lng, dest_lat, dest_lng,
              status, fare, created_at, updated_at
       FROM rides WHERE ride_id = ?1",
      rusqlite::params![id_str],
      |row| {
        Ok(RawRide {
          ride_id:    row.get(0)?,
          rider_id:   row.get(1)?,
          driver_id:  row.get(2)?,
          origin_lat: row.get(3)?,
          origin_lng: row.get(4)?,
          dest_lat:   row.get(5)?,
          dest_lng:   row.get(6)?,
          status:     row.get(7)?,
          fare:       row.get(8)?,
          created_at: row.get(9)?,
          updated_at: row.get(10)?,
        })
      },
    )
    .optional()
}

fn driver_status_in_tx(
  tx: &rusqlite::Transaction<'_>,
  driver_id_str: &str,
) -> Result<Option<DriverStatus>> {
  let status: Option<String> = tx
    .query_row(
      "SELECT status FROM drivers WHERE driver_id = ?1",
      rusqlite::params![driver_id_str],
      |r| r.get(0),
    )
    .optional()?;
  status.as_deref().map(decode_driver_status).transpose()
}

/// Atomic reservation: re-check both guards under the transaction, then
/// flip the driver, assign the ride, and log the event together.
fn reserve_in_tx(
  tx: rusqlite::Transaction<'_>,
  ride_id: Uuid,
  driver_id: Uuid,
) -> Result<ReserveOutcome> {
  let ride_id_str = encode_uuid(ride_id);
  let driver_id_str = encode_uuid(driver_id);

  let Some(raw) = query_ride_raw(&tx, &ride_id_str)? else {
    return Err(Error::Core(CoreError::RideNotFound(ride_id)));
  };
  let mut ride = raw.into_ride()?;

  // The ride may have been claimed or canceled since the caller matched.
  if ride.status != RideStatus::Requested {
    return Ok(ReserveOutcome::RideClosed);
  }
  // The driver may have been reserved by a concurrent dispatch, gone
  // offline, or been deleted since the availability snapshot.
  if driver_status_in_tx(&tx, &driver_id_str)? != Some(DriverStatus::Idle) {
    return Ok(ReserveOutcome::Conflict);
  }

  let now = Utc::now();
  let at_str = encode_dt(now);

  tx.execute(
    "UPDATE drivers SET status = 'reserved', updated_at = ?2 WHERE driver_id = ?1",
    rusqlite::params![driver_id_str, at_str],
  )?;
  tx.execute(
    "UPDATE rides SET driver_id = ?2, status = 'assigned', updated_at = ?3
     WHERE ride_id = ?1",
    rusqlite::params![ride_id_str, driver_id_str, at_str],
  )?;

  let event = RideEvent::new(
    ride_id,
    EventPayload::Transition {
      from:   RideStatus::Requested,
      to:     RideStatus::Assigned,
      actor:  Actor::System,
      reason: None,
    },
    now,
  );
  insert_event(&tx, &encode_event(&event)?)?;

  tx.commit()?;

  ride.driver_id = Some(driver_id);
  ride.status = RideStatus::Assigned;
  ride.updated_at = now;
  Ok(ReserveOutcome::Reserved(ride))
}

/// Re-plan the action against the rows read under this transaction and
/// commit every planned effect, or none.
fn apply_in_tx(
  tx: rusqlite::Transaction<'_>,
  ride_id: Uuid,
  action: &RideAction,
) -> Result<TransitionOutcome> {
  let ride_id_str = encode_uuid(ride_id);

  let Some(raw) = query_ride_raw(&tx, &ride_id_str)? else {
    return Err(Error::Core(CoreError::RideNotFound(ride_id)));
  };
  let mut ride = raw.into_ride()?;

  let transition = match lifecycle::plan(&ride, action) {
    Ok(Step::Apply(t)) => t,
    Ok(Step::NoOp) => return Ok(TransitionOutcome::NoOp(ride)),
    Err(CoreError::InvalidTransition { from, attempted }) => {
      return Ok(TransitionOutcome::Rejected { from, attempted });
    }
    Err(e) => return Err(Error::Core(e)),
  };

  let now = Utc::now();
  let at_str = encode_dt(now);

  match transition.driver_effect {
    DriverEffect::None => {}
    DriverEffect::Reserve(driver_id) => {
      let driver_id_str = encode_uuid(driver_id);
      // Assignment through `apply` carries the same guard as `reserve`;
      // a driver who is no longer idle rejects the transition.
      if driver_status_in_tx(&tx, &driver_id_str)? != Some(DriverStatus::Idle) {
        return Ok(TransitionOutcome::Rejected {
          from:      transition.from,
          attempted: transition.to,
        });
      }
      tx.execute(
        "UPDATE drivers SET status = 'reserved', updated_at = ?2 WHERE driver_id = ?1",
        rusqlite::params![driver_id_str, at_str],
      )?;
      tx.execute(
        "UPDATE rides SET driver_id = ?2 WHERE ride_id = ?1",
        rusqlite::params![ride_id_str, driver_id_str],
      )?;
      ride.driver_id = Some(driver_id);
    }
    DriverEffect::Release(driver_id) => {
      // Restore availability. The status guard keeps this a no-op if the
      // driver row was deleted or already released.
      tx.execute(
        "UPDATE drivers SET status = 'idle', updated_at = ?2
         WHERE driver_id = ?1 AND status = 'reserved'",
        rusqlite::params![encode_uuid(driver_id), at_str],
      )?;
    }
  }

  if let Some(fare) = transition.fare {
    tx.execute(
      "UPDATE rides SET fare = ?2 WHERE ride_id = ?1",
      rusqlite::params![ride_id_str, fare],
    )?;
    ride.fare = Some(fare);

    let payment_id = Uuid::new_v4();
    tx.execute(
      "INSERT INTO payments (payment_id, ride_id, amount, currency, status, processor_ref, created_at)
       VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5)",
      rusqlite::params![encode_uuid(payment_id), ride_id_str, fare, CURRENCY, at_str],
    )?;
  }

  if transition.to == RideStatus::Canceled {
    // `driver_id` is non-null exactly in the statuses that require a
    // driver; a canceled ride drops its assignment.
    tx.execute(
      "UPDATE rides SET driver_id = NULL, status = ?2, updated_at = ?3 WHERE ride_id = ?1",
      rusqlite::params![ride_id_str, encode_ride_status(transition.to), at_str],
    )?;
    ride.driver_id = None;
  } else {
    tx.execute(
      "UPDATE rides SET status = ?2, updated_at = ?3 WHERE ride_id = ?1",
      rusqlite::params![ride_id_str, encode_ride_status(transition.to), at_str],
    )?;
  }

  let event = RideEvent::new(
    ride_id,
    EventPayload::Transition {
      from:   transition.from,
      to:     transition.to,
      actor:  transition.actor,
      reason: transition.reason.clone(),
    },
    now,
  );
  insert_event(&tx, &encode_event(&event)?)?;

  tx.commit()?;

  ride.status = transition.to;
  ride.updated_at = now;
  Ok(TransitionOutcome::Applied { ride, event })
}
