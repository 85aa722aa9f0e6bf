//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Event payloads are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings. Enum columns hold the same lowercase tags serde uses.

use chrono::{DateTime, Utc};
use hail_core::{
  driver::{Driver, DriverStatus, clamp_rating},
  event::{EventPayload, RideEvent},
  geo::Coordinates,
  payment::{Payment, PaymentStatus},
  ride::{Ride, RideStatus},
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Rider => "rider",
    Role::Driver => "driver",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "rider" => Ok(Role::Rider),
    "driver" => Ok(Role::Driver),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

// ─── DriverStatus ────────────────────────────────────────────────────────────

pub fn encode_driver_status(s: DriverStatus) -> &'static str {
  match s {
    DriverStatus::Offline => "offline",
    DriverStatus::Idle => "idle",
    DriverStatus::Reserved => "reserved",
  }
}

pub fn decode_driver_status(s: &str) -> Result<DriverStatus> {
  match s {
    "offline" => Ok(DriverStatus::Offline),
    "idle" => Ok(DriverStatus::Idle),
    "reserved" => Ok(DriverStatus::Reserved),
    other => Err(Error::Decode(format!("unknown driver status: {other:?}"))),
  }
}

// ─── RideStatus ──────────────────────────────────────────────────────────────

pub fn encode_ride_status(s: RideStatus) -> &'static str { s.as_str() }

pub fn decode_ride_status(s: &str) -> Result<RideStatus> {
  match s {
    "requested" => Ok(RideStatus::Requested),
    "assigned" => Ok(RideStatus::Assigned),
    "enroute" => Ok(RideStatus::Enroute),
    "started" => Ok(RideStatus::Started),
    "completed" => Ok(RideStatus::Completed),
    "canceled" => Ok(RideStatus::Canceled),
    other => Err(Error::Decode(format!("unknown ride status: {other:?}"))),
  }
}

// ─── PaymentStatus ───────────────────────────────────────────────────────────

pub fn encode_payment_status(s: PaymentStatus) -> &'static str {
  match s {
    PaymentStatus::Pending => "pending",
    PaymentStatus::Authorized => "authorized",
    PaymentStatus::Captured => "captured",
    PaymentStatus::Failed => "failed",
  }
}

pub fn decode_payment_status(s: &str) -> Result<PaymentStatus> {
  match s {
    "pending" => Ok(PaymentStatus::Pending),
    "authorized" => Ok(PaymentStatus::Authorized),
    "captured" => Ok(PaymentStatus::Captured),
    "failed" => Ok(PaymentStatus::Failed),
    other => Err(Error::Decode(format!("unknown payment status: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:      String,
  pub display_name: String,
  pub contact:      String,
  pub credential:   String,
  pub role:         String,
  pub created_at:   String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:      decode_uuid(&self.user_id)?,
      display_name: self.display_name,
      contact:      self.contact,
      credential:   self.credential,
      role:         decode_role(&self.role)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `drivers` row.
pub struct RawDriver {
  pub driver_id:  String,
  pub vehicle:    String,
  pub license:    String,
  pub rating:     f64,
  pub status:     String,
  pub lat:        Option<f64>,
  pub lng:        Option<f64>,
  pub updated_at: String,
}

impl RawDriver {
  pub fn into_driver(self) -> Result<Driver> {
    let location = match (self.lat, self.lng) {
      (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
      _ => None,
    };
    Ok(Driver {
      driver_id: decode_uuid(&self.driver_id)?,
      vehicle: self.vehicle,
      license: self.license,
      // Bound whatever the column holds; ratings are written elsewhere.
      rating: clamp_rating(self.rating),
      status: decode_driver_status(&self.status)?,
      location,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `rides` row.
pub struct RawRide {
  pub ride_id:    String,
  pub rider_id:   String,
  pub driver_id:  Option<String>,
  pub origin_lat: f64,
  pub origin_lng: f64,
  pub dest_lat:   f64,
  pub dest_lng:   f64,
  pub status:     String,
  pub fare:       Option<f64>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRide {
  pub fn into_ride(self) -> Result<Ride> {
    Ok(Ride {
      ride_id:     decode_uuid(&self.ride_id)?,
      rider_id:    decode_uuid(&self.rider_id)?,
      driver_id:   self.driver_id.as_deref().map(decode_uuid).transpose()?,
      origin:      Coordinates::new(self.origin_lat, self.origin_lng),
      destination: Coordinates::new(self.dest_lat, self.dest_lng),
      status:      decode_ride_status(&self.status)?,
      fare:        self.fare,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `ride_events` row.
pub struct RawEvent {
  pub event_id:    String,
  pub ride_id:     String,
  pub payload:     String,
  pub recorded_at: String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<RideEvent> {
    Ok(RideEvent {
      event_id:    decode_uuid(&self.event_id)?,
      ride_id:     decode_uuid(&self.ride_id)?,
      payload:     serde_json::from_str::<EventPayload>(&self.payload)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read directly from a `payments` row.
pub struct RawPayment {
  pub payment_id:    String,
  pub ride_id:       String,
  pub amount:        f64,
  pub currency:      String,
  pub status:        String,
  pub processor_ref: Option<String>,
  pub created_at:    String,
}

impl RawPayment {
  pub fn into_payment(self) -> Result<Payment> {
    Ok(Payment {
      payment_id:    decode_uuid(&self.payment_id)?,
      ride_id:       decode_uuid(&self.ride_id)?,
      amount:        self.amount,
      currency:      self.currency,
      status:        decode_payment_status(&self.status)?,
      processor_ref: self.processor_ref,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
