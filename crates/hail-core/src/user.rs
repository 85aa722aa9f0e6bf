//! User — the account record shared by riders and drivers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a user plays on the platform. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Rider,
  Driver,
}

/// An account record.
///
/// The credential is an opaque secret: the engine stores it and never
/// interprets it. Verification belongs to an external authentication
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  pub display_name: String,
  /// Unique contact identifier (email or phone number, uninterpreted).
  pub contact:      String,
  pub credential:   String,
  pub role:         Role,
  pub created_at:   DateTime<Utc>,
}

/// Input for [`DispatchStore::add_user`](crate::store::DispatchStore::add_user).
#[derive(Debug, Clone)]
pub struct NewUser {
  pub display_name: String,
  pub contact:      String,
  pub credential:   String,
  pub role:         Role,
}
