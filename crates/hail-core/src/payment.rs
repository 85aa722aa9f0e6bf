//! Payment — the billing record created when a ride completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement currency. Single-currency platform for now.
pub const CURRENCY: &str = "USD";

/// Where the payment stands with the external processor.
///
/// A failed payment is a billing exception handled out of band; it never
/// rolls back the ride's completed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Authorized,
  Captured,
  Failed,
}

impl PaymentStatus {
  /// No further settlement work is performed from these states.
  pub fn is_settled(&self) -> bool {
    matches!(self, Self::Captured | Self::Failed)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
  pub payment_id:    Uuid,
  /// At most one payment exists per ride, and only for completed rides.
  pub ride_id:       Uuid,
  pub amount:        f64,
  pub currency:      String,
  pub status:        PaymentStatus,
  /// Opaque reference returned by the processor on authorization.
  pub processor_ref: Option<String>,
  pub created_at:    DateTime<Utc>,
}
