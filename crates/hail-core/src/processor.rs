//! The payment-processor capability the engine consumes.
//!
//! Authorization and capture run after the ride's completion has already
//! committed; they never block a ride-state commit, and a processor
//! failure is a billing exception, never a ride rollback.

use std::future::Future;

use crate::payment::Payment;

/// The processor's verdict on a single authorize or capture call.
#[derive(Debug, Clone)]
pub enum ProcessorDecision {
  /// Approved. `reference` is the processor's opaque token for the charge.
  Approved { reference: String },
  /// Declined for the stated reason. The engine does not retry declines.
  Declined { reason: String },
}

/// An external payment processor.
///
/// `Self::Error` covers transport-level failures (the processor was
/// unreachable); a reachable processor that says no is a
/// [`ProcessorDecision::Declined`].
pub trait PaymentProcessor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Place a hold for the payment's amount.
  fn authorize<'a>(
    &'a self,
    payment: &'a Payment,
  ) -> impl Future<Output = Result<ProcessorDecision, Self::Error>> + Send + 'a;

  /// Capture a previously authorized hold.
  fn capture<'a>(
    &'a self,
    payment: &'a Payment,
  ) -> impl Future<Output = Result<ProcessorDecision, Self::Error>> + Send + 'a;
}
