//! Post-completion payment settlement.
//!
//! Runs after the ride's completion has committed, off the ride's critical
//! path. A processor decline or transport failure marks the payment failed
//! for out-of-band handling; the ride stays completed either way.

use hail_core::{
  Error as CoreError,
  payment::{Payment, PaymentStatus},
  processor::{PaymentProcessor, ProcessorDecision},
  store::DispatchStore,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Drive the ride's pending payment to a settled state:
/// pending, authorize, capture. Returns the payment as finally recorded.
pub async fn settle<S, P>(store: &S, processor: &P, ride_id: Uuid) -> Result<Payment>
where
  S: DispatchStore,
  P: PaymentProcessor,
{
  let payment = store
    .payment_for(ride_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::Core(CoreError::PaymentNotFound(ride_id)))?;

  if payment.status.is_settled() {
    return Ok(payment);
  }

  let payment = match processor.authorize(&payment).await {
    Ok(ProcessorDecision::Approved { reference }) => store
      .set_payment_status(payment.payment_id, PaymentStatus::Authorized, Some(reference))
      .await
      .map_err(Error::store)?,
    Ok(ProcessorDecision::Declined { reason }) => {
      warn!(%ride_id, reason, "authorization declined");
      return fail(store, &payment).await;
    }
    Err(e) => {
      warn!(%ride_id, error = %e, "processor unreachable during authorization");
      return fail(store, &payment).await;
    }
  };

  match processor.capture(&payment).await {
    Ok(ProcessorDecision::Approved { reference }) => {
      let payment = store
        .set_payment_status(payment.payment_id, PaymentStatus::Captured, Some(reference))
        .await
        .map_err(Error::store)?;
      info!(%ride_id, amount = payment.amount, "payment captured");
      Ok(payment)
    }
    Ok(ProcessorDecision::Declined { reason }) => {
      warn!(%ride_id, reason, "capture declined");
      fail(store, &payment).await
    }
    Err(e) => {
      warn!(%ride_id, error = %e, "processor unreachable during capture");
      fail(store, &payment).await
    }
  }
}

async fn fail<S: DispatchStore>(store: &S, payment: &Payment) -> Result<Payment> {
  store
    .set_payment_status(payment.payment_id, PaymentStatus::Failed, None)
    .await
    .map_err(Error::store)
}
