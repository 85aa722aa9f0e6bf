//! Error types for `hail-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::ride::RideStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// A lifecycle guard failed. Reports the state the ride was in and the
  /// state the rejected action tried to reach. Never partially applied.
  #[error("invalid transition: {from} -> {attempted}")]
  InvalidTransition {
    from:      RideStatus,
    attempted: RideStatus,
  },

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("driver not found: {0}")]
  DriverNotFound(Uuid),

  #[error("ride not found: {0}")]
  RideNotFound(Uuid),

  #[error("payment not found: {0}")]
  PaymentNotFound(Uuid),

  /// An availability toggle arrived while the driver is held by an active
  /// ride. The reservation is released by the lifecycle, not by the driver.
  #[error("driver {0} is reserved by an active ride")]
  DriverReserved(Uuid),

  #[error("user {0} does not have the driver role")]
  NotADriver(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
