//! Error type for `hail-dispatch`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain rejections: invalid transitions, missing entities, guard
  /// failures. Reservation conflicts never surface here; the coordinator
  /// retries them internally.
  #[error("core error: {0}")]
  Core(#[from] hail_core::Error),

  /// The backing store failed. Boxed because the engine is generic over
  /// the store implementation.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
