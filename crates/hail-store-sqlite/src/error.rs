//! Error type for `hail-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain errors (guard failures, missing entities) surface through the
  /// core taxonomy rather than duplicated variants here.
  #[error("core error: {0}")]
  Core(#[from] hail_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Raw rusqlite errors from statements run inside a transaction.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored row could not be decoded (bad timestamp, unknown enum tag).
  #[error("row decode error: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
