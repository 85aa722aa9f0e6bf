//! SQLite backend for the Hail dispatch store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every transition that
//! touches both a ride and its driver executes in a single rusqlite
//! transaction, which is what gives the optimistic reservation loop its
//! all-or-nothing guarantee.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
