//! The Hail dispatch engine.
//!
//! Sits on top of any [`hail_core::store::DispatchStore`] and drives the
//! ride lifecycle: snapshotting available drivers, matching with a widening
//! search radius, reserving a driver optimistically with bounded retry, and
//! settling payment after completion. Persistence and the payment processor
//! are injected; this crate holds only coordination logic.

pub mod availability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod payment;

pub use config::DispatchConfig;
pub use coordinator::{Coordinator, DispatchOutcome};
pub use error::{Error, Result};
