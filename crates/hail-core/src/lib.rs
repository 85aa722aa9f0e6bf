//! Core types and trait definitions for the Hail dispatch engine.
//!
//! This crate is deliberately free of database and runtime dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod driver;
pub mod error;
pub mod event;
pub mod fare;
pub mod geo;
pub mod lifecycle;
pub mod payment;
pub mod processor;
pub mod ride;
pub mod store;
pub mod user;

pub use error::{Error, Result};
