//! The availability index: which drivers are eligible for matching, and
//! in what order they should be offered a ride.
//!
//! Candidate reads are point-in-time snapshots. A snapshot may be stale by
//! the time a reservation is attempted; the store's atomic reservation
//! re-checks eligibility, and the coordinator retries on conflict.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use hail_core::{driver::Driver, geo::Coordinates, store::DispatchStore};
use uuid::Uuid;

use crate::error::{Error, Result};

/// An idle driver eligible for a specific ride, with the distance that
/// ranked it.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub driver_id:   Uuid,
  pub location:    Coordinates,
  pub distance_km: f64,
  pub rating:      f64,
  /// When the driver entered the idle pool; older is served first.
  pub idle_since:  DateTime<Utc>,
}

/// Read/write surface over driver availability.
pub struct AvailabilityIndex<S> {
  store: Arc<S>,
}

impl<S: DispatchStore> AvailabilityIndex<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Manual on-duty toggle at `location`. Fails while the driver is
  /// reserved by an active ride.
  pub async fn mark_available(&self, driver_id: Uuid, location: Coordinates) -> Result<Driver> {
    self
      .store
      .set_driver_available(driver_id, location)
      .await
      .map_err(Error::store)
  }

  /// Manual off-duty toggle. Fails while the driver is reserved.
  pub async fn mark_unavailable(&self, driver_id: Uuid) -> Result<Driver> {
    self
      .store
      .set_driver_offline(driver_id)
      .await
      .map_err(Error::store)
  }

  /// Idle drivers within `radius_km` of `origin`, excluding `excluded`,
  /// ordered nearest first. Ties go to the higher rating, then to the
  /// driver who has been idle longest.
  pub async fn candidates(
    &self,
    origin: Coordinates,
    radius_km: f64,
    excluded: &HashSet<Uuid>,
  ) -> Result<Vec<Candidate>> {
    let snapshot = self.store.available_drivers().await.map_err(Error::store)?;

    let mut candidates: Vec<Candidate> = snapshot
      .into_iter()
      .filter(|d| !excluded.contains(&d.driver_id))
      .map(|d| Candidate {
        driver_id:   d.driver_id,
        location:    d.location,
        distance_km: origin.distance_km(&d.location),
        rating:      d.rating,
        idle_since:  d.updated_at,
      })
      .filter(|c| c.distance_km <= radius_km)
      .collect();

    candidates.sort_by(|a, b| {
      a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| a.idle_since.cmp(&b.idle_since))
    });

    Ok(candidates)
  }
}

// Manual impl; `#[derive(Clone)]` would require `S: Clone`.
impl<S> Clone for AvailabilityIndex<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store) }
  }
}
