//! Greedy nearest-driver matching with a widening search radius.

use std::collections::HashSet;

use hail_core::{geo::Coordinates, store::DispatchStore};
use tracing::debug;
use uuid::Uuid;

use crate::{
  availability::{AvailabilityIndex, Candidate},
  config::DispatchConfig,
  error::Result,
};

/// Selects one candidate per call. Stateless beyond its configuration; the
/// caller owns the exclusion set accumulated across reservation conflicts.
pub struct Matcher<S> {
  availability: AvailabilityIndex<S>,
  config:       DispatchConfig,
}

impl<S: DispatchStore> Matcher<S> {
  pub fn new(availability: AvailabilityIndex<S>, config: DispatchConfig) -> Self {
    Self { availability, config }
  }

  /// The best candidate for a pickup at `origin`, or `None` if no eligible
  /// driver exists within the maximum radius.
  ///
  /// Searches outward in rings: the radius starts at
  /// `initial_radius_km` and doubles until it reaches `max_radius_km`
  /// (inclusive). The first non-empty ring wins; a wider ring can never
  /// beat a nearer driver because ordering is by distance.
  pub async fn select(
    &self,
    origin: Coordinates,
    excluded: &HashSet<Uuid>,
  ) -> Result<Option<Candidate>> {
    let mut radius_km = self.config.initial_radius_km;
    loop {
      let ring = self.availability.candidates(origin, radius_km, excluded).await?;
      if let Some(candidate) = ring.into_iter().next() {
        debug!(
          driver_id = %candidate.driver_id,
          distance_km = candidate.distance_km,
          radius_km,
          "matched candidate",
        );
        return Ok(Some(candidate));
      }
      if radius_km >= self.config.max_radius_km {
        debug!(radius_km, "search exhausted with no candidate");
        return Ok(None);
      }
      radius_km = (radius_km * 2.0).min(self.config.max_radius_km);
    }
  }
}

impl<S> Clone for Matcher<S> {
  fn clone(&self) -> Self {
    Self {
      availability: self.availability.clone(),
      config:       self.config.clone(),
    }
  }
}
