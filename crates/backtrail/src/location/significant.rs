//! Significant-change filtering.
//!
//! Providers that report every fix use this to only pass on fixes that moved
//! far enough from the last one delivered.

use geo::{Distance, Haversine};
use tracing::trace;

use crate::record::{Coordinate, LocationFix};

/// Great-circle distance between two coordinates in meters.
#[must_use]
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    Haversine::distance(a.to_point(), b.to_point())
}

/// Passes a fix only when it is at least `min_distance_m` from the last
/// fix that passed.
#[derive(Debug, Clone)]
pub struct SignificantChangeFilter {
    min_distance_m: f64,
    last: Option<Coordinate>,
}

impl SignificantChangeFilter {
    /// Create a filter. A threshold of 0 passes everything.
    #[must_use]
    pub fn new(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            last: None,
        }
    }

    /// The distance threshold in meters.
    #[must_use]
    pub fn min_distance_m(&self) -> f64 {
        self.min_distance_m
    }

    /// Decide whether `fix` is a significant change, remembering it if so.
    pub fn accept(&mut self, fix: &LocationFix) -> bool {
        let here = fix.coordinate();
        if let Some(last) = self.last {
            let moved = distance_m(last, here);
            if moved < self.min_distance_m {
                trace!("dropping fix {:.1} m from last significant change", moved);
                return false;
            }
        }
        self.last = Some(here);
        true
    }

    /// Keep the significant fixes of a batch, in order.
    pub fn filter_batch(&mut self, fixes: impl IntoIterator<Item = LocationFix>) -> Vec<LocationFix> {
        fixes.into_iter().filter(|fix| self.accept(fix)).collect()
    }
}
