//! Core location types for backtrail.
//!
//! A [`LocationFix`] is what a provider reports; a [`LocationRecord`] is what
//! the store keeps.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Years that have a four-digit RFC 3339 form. Timestamps outside this range
/// cannot be stored.
pub const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// Whether `ts` can be written to and read back from the store.
#[must_use]
pub fn is_storable_timestamp(ts: DateTime<Utc>) -> bool {
    STORABLE_YEARS.contains(&ts.year())
}

/// A single position report delivered by a location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Device clock time of the fix.
    pub timestamp: DateTime<Utc>,
    /// Estimated horizontal error in meters, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

impl LocationFix {
    /// Create a fix without an accuracy estimate.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            horizontal_accuracy: None,
        }
    }

    /// The fix position.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Whether the fix timestamp is within [`STORABLE_YEARS`].
    #[must_use]
    pub fn has_storable_timestamp(&self) -> bool {
        is_storable_timestamp(self.timestamp)
    }
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Convert to a `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// A recorded location.
///
/// Records are immutable once created; the store never updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Row id, assigned when the record is saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Device clock time of the fix.
    pub location_timestamp: DateTime<Utc>,

    /// When the record was staged for writing.
    pub inserted_timestamp: DateTime<Utc>,
}

impl LocationRecord {
    /// Create an unsaved record stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, location_timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            latitude,
            longitude,
            location_timestamp,
            inserted_timestamp: Utc::now(),
        }
    }

    /// The recorded position.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Whether the record has been written to the store.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}
