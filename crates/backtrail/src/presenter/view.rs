//! What the controller asks a view to show.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::Serialize;

use crate::record::{Coordinate, LocationRecord};

/// Short date, medium time: `1/7/24, 12:00:00 PM`.
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%y, %-I:%M:%S %p";

/// How the map camera behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// The camera stays where the user left it.
    #[default]
    Free,
    /// The camera follows the current position.
    Follow,
}

/// Stroke used for the trail polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailStyle {
    /// Stroke color name.
    pub stroke_color: String,
    /// Stroke width in points.
    pub line_width: f64,
}

impl Default for TrailStyle {
    fn default() -> Self {
        Self {
            stroke_color: "blue".to_string(),
            line_width: 4.0,
        }
    }
}

/// A full map render: every pin and the trail joining them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapScene {
    /// One pin per record, in display order.
    pub pins: Vec<Coordinate>,
    /// The trail polyline, through the pins in display order.
    pub trail: Vec<Coordinate>,
    /// Trail stroke.
    pub style: TrailStyle,
    /// Camera behavior.
    pub camera: CameraMode,
}

impl MapScene {
    /// Build a scene from records in display order.
    #[must_use]
    pub fn from_records(records: &[LocationRecord], style: TrailStyle, camera: CameraMode) -> Self {
        let pins: Vec<Coordinate> = records.iter().map(LocationRecord::coordinate).collect();
        Self {
            trail: pins.clone(),
            pins,
            style,
            camera,
        }
    }
}

/// One table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationRow {
    /// `longitude, latitude`.
    pub coordinate: String,
    /// `<location time> @ <inserted time>`.
    pub timestamps: String,
}

/// Rows added to the table, as indices into the updated row list (ascending).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDiff {
    /// Indices of inserted rows.
    pub inserted: Vec<usize>,
}

impl RowDiff {
    /// Whether the diff changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }
}

/// Formats records into table rows.
#[derive(Debug, Clone, Copy)]
pub struct RowFormatter {
    offset: FixedOffset,
}

impl Default for RowFormatter {
    fn default() -> Self {
        Self::local()
    }
}

impl RowFormatter {
    /// Render times in the machine's current local offset.
    #[must_use]
    pub fn local() -> Self {
        Self {
            offset: *Local::now().offset(),
        }
    }

    /// Render times in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Render times at a fixed offset.
    #[must_use]
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Format one timestamp.
    #[must_use]
    pub fn format_timestamp(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Format one record.
    #[must_use]
    pub fn row(&self, record: &LocationRecord) -> LocationRow {
        LocationRow {
            coordinate: format!("{}, {}", record.longitude, record.latitude),
            timestamps: format!(
                "{} @ {}",
                self.format_timestamp(record.location_timestamp),
                self.format_timestamp(record.inserted_timestamp)
            ),
        }
    }

    /// Format records in order.
    #[must_use]
    pub fn rows(&self, records: &[LocationRecord]) -> Vec<LocationRow> {
        records.iter().map(|r| self.row(r)).collect()
    }
}

/// A surface that shows recorded locations.
pub trait TrackView {
    /// Replace the whole table.
    fn reload_table(&mut self, rows: &[LocationRow]);

    /// Insert the rows named by `diff`; `rows` is the full updated table.
    fn insert_rows(&mut self, diff: &RowDiff, rows: &[LocationRow]);

    /// Clear the map and draw `scene`.
    fn render_map(&mut self, scene: &MapScene);

    /// Show a blocking message to the user.
    fn show_alert(&mut self, message: &str);
}
