//! Presentation controller.
//!
//! [`LocationController`] keeps an in-memory copy of the stored records in
//! display order, turns incoming location batches into new records, and tells
//! a [`TrackView`] what to draw.

pub mod terminal;
pub mod view;

use tracing::{debug, error, warn};

use crate::error::Result;
use crate::location::LocationService;
use crate::record::{LocationFix, LocationRecord};
use crate::storage::LocationStore;

pub use terminal::TerminalView;
pub use view::{
    CameraMode, LocationRow, MapScene, RowDiff, RowFormatter, TrackView, TrailStyle,
};

/// Alert shown when the provider cannot do significant-change monitoring.
pub const SIGNIFICANT_CHANGE_UNAVAILABLE: &str = "Significant change not available";

/// Alert shown when location access was refused.
pub const LOCATION_ACCESS_REFUSED: &str = "Location access is turned off for backtrail";

/// Connects a location service, a store and a view.
#[derive(Debug)]
pub struct LocationController<'s, V> {
    store: &'s mut LocationStore,
    service: LocationService,
    view: V,
    formatter: RowFormatter,
    style: TrailStyle,
    camera: CameraMode,
    /// Cached records, newest `location_timestamp` first.
    locations: Vec<LocationRecord>,
}

impl<'s, V: TrackView> LocationController<'s, V> {
    /// Create a controller. Call [`Self::did_load`] before anything else.
    pub fn new(store: &'s mut LocationStore, service: LocationService, view: V) -> Self {
        Self {
            store,
            service,
            view,
            formatter: RowFormatter::default(),
            style: TrailStyle::default(),
            camera: CameraMode::Free,
            locations: Vec::new(),
        }
    }

    /// Use `formatter` for table rows.
    #[must_use]
    pub fn with_formatter(mut self, formatter: RowFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Use `style` for the trail polyline.
    #[must_use]
    pub fn with_trail_style(mut self, style: TrailStyle) -> Self {
        self.style = style;
        self
    }

    /// Cached records in display order.
    #[must_use]
    pub fn locations(&self) -> &[LocationRecord] {
        &self.locations
    }

    /// The view being driven.
    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Load stored records and draw them.
    pub fn did_load(&mut self) {
        debug!("did_load");
        self.fetch_locations();
        self.camera = CameraMode::Follow;
        let rows = self.formatter.rows(&self.locations);
        self.view.reload_table(&rows);
        self.update_map_view();
    }

    /// Check capability and start the location service.
    ///
    /// # Errors
    ///
    /// Returns an error if the location provider fails to start.
    pub async fn did_appear(&mut self) -> Result<()> {
        debug!("did_appear");
        if !self.service.significant_change_available() {
            self.view.show_alert(SIGNIFICANT_CHANGE_UNAVAILABLE);
        }

        self.service.start().await?;

        if self.service.authorization_status().is_refused() {
            self.view.show_alert(LOCATION_ACCESS_REFUSED);
        }
        Ok(())
    }

    /// Record a batch of fixes.
    ///
    /// Fixes whose timestamp equals the newest cached record's are skipped;
    /// nothing else is deduplicated. Fixes the store refuses are logged and
    /// skipped. Returns how many records were added.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unrecoverable`] if saving fails.
    pub fn handle_locations(&mut self, fixes: &[LocationFix]) -> Result<usize> {
        let last_timestamp = self.locations.first().map(|r| r.location_timestamp);

        let mut inserted: Vec<usize> = Vec::new();
        for fix in fixes.iter().filter(|f| Some(f.timestamp) != last_timestamp) {
            let record = match self
                .store
                .add_location(fix.latitude, fix.longitude, fix.timestamp)
            {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping fix: {}", e);
                    continue;
                }
            };
            // After any existing records with the same timestamp.
            let idx = self
                .locations
                .partition_point(|r| r.location_timestamp >= record.location_timestamp);
            self.locations.insert(idx, record);
            for earlier in &mut inserted {
                if *earlier >= idx {
                    *earlier += 1;
                }
            }
            inserted.push(idx);
        }

        if inserted.is_empty() {
            debug!("no new locations in batch of {}", fixes.len());
            return Ok(0);
        }

        self.store.save_context()?;

        inserted.sort_unstable();
        let added = inserted.len();
        let rows = self.formatter.rows(&self.locations);
        self.view.insert_rows(&RowDiff { inserted }, &rows);
        self.update_map_view();
        Ok(added)
    }

    /// Record batches until the location service stops.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unrecoverable`] if saving fails.
    pub async fn run(&mut self) -> Result<()> {
        while let Some(batch) = self.service.next_batch().await {
            self.handle_locations(&batch)?;
        }
        Ok(())
    }

    /// Stop the location service.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to stop cleanly.
    pub fn stop(&mut self) -> Result<()> {
        self.service.stop()
    }

    fn fetch_locations(&mut self) {
        match self.store.locations() {
            Ok(locations) => self.locations = locations,
            Err(e) => error!("fetch_locations: {}", e),
        }
    }

    fn update_map_view(&mut self) {
        let scene = MapScene::from_records(&self.locations, self.style.clone(), self.camera);
        self.view.render_map(&scene);
    }
}
