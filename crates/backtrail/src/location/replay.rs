//! Fixes replayed from a JSON Lines file.
//!
//! Each non-blank line is either a single fix object or an array of fix
//! objects delivered together as one batch:
//!
//! ```text
//! {"latitude": 37.33, "longitude": -122.03, "timestamp": "2024-01-07T12:00:00Z"}
//! [{"latitude": 37.34, ...}, {"latitude": 37.35, ...}]
//! ```
//!
//! Permission prompts are answered from configuration, standing in for a user.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthorizationStatus, LocationEvent, LocationProvider, SignificantChangeFilter};
use crate::config::PermissionAnswer;
use crate::error::{Error, Result};
use crate::record::LocationFix;

const NAME: &str = "replay";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Batch(Vec<LocationFix>),
    Single(LocationFix),
}

/// One line of a replay file: a batch, or the reason it could not be read.
pub type ReplayBatch = std::result::Result<Vec<LocationFix>, String>;

/// Parse replay file contents into batches, skipping blank lines.
///
/// A line holding any fix a store cannot hold is reported as unreadable.
#[must_use]
pub fn parse_replay(contents: &str) -> Vec<ReplayBatch> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let fixes = match serde_json::from_str::<ReplayLine>(line) {
                Ok(ReplayLine::Batch(fixes)) => fixes,
                Ok(ReplayLine::Single(fix)) => vec![fix],
                Err(e) => return Err(format!("line {}: {e}", idx + 1)),
            };
            match fixes.iter().find(|f| !f.has_storable_timestamp()) {
                Some(fix) => Err(format!(
                    "line {}: timestamp {} is outside the storable years",
                    idx + 1,
                    fix.timestamp
                )),
                None => Ok(fixes),
            }
        })
        .collect()
}

/// Location provider that replays a recorded file.
#[derive(Debug)]
pub struct ReplayProvider {
    path: PathBuf,
    interval: Duration,
    answer: PermissionAnswer,
    available: bool,
    min_distance_m: f64,
    status: AuthorizationStatus,
    always_prompted: bool,
    events: Option<mpsc::Sender<LocationEvent>>,
    task: Option<JoinHandle<()>>,
}

impl ReplayProvider {
    /// Create a provider replaying `path`, pausing `interval` between batches.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration, min_distance_m: f64) -> Self {
        Self {
            path: path.into(),
            interval,
            answer: PermissionAnswer::default(),
            available: true,
            min_distance_m,
            status: AuthorizationStatus::NotDetermined,
            always_prompted: false,
            events: None,
            task: None,
        }
    }

    /// Set how the simulated user answers permission prompts.
    #[must_use]
    pub fn with_permission_answer(mut self, answer: PermissionAnswer) -> Self {
        self.answer = answer;
        self
    }

    /// Set whether significant-change monitoring is reported as available.
    #[must_use]
    pub fn with_significant_change_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// The file being replayed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn change_status(&mut self, status: AuthorizationStatus) {
        if status == self.status {
            return;
        }
        self.status = status;
        self.notify(LocationEvent::AuthorizationChanged(status));
    }

    fn notify(&self, event: LocationEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                warn!("dropping replay event: {}", e);
            }
        }
    }
}

#[async_trait::async_trait]
impl LocationProvider for ReplayProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, events: mpsc::Sender<LocationEvent>) {
        self.events = Some(events);
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.status
    }

    fn request_when_in_use_authorization(&mut self) {
        if self.status != AuthorizationStatus::NotDetermined {
            return;
        }
        let status = match self.answer {
            PermissionAnswer::Deny => AuthorizationStatus::Denied,
            PermissionAnswer::Always | PermissionAnswer::WhenInUse => {
                AuthorizationStatus::AuthorizedWhenInUse
            }
        };
        debug!("simulated when-in-use prompt answered: {}", status);
        self.change_status(status);
    }

    fn request_always_authorization(&mut self) {
        // The upgrade prompt is only ever shown once.
        if self.always_prompted || self.status.is_refused() {
            return;
        }
        self.always_prompted = true;
        let status = match (self.answer, self.status) {
            (PermissionAnswer::Always, _) => AuthorizationStatus::AuthorizedAlways,
            (PermissionAnswer::Deny, AuthorizationStatus::NotDetermined) => {
                AuthorizationStatus::Denied
            }
            (_, current) => current,
        };
        debug!("simulated always prompt answered: {}", status);
        self.change_status(status);
    }

    fn significant_change_available(&self) -> bool {
        self.available
    }

    async fn start_monitoring_significant_changes(&mut self) -> Result<()> {
        let events = self
            .events
            .clone()
            .ok_or_else(|| Error::provider_start(NAME, "no event channel bound"))?;

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::provider_start(NAME, format!("read {}: {e}", self.path.display()))
        })?;
        let batches = parse_replay(&contents);
        info!(
            "Replaying {} batches from {}",
            batches.len(),
            self.path.display()
        );

        let refusal = if !self.available {
            Some("significant-change monitoring is not available".to_string())
        } else if self.status.is_refused() {
            Some(format!("location access {}", self.status))
        } else {
            None
        };

        let filter = SignificantChangeFilter::new(self.min_distance_m);
        self.task = Some(tokio::spawn(replay(
            batches,
            self.interval,
            filter,
            refusal,
            events,
        )));
        Ok(())
    }

    fn stop_monitoring(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("replay stopped");
        }
        Ok(())
    }

    fn is_monitoring(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

async fn replay(
    batches: Vec<ReplayBatch>,
    interval: Duration,
    mut filter: SignificantChangeFilter,
    refusal: Option<String>,
    events: mpsc::Sender<LocationEvent>,
) {
    if let Some(reason) = refusal {
        let _ = events.send(LocationEvent::Failed(reason)).await;
        let _ = events.send(LocationEvent::MonitoringStopped).await;
        return;
    }

    for (idx, batch) in batches.into_iter().enumerate() {
        if idx > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        let event = match batch {
            Ok(fixes) => {
                let fixes = filter.filter_batch(fixes);
                if fixes.is_empty() {
                    continue;
                }
                LocationEvent::Locations(fixes)
            }
            Err(reason) => LocationEvent::Failed(reason),
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events.send(LocationEvent::MonitoringStopped).await;
}
