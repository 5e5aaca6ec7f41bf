//! Location monitoring.
//!
//! A [`LocationProvider`] is the platform seam: it owns the permission state
//! and produces [`LocationEvent`]s on a channel. [`LocationService`] binds the
//! channel, walks the permission steps and hands location batches to its
//! caller one at a time.

pub mod gpsd;
pub mod replay;
pub mod significant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ProviderKind};
use crate::error::{Error, Result};
use crate::record::LocationFix;

pub use gpsd::GpsdProvider;
pub use replay::ReplayProvider;
pub use significant::SignificantChangeFilter;

/// Capacity of the provider event channel.
const EVENT_BUFFER: usize = 64;

/// Location permission state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Access is blocked by policy; the user cannot change it.
    Restricted,
    /// The user refused access.
    Denied,
    /// Access granted while the app is in use.
    AuthorizedWhenInUse,
    /// Access granted at all times, including in the background.
    AuthorizedAlways,
}

impl AuthorizationStatus {
    /// Whether fixes may be delivered in this state.
    #[must_use]
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedWhenInUse | Self::AuthorizedAlways)
    }

    /// Whether the user or policy refused access.
    #[must_use]
    pub fn is_refused(self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "notDetermined"),
            Self::Restricted => write!(f, "restricted"),
            Self::Denied => write!(f, "denied"),
            Self::AuthorizedWhenInUse => write!(f, "authorizedWhenInUse"),
            Self::AuthorizedAlways => write!(f, "authorizedAlways"),
        }
    }
}

/// Something a provider reports.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// One or more fixes, oldest first.
    Locations(Vec<LocationFix>),
    /// Delivery failed. The provider keeps retrying on its own, if it can.
    Failed(String),
    /// The permission state changed.
    AuthorizationChanged(AuthorizationStatus),
    /// The provider will not deliver anything more.
    MonitoringStopped,
}

/// A platform location source.
#[async_trait::async_trait]
pub trait LocationProvider: Send {
    /// The name of this provider (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Route all future events to `events`.
    fn bind(&mut self, events: mpsc::Sender<LocationEvent>);

    /// The current permission state.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user for "when in use" access.
    ///
    /// The answer, if any, arrives as an [`LocationEvent::AuthorizationChanged`].
    fn request_when_in_use_authorization(&mut self);

    /// Ask the user to upgrade to "always" access.
    fn request_always_authorization(&mut self);

    /// Whether the device supports significant-change monitoring.
    fn significant_change_available(&self) -> bool;

    /// Begin delivering significant location changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot start.
    async fn start_monitoring_significant_changes(&mut self) -> Result<()>;

    /// Stop delivering locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to stop cleanly.
    fn stop_monitoring(&mut self) -> Result<()>;

    /// Whether monitoring is active.
    fn is_monitoring(&self) -> bool;
}

/// Drives a [`LocationProvider`] and yields location batches.
pub struct LocationService {
    provider: Box<dyn LocationProvider>,
    events: Option<mpsc::Receiver<LocationEvent>>,
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("provider", &self.provider.name())
            .field("bound", &self.events.is_some())
            .finish()
    }
}

impl LocationService {
    /// Wrap a provider. Nothing happens until [`Self::start`].
    #[must_use]
    pub fn new(provider: Box<dyn LocationProvider>) -> Self {
        Self {
            provider,
            events: None,
        }
    }

    /// Build the provider selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the replay provider is selected without a path.
    pub fn from_config(config: &Config) -> Result<Self> {
        let min_distance_m = config.location.significant_distance_m;
        let provider: Box<dyn LocationProvider> = match config.location.provider {
            ProviderKind::Gpsd => Box::new(GpsdProvider::new(config.gpsd_address(), min_distance_m)),
            ProviderKind::Replay => {
                let path = config.replay.path.clone().ok_or_else(|| Error::ConfigValidation {
                    message: "replay.path is required for the replay provider".to_string(),
                })?;
                Box::new(
                    ReplayProvider::new(path, config.replay_interval(), min_distance_m)
                        .with_permission_answer(config.replay.grant)
                        .with_significant_change_available(
                            config.replay.significant_change_available,
                        ),
                )
            }
        };
        Ok(Self::new(provider))
    }

    /// The wrapped provider's name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Whether the provider supports significant-change monitoring.
    #[must_use]
    pub fn significant_change_available(&self) -> bool {
        self.provider.significant_change_available()
    }

    /// The provider's current permission state.
    #[must_use]
    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.provider.authorization_status()
    }

    /// Bind the event channel, ask for permission and start monitoring.
    ///
    /// Safe to call repeatedly: the permission step runs each time, but the
    /// provider is only started once.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to start.
    pub async fn start(&mut self) -> Result<()> {
        if self.events.is_none() {
            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            self.provider.bind(tx);
            self.events = Some(rx);
        }

        match self.provider.authorization_status() {
            AuthorizationStatus::NotDetermined => {
                self.provider.request_when_in_use_authorization();
            }
            AuthorizationStatus::AuthorizedWhenInUse => {
                self.provider.request_always_authorization();
            }
            _ => {}
        }

        if self.provider.is_monitoring() {
            debug!("{} already monitoring", self.provider.name());
        } else {
            self.provider.start_monitoring_significant_changes().await?;
            info!("Monitoring significant changes via {}", self.provider.name());
        }
        Ok(())
    }

    /// Wait for the next batch of fixes.
    ///
    /// Delivery failures are logged and skipped. Returns `None` once the
    /// provider stops, or if the service was never started.
    pub async fn next_batch(&mut self) -> Option<Vec<LocationFix>> {
        let events = self.events.as_mut()?;
        loop {
            match events.recv().await? {
                LocationEvent::Locations(fixes) => {
                    debug!("location batch: {:?}", fixes);
                    if !fixes.is_empty() {
                        return Some(fixes);
                    }
                }
                LocationEvent::Failed(message) => {
                    error!("{} failed: {}", self.provider.name(), message);
                }
                LocationEvent::AuthorizationChanged(status) => {
                    debug!("authorization changed: {}", status);
                    // Asking for "always" right after "when in use" is granted is
                    // not something to ship; it shows the two-step request.
                    if status == AuthorizationStatus::AuthorizedWhenInUse {
                        self.provider.request_always_authorization();
                    }
                }
                LocationEvent::MonitoringStopped => {
                    info!("{} stopped delivering locations", self.provider.name());
                    return None;
                }
            }
        }
    }

    /// Stop the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to stop cleanly.
    pub fn stop(&mut self) -> Result<()> {
        if self.provider.is_monitoring() {
            self.provider.stop_monitoring()?;
        } else {
            warn!("stop requested but {} is not monitoring", self.provider.name());
        }
        Ok(())
    }
}
