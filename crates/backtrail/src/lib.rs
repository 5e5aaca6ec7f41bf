//! `backtrail` - Background location recorder
//!
//! This library records significant location changes from a location provider
//! into a local SQLite store and drives a view showing them as a table and a
//! trail on a map.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod location;
pub mod logging;
pub mod presenter;
pub mod record;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use location::{AuthorizationStatus, LocationEvent, LocationProvider, LocationService};
pub use logging::init_logging;
pub use presenter::{LocationController, TerminalView, TrackView};
pub use record::{Coordinate, LocationFix, LocationRecord};
pub use storage::{LocationStore, StorageStats};
