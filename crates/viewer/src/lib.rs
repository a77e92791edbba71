//! # Viewer
//!
//! Runs on a rider's device: polls the fleet of on-duty vehicles, tracks one
//! selected vehicle's position, and works out which stop it is heading for.

pub mod config;
pub mod fleet;
pub mod progression;
pub mod tracker;

use common::{FleetStore, Geolocation, PositionStore};

pub use self::config::Config;
pub use self::fleet::fetch_fleet;
pub use self::progression::{Progress, ProgressionCursor};
pub use self::tracker::{SelectionView, Snapshot, UserPosition, Viewer};

/// Everything the viewer needs from its host.
pub trait Provider: FleetStore + PositionStore + Geolocation + 'static {}

impl<T> Provider for T where T: FleetStore + PositionStore + Geolocation + 'static {}
