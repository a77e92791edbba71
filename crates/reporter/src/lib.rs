//! # Reporter
//!
//! Runs on the operator's device: logs the operator in, gates position
//! reporting behind a duty state machine, and pushes position samples to
//! storage while on duty.

pub mod assignment;
pub mod auth;
pub mod config;
pub mod duty;
pub mod reporting;
pub mod scan;

use common::{
    Clock, DutyStore, FleetStore, Geolocation, IdentifierCapture, PositionStore, SessionCache,
    WakeLock,
};

pub use self::assignment::Assignment;
pub use self::auth::{Login, login};
pub use self::config::Config;
pub use self::duty::{DutyMachine, DutyState};
pub use self::reporting::{ReportStatus, Reporting};

/// Everything the reporter needs from its host.
pub trait Provider:
    DutyStore
    + FleetStore
    + PositionStore
    + SessionCache
    + Clock
    + Geolocation
    + WakeLock
    + IdentifierCapture
    + 'static
{
}

impl<T> Provider for T where
    T: DutyStore
        + FleetStore
        + PositionStore
        + SessionCache
        + Clock
        + Geolocation
        + WakeLock
        + IdentifierCapture
        + 'static
{
}
