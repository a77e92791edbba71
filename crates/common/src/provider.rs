//! # Provider
//!
//! Provider defines external data interfaces for the crate: storage, the
//! device, and the clock. Storage traits follow the `realtime` provider
//! style; device traits are object-safe via `async_trait`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::fleet::{FleetRow, Vehicle};
use crate::position::{Fix, PositionError, PositionRequest, PositionSample};
use crate::route::{Route, Stop};
use crate::session::{CachedSession, OperatorRecord};

/// Outcome of an atomic claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The operator is now on duty with the vehicle.
    Claimed(Vehicle),
    NotFound,
    Inactive,
    /// Another operator already holds the vehicle.
    AlreadyClaimed { operator_name: String },
}

/// The `DutyStore` trait defines operator lookup and duty assignment.
pub trait DutyStore: Send + Sync {
    fn find_operator(
        &self, operator_id: &str,
    ) -> impl Future<Output = Result<Option<OperatorRecord>>> + Send;

    /// Check and claim in one step: the vehicle must exist, be active, and
    /// not be held by any other on-duty operator. On success the operator is
    /// marked on duty with the vehicle. Nothing is written otherwise.
    fn claim_vehicle(
        &self, operator_id: &str, vehicle_id: &str,
    ) -> impl Future<Output = Result<Claim>> + Send;

    /// Set or clear the operator's duty assignment. `None` means off duty.
    fn set_operator_duty(
        &self, operator_id: &str, vehicle_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The `FleetStore` trait defines read access to vehicles, routes and stops.
pub trait FleetStore: Send + Sync {
    /// Every operator currently on duty, joined with vehicle and route data.
    fn fetch_on_duty_fleet(&self) -> impl Future<Output = Result<Vec<FleetRow>>> + Send;

    fn fetch_vehicle(
        &self, vehicle_id: &str,
    ) -> impl Future<Output = Result<Option<Vehicle>>> + Send;

    fn fetch_route(&self, route_id: &str) -> impl Future<Output = Result<Option<Route>>> + Send;

    /// Active stops among `stop_ids`, in no particular order.
    fn fetch_active_stops(
        &self, stop_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Stop>>> + Send;
}

/// The `PositionStore` trait defines the position sample log.
pub trait PositionStore: Send + Sync {
    fn fetch_latest_position(
        &self, vehicle_id: &str,
    ) -> impl Future<Output = Result<Option<PositionSample>>> + Send;

    fn append_position(&self, sample: &PositionSample) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite the heading of the sample matching vehicle and timestamp.
    fn correct_heading(
        &self, vehicle_id: &str, captured_at: DateTime<Utc>, heading: f64,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Device-local storage that survives a reload.
pub trait SessionCache: Send + Sync {
    fn load_session(&self) -> Result<Option<CachedSession>>;

    fn store_session(&self, cached: &CachedSession) -> Result<()>;

    fn clear_session(&self) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Single-shot device positioning.
#[async_trait]
pub trait Geolocation: Send + Sync {
    async fn current_position(
        &self, request: PositionRequest,
    ) -> std::result::Result<Fix, PositionError>;
}

/// Platform screen wake-lock. Availability varies by device.
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn acquire_wake_lock(&self) -> Result<()>;

    async fn release_wake_lock(&self) -> Result<()>;
}

/// Result of asking the operator for a vehicle identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Raw text from a QR decode or manual entry.
    Captured(String),
    Cancelled,
}

/// Camera QR decode or manual text entry.
#[async_trait]
pub trait IdentifierCapture: Send + Sync {
    async fn capture_identifier(&self) -> Result<Capture>;
}
