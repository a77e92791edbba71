use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo;

/// One reported vehicle position. A new report is always a new sample; the
/// only in-place change allowed is a corrected heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl PositionSample {
    /// Build a sample from a device fix. Headings are normalised into
    /// `[0, 360)`; non-finite readings are treated as absent.
    #[must_use]
    pub fn from_fix(vehicle_id: impl Into<String>, fix: &Fix, captured_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            heading: fix.heading.filter(|h| h.is_finite()).map(geo::normalize_heading),
            captured_at,
        }
    }

    /// Distance in meters from this sample to a coordinate.
    #[must_use]
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        geo::distance_meters(self.latitude, self.longitude, latitude, longitude)
    }

    /// Bearing from this sample towards a coordinate.
    #[must_use]
    pub fn bearing_to(&self, latitude: f64, longitude: f64) -> f64 {
        geo::bearing_degrees(self.latitude, self.longitude, latitude, longitude)
    }
}

/// A single position reading returned by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    /// Age of the fix relative to `now`. Fixes stamped in the future count as
    /// fresh.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or_default()
    }
}

/// Parameters for a single-shot position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the device may answer with.
    pub maximum_age: Duration,
}

impl PositionRequest {
    #[must_use]
    pub const fn high_accuracy(timeout: Duration, maximum_age: Duration) -> Self {
        Self { high_accuracy: true, timeout, maximum_age }
    }

    /// The same request, but refusing any cached fix.
    #[must_use]
    pub const fn fresh(self) -> Self {
        Self { maximum_age: Duration::ZERO, ..self }
    }
}

/// Why the device could not produce a position.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionError {
    #[error("Location access denied by user.")]
    PermissionDenied,

    #[error("Location information is unavailable.")]
    Unavailable,

    #[error("Location request timed out.")]
    Timeout,

    #[error("Geolocation is not supported by this device.")]
    Unsupported,
}

impl PositionError {
    /// Permission and capability errors need the user to act; retrying on a
    /// timer will not help.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::Unsupported)
    }
}

impl From<PositionError> for realtime::Error {
    fn from(err: PositionError) -> Self {
        if err.is_persistent() {
            Self::PermissionDenied(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
