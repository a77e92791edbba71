use std::env;
use std::time::Duration;

use common::PositionRequest;

/// Time between fleet refreshes.
pub const FLEET_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Time between position refreshes for the selected vehicle.
pub const POSITION_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const POSITION_TIMEOUT: Duration = Duration::from_secs(15);
/// A vehicle this close to its next stop has reached it.
pub const STOP_ADVANCE_METERS: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub fleet_poll_interval: Duration,
    pub position_poll_interval: Duration,
    pub position_timeout: Duration,
    pub stop_advance_meters: f64,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            fleet_poll_interval: env_secs("FLEET_POLL_INTERVAL_SECS", FLEET_POLL_INTERVAL),
            position_poll_interval: env_secs("POSITION_POLL_INTERVAL_SECS", POSITION_POLL_INTERVAL),
            position_timeout: env_secs("POSITION_TIMEOUT_SECS", POSITION_TIMEOUT),
            stop_advance_meters: env_f64("STOP_ADVANCE_METERS", STOP_ADVANCE_METERS),
        }
    }

    /// The viewer's own position is always requested fresh.
    #[must_use]
    pub const fn user_position_request(&self) -> PositionRequest {
        PositionRequest::high_accuracy(self.position_timeout, Duration::ZERO)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fleet_poll_interval: FLEET_POLL_INTERVAL,
            position_poll_interval: POSITION_POLL_INTERVAL,
            position_timeout: POSITION_TIMEOUT,
            stop_advance_meters: STOP_ADVANCE_METERS,
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(default, Duration::from_secs)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.fleet_poll_interval, Duration::from_secs(30));
        assert_eq!(config.position_poll_interval, Duration::from_secs(10));
        assert!((config.stop_advance_meters - 50.0).abs() < f64::EPSILON);

        let request = config.user_position_request();
        assert!(request.high_accuracy);
        assert_eq!(request.maximum_age, Duration::ZERO);
    }

    #[test]
    fn env_fallback() {
        assert_eq!(env_secs("VIEWER_TEST_UNSET_KEY", FLEET_POLL_INTERVAL), FLEET_POLL_INTERVAL);
        assert!((env_f64("VIEWER_TEST_UNSET_KEY", 12.5) - 12.5).abs() < f64::EPSILON);
    }
}
