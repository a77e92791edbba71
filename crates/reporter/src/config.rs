use std::env;
use std::time::Duration;

use common::PositionRequest;

/// Time between position reports while on duty.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// How long a single position request may take.
pub const POSITION_TIMEOUT: Duration = Duration::from_secs(15);
/// Oldest fix accepted for a report.
pub const POSITION_MAX_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub report_interval: Duration,
    pub position_timeout: Duration,
    pub position_max_age: Duration,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            report_interval: env_secs("REPORT_INTERVAL_SECS", REPORT_INTERVAL),
            position_timeout: env_secs("POSITION_TIMEOUT_SECS", POSITION_TIMEOUT),
            position_max_age: env_secs("POSITION_MAX_AGE_SECS", POSITION_MAX_AGE),
        }
    }

    #[must_use]
    pub const fn position_request(&self) -> PositionRequest {
        PositionRequest::high_accuracy(self.position_timeout, self.position_max_age)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_interval: REPORT_INTERVAL,
            position_timeout: POSITION_TIMEOUT,
            position_max_age: POSITION_MAX_AGE,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.report_interval, Duration::from_secs(10));

        let request = config.position_request();
        assert!(request.high_accuracy);
        assert_eq!(request.timeout, Duration::from_secs(15));
        assert_eq!(request.maximum_age, Duration::from_secs(30));
    }

    #[test]
    fn env_fallback() {
        assert_eq!(env_secs("REPORTER_TEST_UNSET_KEY", REPORT_INTERVAL), REPORT_INTERVAL);
    }
}
