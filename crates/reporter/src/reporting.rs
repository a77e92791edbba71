//! # Location reporting
//!
//! While on duty the reporter samples the device position on a fixed
//! interval and appends each sample to storage. Failures skip the tick; only
//! a permission denial ends the loop.

use std::sync::Arc;

use common::{Clock, Fix, Geolocation, PositionError, PositionRequest, PositionSample, PositionStore};
use realtime::{Flow, LoopHandle, Schedule, Ticket};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Latest outcome of the reporting loop, for display on the operator's
/// dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatus {
    pub last_sample: Option<PositionSample>,
    pub last_error: Option<PositionError>,
}

/// A running reporting loop for one vehicle.
#[derive(Debug)]
pub struct Reporting {
    vehicle_id: String,
    handle: LoopHandle,
    status: watch::Receiver<ReportStatus>,
}

impl Reporting {
    /// Start reporting for `vehicle_id`. The first report is taken
    /// immediately.
    pub fn start<P>(provider: Arc<P>, vehicle_id: String, config: &Config) -> Self
    where
        P: Geolocation + Clock + PositionStore + 'static,
    {
        let (status_tx, status) = watch::channel(ReportStatus::default());
        let status_tx = Arc::new(status_tx);
        let request = config.position_request();

        info!(vehicle_id = %vehicle_id, "starting location reporting");
        let id = vehicle_id.clone();
        let handle = Schedule::every("location-report", config.report_interval).spawn(move |ticket| {
            let provider = Arc::clone(&provider);
            let status_tx = Arc::clone(&status_tx);
            let vehicle_id = id.clone();
            async move { report(&*provider, &vehicle_id, request, &ticket, &status_tx).await }
        });

        Self { vehicle_id, handle, status }
    }

    pub fn stop(&self) {
        info!(vehicle_id = %self.vehicle_id, "stopping location reporting");
        self.handle.stop();
    }

    /// Whether the loop is no longer ticking (stopped, or halted by a
    /// permission error).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    #[must_use]
    pub fn status(&self) -> ReportStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReportStatus> {
        self.status.clone()
    }
}

async fn report<P>(
    provider: &P, vehicle_id: &str, request: PositionRequest, ticket: &Ticket,
    status: &watch::Sender<ReportStatus>,
) -> Flow
where
    P: Geolocation + Clock + PositionStore,
{
    let fix = match acquire_fix(provider, request).await {
        Ok(fix) => fix,
        Err(err) if err.is_persistent() => {
            error!(vehicle_id = %vehicle_id, error = %err, "position access lost; reporting halted");
            if ticket.is_current() {
                status.send_modify(|s| s.last_error = Some(err));
            }
            return Flow::Halt;
        }
        Err(err) => {
            warn!(
                monotonic_counter.report_ticks_skipped = 1,
                vehicle_id = %vehicle_id,
                error = %err,
                "no position this tick"
            );
            if ticket.is_current() {
                status.send_modify(|s| s.last_error = Some(err));
            }
            return Flow::Continue;
        }
    };

    let sample = PositionSample::from_fix(vehicle_id, &fix, provider.now());

    if !ticket.is_current() {
        debug!(vehicle_id = %vehicle_id, "reporting stopped; discarding sample");
        return Flow::Continue;
    }

    match provider.append_position(&sample).await {
        Ok(()) => {
            info!(
                monotonic_counter.samples_written = 1,
                vehicle_id = %vehicle_id,
                latitude = sample.latitude,
                longitude = sample.longitude,
                "position reported"
            );
        }
        Err(err) => {
            warn!(
                monotonic_counter.sample_write_failures = 1,
                vehicle_id = %vehicle_id,
                error = %err,
                "failed to write position sample"
            );
        }
    }

    if ticket.is_current() {
        status.send_modify(|s| {
            s.last_sample = Some(sample);
            s.last_error = None;
        });
    }
    Flow::Continue
}

/// Request one position fix. A fix older than the request's maximum age is
/// rejected and a fresh one requested once.
///
/// # Errors
///
/// Returns the device error, or `Unavailable` when only stale fixes are
/// produced.
pub async fn acquire_fix<P>(provider: &P, request: PositionRequest) -> Result<Fix, PositionError>
where
    P: Geolocation + Clock,
{
    let fix = provider.current_position(request).await?;
    if fix.age(provider.now()) <= request.maximum_age {
        return Ok(fix);
    }

    debug!(age = ?fix.age(provider.now()), "stale fix; requesting a fresh one");
    let fix = provider.current_position(request.fresh()).await?;
    if fix.age(provider.now()) <= request.maximum_age {
        Ok(fix)
    } else {
        Err(PositionError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    struct Device {
        now: DateTime<Utc>,
        // how long the device takes to answer a position request
        latency: Duration,
        fixes: Mutex<VecDeque<Result<Fix, PositionError>>>,
        requests: Mutex<Vec<PositionRequest>>,
        samples: Mutex<Vec<PositionSample>>,
    }

    impl Device {
        fn new() -> Self {
            Self {
                now: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
                latency: Duration::ZERO,
                fixes: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                samples: Mutex::new(Vec::new()),
            }
        }

        fn push_fix(&self, age_secs: i64) {
            let fix = Fix {
                latitude: -36.84448,
                longitude: 174.76915,
                heading: Some(90.0),
                accuracy: Some(4.0),
                captured_at: self.now - chrono::Duration::seconds(age_secs),
            };
            self.fixes.lock().unwrap().push_back(Ok(fix));
        }

        fn push_error(&self, err: PositionError) {
            self.fixes.lock().unwrap().push_back(Err(err));
        }

        fn written(&self) -> usize {
            self.samples.lock().unwrap().len()
        }
    }

    impl Clock for Device {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }
    }

    #[async_trait]
    impl Geolocation for Device {
        async fn current_position(&self, request: PositionRequest) -> Result<Fix, PositionError> {
            self.requests.lock().unwrap().push(request);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.fixes.lock().unwrap().pop_front().unwrap_or(Err(PositionError::Unavailable))
        }
    }

    impl PositionStore for Device {
        async fn fetch_latest_position(
            &self, vehicle_id: &str,
        ) -> anyhow::Result<Option<PositionSample>> {
            let samples = self.samples.lock().unwrap();
            Ok(samples.iter().rev().find(|s| s.vehicle_id == vehicle_id).cloned())
        }

        async fn append_position(&self, sample: &PositionSample) -> anyhow::Result<()> {
            self.samples.lock().unwrap().push(sample.clone());
            Ok(())
        }

        async fn correct_heading(
            &self, _: &str, _: DateTime<Utc>, _: f64,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn request() -> PositionRequest {
        Config::default().position_request()
    }

    #[tokio::test]
    async fn fresh_fix_accepted() {
        let device = Device::new();
        device.push_fix(5);

        let fix = acquire_fix(&device, request()).await.unwrap();
        assert_eq!(fix.heading, Some(90.0));
        assert_eq!(device.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_fix_is_retried_fresh() {
        let device = Device::new();
        device.push_fix(45);
        device.push_fix(1);

        let fix = acquire_fix(&device, request()).await.unwrap();
        assert_eq!(fix.age(device.now), Duration::from_secs(1));

        let requests = device.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].maximum_age, Duration::from_secs(30));
        assert_eq!(requests[1].maximum_age, Duration::ZERO);
    }

    #[tokio::test]
    async fn only_stale_fixes() {
        let device = Device::new();
        device.push_fix(31);
        device.push_fix(60);

        assert_eq!(acquire_fix(&device, request()).await, Err(PositionError::Unavailable));
    }

    #[tokio::test]
    async fn device_error_passes_through() {
        let device = Device::new();
        device.push_error(PositionError::PermissionDenied);
        assert_eq!(acquire_fix(&device, request()).await, Err(PositionError::PermissionDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_immediately_then_on_interval() {
        let device = Arc::new(Device::new());
        device.push_fix(1);
        device.push_fix(2);

        let reporting = Reporting::start(Arc::clone(&device), "B-12".to_string(), &Config::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(device.written(), 1);

        let status = reporting.status();
        let sample = status.last_sample.unwrap();
        assert_eq!(sample.vehicle_id, "B-12");
        assert_eq!(sample.captured_at, device.now);
        assert_eq!(status.last_error, None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(device.written(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_skips_tick() {
        let device = Arc::new(Device::new());
        device.push_error(PositionError::Timeout);
        device.push_fix(1);

        let reporting = Reporting::start(Arc::clone(&device), "B-12".to_string(), &Config::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(device.written(), 0);
        assert_eq!(reporting.status().last_error, Some(PositionError::Timeout));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(device.written(), 1);
        assert_eq!(reporting.status().last_error, None);
        assert!(!reporting.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denial_halts() {
        let device = Arc::new(Device::new());
        device.push_error(PositionError::PermissionDenied);
        device.push_fix(1);

        let reporting = Reporting::start(Arc::clone(&device), "B-12".to_string(), &Config::default());
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert!(reporting.is_finished());
        assert_eq!(device.written(), 0);
        assert_eq!(reporting.status().last_error, Some(PositionError::PermissionDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_writes() {
        let device = Arc::new(Device::new());
        for _ in 0..5 {
            device.push_fix(1);
        }

        let reporting = Reporting::start(Arc::clone(&device), "B-12".to_string(), &Config::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        reporting.stop();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(device.written(), 1);
        assert!(reporting.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn denial_after_stop_is_not_recorded() {
        let device = Arc::new(Device { latency: Duration::from_secs(5), ..Device::new() });
        device.push_error(PositionError::PermissionDenied);

        let reporting = Reporting::start(Arc::clone(&device), "B-12".to_string(), &Config::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        reporting.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(device.requests.lock().unwrap().len(), 1);
        assert_eq!(reporting.status().last_error, None);
    }
}
