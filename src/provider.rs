//! In-memory host for the reporter and the viewer.
//!
//! Storage tables sit behind a single async lock, so a vehicle claim checks
//! and writes in one critical section. Device behaviour (position fixes,
//! identifier captures, wake-lock support) is scripted by the caller.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CachedSession, Capture, Claim, Clock, DutyStore, FleetRow, FleetStore, Fix, Geolocation,
    IdentifierCapture, OperatorRecord, PositionError, PositionRequest, PositionSample,
    PositionStore, Route, SessionCache, Stop, Vehicle, WakeLock,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    operators: HashMap<String, OperatorRecord>,
    vehicles: HashMap<String, Vehicle>,
    routes: HashMap<String, Route>,
    stops: HashMap<String, Stop>,
    positions: Vec<PositionSample>,
    offline: bool,
}

impl Tables {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            bail!("storage is offline");
        }
        Ok(())
    }
}

/// A scripted position reading. The fix is stamped relative to the clock at
/// the moment it is requested.
#[derive(Debug, Clone, Copy)]
struct Reading {
    latitude: f64,
    longitude: f64,
    heading: Option<f64>,
    age: Duration,
}

#[derive(Debug)]
struct Device {
    readings: VecDeque<Result<Reading, PositionError>>,
    captures: VecDeque<Capture>,
    wake_lock_supported: bool,
    wake_lock_held: bool,
    // serialized, as a browser's local storage would hold it
    session: Option<String>,
    pinned_now: Option<DateTime<Utc>>,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            readings: VecDeque::new(),
            captures: VecDeque::new(),
            wake_lock_supported: true,
            wake_lock_held: false,
            session: None,
            pinned_now: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryProvider {
    tables: AsyncMutex<Tables>,
    device: Mutex<Device>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_operator(mut self, operator_id: &str, operator_name: &str, password: &str) -> Self {
        let record = OperatorRecord {
            operator_id: operator_id.to_string(),
            operator_name: operator_name.to_string(),
            password: password.to_string(),
            assigned_vehicle: None,
        };
        self.tables.get_mut().operators.insert(record.operator_id.clone(), record);
        self
    }

    #[must_use]
    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.tables.get_mut().vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.tables.get_mut().routes.insert(route.route_id.clone(), route);
        self
    }

    #[must_use]
    pub fn with_stop(mut self, stop: Stop) -> Self {
        self.tables.get_mut().stops.insert(stop.stop_id.clone(), stop);
        self
    }

    /// Queue a fresh fix for the next position request.
    pub fn push_fix(&self, latitude: f64, longitude: f64, heading: Option<f64>) {
        self.push_aged_fix(latitude, longitude, heading, Duration::ZERO);
    }

    /// Queue a fix that is already `age` old when requested.
    pub fn push_aged_fix(&self, latitude: f64, longitude: f64, heading: Option<f64>, age: Duration) {
        let reading = Reading { latitude, longitude, heading, age };
        if let Ok(mut device) = self.device() {
            device.readings.push_back(Ok(reading));
        }
    }

    pub fn push_position_error(&self, err: PositionError) {
        if let Ok(mut device) = self.device() {
            device.readings.push_back(Err(err));
        }
    }

    /// Queue the result of the next identifier capture. With nothing queued
    /// the operator cancels.
    pub fn push_capture(&self, capture: Capture) {
        if let Ok(mut device) = self.device() {
            device.captures.push_back(capture);
        }
    }

    pub fn set_wake_lock_supported(&self, supported: bool) {
        if let Ok(mut device) = self.device() {
            device.wake_lock_supported = supported;
        }
    }

    #[must_use]
    pub fn wake_lock_held(&self) -> bool {
        self.device().is_ok_and(|device| device.wake_lock_held)
    }

    /// Fix the clock at `now`. Unpinned, the clock follows the system time.
    pub fn pin_clock(&self, now: DateTime<Utc>) {
        if let Ok(mut device) = self.device() {
            device.pinned_now = Some(now);
        }
    }

    /// Make every storage call fail until brought back online.
    pub async fn set_offline(&self, offline: bool) {
        self.tables.lock().await.offline = offline;
    }

    pub async fn operator(&self, operator_id: &str) -> Option<OperatorRecord> {
        self.tables.lock().await.operators.get(operator_id).cloned()
    }

    /// Every sample written for `vehicle_id`, oldest first.
    pub async fn positions(&self, vehicle_id: &str) -> Vec<PositionSample> {
        let tables = self.tables.lock().await;
        tables.positions.iter().filter(|s| s.vehicle_id == vehicle_id).cloned().collect()
    }

    /// Move a vehicle onto another route, or off every route.
    pub async fn set_vehicle_route(&self, vehicle_id: &str, route_id: Option<&str>) {
        if let Some(vehicle) = self.tables.lock().await.vehicles.get_mut(vehicle_id) {
            vehicle.route_id = route_id.map(ToString::to_string);
        }
    }

    /// Drop every sample written for `vehicle_id`.
    pub async fn clear_positions(&self, vehicle_id: &str) {
        self.tables.lock().await.positions.retain(|s| s.vehicle_id != vehicle_id);
    }

    /// Write a sample directly, as another operator's device would.
    pub async fn insert_position(&self, sample: PositionSample) {
        self.tables.lock().await.positions.push(sample);
    }

    fn device(&self) -> Result<MutexGuard<'_, Device>> {
        self.device.lock().map_err(|_poisoned| anyhow!("device state poisoned"))
    }
}

impl DutyStore for MemoryProvider {
    async fn find_operator(&self, operator_id: &str) -> Result<Option<OperatorRecord>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;
        Ok(tables.operators.get(operator_id).cloned())
    }

    async fn claim_vehicle(&self, operator_id: &str, vehicle_id: &str) -> Result<Claim> {
        let mut tables = self.tables.lock().await;
        tables.check_online()?;

        let Some(vehicle) = tables.vehicles.get(vehicle_id).cloned() else {
            return Ok(Claim::NotFound);
        };
        if !vehicle.active {
            return Ok(Claim::Inactive);
        }
        if let Some(holder) = tables.operators.values().find(|op| {
            op.operator_id != operator_id && op.assigned_vehicle.as_deref() == Some(vehicle_id)
        }) {
            return Ok(Claim::AlreadyClaimed { operator_name: holder.operator_name.clone() });
        }

        let operator = tables
            .operators
            .get_mut(operator_id)
            .with_context(|| format!("operator {operator_id} not found"))?;
        operator.assigned_vehicle = Some(vehicle_id.to_string());

        debug!(operator_id = %operator_id, vehicle_id = %vehicle_id, "vehicle claimed");
        Ok(Claim::Claimed(vehicle))
    }

    async fn set_operator_duty(&self, operator_id: &str, vehicle_id: Option<&str>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check_online()?;

        let operator = tables
            .operators
            .get_mut(operator_id)
            .with_context(|| format!("operator {operator_id} not found"))?;
        operator.assigned_vehicle = vehicle_id.map(ToString::to_string);
        Ok(())
    }
}

impl FleetStore for MemoryProvider {
    async fn fetch_on_duty_fleet(&self) -> Result<Vec<FleetRow>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;

        let mut rows = tables
            .operators
            .values()
            .filter_map(|op| {
                let vehicle_id = op.assigned_vehicle.clone()?;
                let vehicle = tables.vehicles.get(&vehicle_id).cloned();
                let route = vehicle
                    .as_ref()
                    .and_then(|v| v.route_id.as_ref())
                    .and_then(|id| tables.routes.get(id))
                    .map(Route::summary);
                Some(FleetRow { vehicle_id, operator_name: op.operator_name.clone(), vehicle, route })
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        Ok(rows)
    }

    async fn fetch_vehicle(&self, vehicle_id: &str) -> Result<Option<Vehicle>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;
        Ok(tables.vehicles.get(vehicle_id).cloned())
    }

    async fn fetch_route(&self, route_id: &str) -> Result<Option<Route>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;
        Ok(tables.routes.get(route_id).cloned())
    }

    async fn fetch_active_stops(&self, stop_ids: &[String]) -> Result<Vec<Stop>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;
        Ok(tables
            .stops
            .values()
            .filter(|stop| stop.active && stop_ids.contains(&stop.stop_id))
            .cloned()
            .collect())
    }
}

impl PositionStore for MemoryProvider {
    async fn fetch_latest_position(&self, vehicle_id: &str) -> Result<Option<PositionSample>> {
        let tables = self.tables.lock().await;
        tables.check_online()?;
        Ok(tables
            .positions
            .iter()
            .filter(|s| s.vehicle_id == vehicle_id)
            .max_by_key(|s| s.captured_at)
            .cloned())
    }

    async fn append_position(&self, sample: &PositionSample) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check_online()?;

        if let Some(vehicle) = tables.vehicles.get_mut(&sample.vehicle_id) {
            vehicle.last_updated = Some(sample.captured_at);
        }
        tables.positions.push(sample.clone());
        Ok(())
    }

    async fn correct_heading(
        &self, vehicle_id: &str, captured_at: DateTime<Utc>, heading: f64,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check_online()?;

        let sample = tables
            .positions
            .iter_mut()
            .find(|s| s.vehicle_id == vehicle_id && s.captured_at == captured_at)
            .with_context(|| format!("no sample for {vehicle_id} at {captured_at}"))?;
        sample.heading = Some(heading);
        Ok(())
    }
}

impl SessionCache for MemoryProvider {
    fn load_session(&self) -> Result<Option<CachedSession>> {
        let device = self.device()?;
        device
            .session
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("decoding cached session")
    }

    fn store_session(&self, cached: &CachedSession) -> Result<()> {
        let encoded = serde_json::to_string(cached).context("encoding session")?;
        self.device()?.session = Some(encoded);
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        self.device()?.session = None;
        Ok(())
    }
}

impl Clock for MemoryProvider {
    fn now(&self) -> DateTime<Utc> {
        self.device().ok().and_then(|device| device.pinned_now).unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl Geolocation for MemoryProvider {
    async fn current_position(&self, request: PositionRequest) -> Result<Fix, PositionError> {
        let now = self.now();
        let mut device = self.device().map_err(|_poisoned| PositionError::Unavailable)?;
        let reading = device.readings.pop_front().unwrap_or(Err(PositionError::Unavailable))?;

        let age = chrono::Duration::from_std(reading.age).unwrap_or_default();
        debug!(high_accuracy = request.high_accuracy, age = ?reading.age, "position requested");
        Ok(Fix {
            latitude: reading.latitude,
            longitude: reading.longitude,
            heading: reading.heading,
            accuracy: Some(5.0),
            captured_at: now - age,
        })
    }
}

#[async_trait]
impl WakeLock for MemoryProvider {
    async fn acquire_wake_lock(&self) -> Result<()> {
        let mut device = self.device()?;
        if !device.wake_lock_supported {
            bail!("wake-lock is not supported on this device");
        }
        device.wake_lock_held = true;
        Ok(())
    }

    async fn release_wake_lock(&self) -> Result<()> {
        self.device()?.wake_lock_held = false;
        Ok(())
    }
}

#[async_trait]
impl IdentifierCapture for MemoryProvider {
    async fn capture_identifier(&self) -> Result<Capture> {
        Ok(self.device()?.captures.pop_front().unwrap_or(Capture::Cancelled))
    }
}
