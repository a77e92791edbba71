//! # Duty
//!
//! The operator's duty state machine. Position reporting only runs while the
//! machine is `On`, and the machine is the sole owner of the operator's
//! session, the reporting loop and the wake-lock.
//!
//! ```text
//! Off --start_shift--> Scanning --claimed--> On --end_shift--> Off
//!                          |
//!                          +--cancelled / rejected--> Off
//! ```

use std::sync::Arc;

use anyhow::Context;
use common::{CachedSession, Capture, Claim, OperatorSession};
use realtime::{Error, Result, conflict, not_found};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::Provider;
use crate::assignment::{Assignment, assignment};
use crate::auth::Login;
use crate::config::Config;
use crate::reporting::{ReportStatus, Reporting};
use crate::scan::parse_scan_payload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DutyState {
    Off,
    /// Waiting on the operator to scan or enter a vehicle identifier.
    Scanning,
    #[serde(rename_all = "camelCase")]
    On { vehicle_id: String },
}

/// Duty state for one logged-in operator.
pub struct DutyMachine<P: Provider> {
    provider: Arc<P>,
    config: Config,
    session: OperatorSession,
    token: String,
    state: DutyState,
    reporting: Option<Reporting>,
    wake_lock_held: bool,
    assignment: Option<Assignment>,
}

impl<P: Provider> DutyMachine<P> {
    /// A machine for a freshly logged-in operator. An operator whose stored
    /// duty assignment is still set picks the shift back up.
    pub async fn new(provider: Arc<P>, config: Config, login: Login) -> Self {
        Self::restore(provider, config, login.session, login.token).await
    }

    /// Rebuild the machine from the device's session cache after a reload. A
    /// cached session that is on duty goes straight back to `On` without
    /// re-claiming the vehicle.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when nothing is cached and `Unavailable` when
    /// the cache cannot be read.
    pub async fn resume(provider: Arc<P>, config: Config) -> Result<Self> {
        let Some(CachedSession { session, token }) =
            provider.load_session().context("loading cached session")?
        else {
            return Err(Error::Unauthorized("no cached session; log in first".to_string()));
        };
        Ok(Self::restore(provider, config, session, token).await)
    }

    async fn restore(
        provider: Arc<P>, config: Config, session: OperatorSession, token: String,
    ) -> Self {
        let vehicle_id = session.assigned_vehicle().map(ToString::to_string);
        let mut machine = Self {
            provider,
            config,
            session: session.released(),
            token,
            state: DutyState::Off,
            reporting: None,
            wake_lock_held: false,
            assignment: None,
        };

        if let Some(vehicle_id) = vehicle_id {
            info!(
                operator_id = %machine.session.operator_id(),
                vehicle_id = %vehicle_id,
                "resuming shift in progress"
            );
            machine.enter_on(vehicle_id).await;
        }
        machine
    }

    #[must_use]
    pub const fn state(&self) -> &DutyState {
        &self.state
    }

    #[must_use]
    pub const fn session(&self) -> &OperatorSession {
        &self.session
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The vehicle and route being driven, once looked up.
    #[must_use]
    pub const fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    #[must_use]
    pub fn is_reporting(&self) -> bool {
        self.reporting.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Latest reporting outcome. Empty while off duty.
    #[must_use]
    pub fn report_status(&self) -> ReportStatus {
        self.reporting.as_ref().map(Reporting::status).unwrap_or_default()
    }

    /// Watch the reporting outcome of the current shift.
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<ReportStatus>> {
        self.reporting.as_ref().map(Reporting::subscribe)
    }

    /// Begin a shift: capture a vehicle identifier and claim the vehicle.
    ///
    /// Returns `Off` when the operator cancels the capture. Any rejection
    /// also leaves the machine `Off` with nothing written to storage.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the operator is already on duty, the vehicle is
    /// inactive, or another operator holds it; `NotFound` for an unknown
    /// vehicle; `BadRequest` for an unreadable identifier; `Unavailable` when
    /// capture or storage fails.
    pub async fn start_shift(&mut self) -> Result<DutyState> {
        if self.state != DutyState::Off {
            return Err(conflict!("operator {} is already on duty", self.session.operator_id()));
        }

        self.state = DutyState::Scanning;
        match self.scan_and_claim().await {
            Ok(Some(vehicle_id)) => {
                self.enter_on(vehicle_id).await;
            }
            Ok(None) => {
                info!(operator_id = %self.session.operator_id(), "vehicle capture cancelled");
                self.state = DutyState::Off;
            }
            Err(err) => {
                warn!(
                    monotonic_counter.claim_rejections = 1,
                    operator_id = %self.session.operator_id(),
                    error = %err,
                    "shift not started"
                );
                self.state = DutyState::Off;
                return Err(err);
            }
        }
        Ok(self.state.clone())
    }

    async fn scan_and_claim(&self) -> Result<Option<String>> {
        let raw = match self.provider.capture_identifier().await.context("capturing identifier")? {
            Capture::Captured(raw) => raw,
            Capture::Cancelled => return Ok(None),
        };
        let vehicle_id = parse_scan_payload(&raw)?;
        let operator_id = self.session.operator_id();

        let claim = self
            .provider
            .claim_vehicle(operator_id, &vehicle_id)
            .await
            .context("claiming vehicle")?;

        match claim {
            Claim::Claimed(vehicle) => {
                info!(operator_id = %operator_id, vehicle_id = %vehicle.vehicle_id, "vehicle claimed");
                Ok(Some(vehicle_id))
            }
            Claim::NotFound => Err(not_found!("vehicle {vehicle_id} not found")),
            Claim::Inactive => Err(conflict!("vehicle {vehicle_id} is not active")),
            Claim::AlreadyClaimed { operator_name } => {
                Err(conflict!("vehicle {vehicle_id} is already being driven by {operator_name}"))
            }
        }
    }

    // Storage already records the claim (or did before a reload); everything
    // here is local and best-effort.
    async fn enter_on(&mut self, vehicle_id: String) {
        self.session = self.session.with_vehicle(&vehicle_id);
        self.state = DutyState::On { vehicle_id: vehicle_id.clone() };
        self.reporting =
            Some(Reporting::start(Arc::clone(&self.provider), vehicle_id.clone(), &self.config));
        self.cache_session();

        match self.provider.acquire_wake_lock().await {
            Ok(()) => self.wake_lock_held = true,
            Err(err) => warn!(error = %err, "wake-lock unavailable; continuing without it"),
        }

        match assignment(&*self.provider, &vehicle_id).await {
            Ok(found) => self.assignment = Some(found),
            Err(err) => {
                warn!(vehicle_id = %vehicle_id, error = %err, "assignment details unavailable");
            }
        }

        info!(
            operator_id = %self.session.operator_id(),
            vehicle_id = %vehicle_id,
            "shift started"
        );
    }

    /// End the current shift. Reporting stops before the assignment is
    /// cleared in storage.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when not on duty. Returns `Unavailable` when the
    /// assignment cannot be cleared; reporting is already stopped and the
    /// machine stays `On` so the call can be retried.
    pub async fn end_shift(&mut self) -> Result<()> {
        let DutyState::On { vehicle_id } = &self.state else {
            return Err(conflict!("operator {} is not on duty", self.session.operator_id()));
        };
        let vehicle_id = vehicle_id.clone();

        if let Some(reporting) = self.reporting.take() {
            reporting.stop();
        }
        if self.wake_lock_held {
            if let Err(err) = self.provider.release_wake_lock().await {
                warn!(error = %err, "failed to release wake-lock");
            }
            self.wake_lock_held = false;
        }

        self.provider
            .set_operator_duty(self.session.operator_id(), None)
            .await
            .context("clearing duty assignment")?;

        self.session = self.session.released();
        self.state = DutyState::Off;
        self.assignment = None;
        self.cache_session();

        info!(
            operator_id = %self.session.operator_id(),
            vehicle_id = %vehicle_id,
            "shift ended"
        );
        Ok(())
    }

    /// Restart reporting after the loop halted on a permission error. Does
    /// nothing while reporting is healthy or when off duty.
    pub fn retry_reporting(&mut self) {
        let DutyState::On { vehicle_id } = &self.state else {
            return;
        };
        if self.is_reporting() {
            return;
        }
        info!(vehicle_id = %vehicle_id, "retrying location reporting");
        self.reporting =
            Some(Reporting::start(Arc::clone(&self.provider), vehicle_id.clone(), &self.config));
    }

    /// Log the operator out, ending any shift first.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when the shift cannot be ended or the session
    /// cache cannot be cleared. The cache is left intact if the shift could
    /// not be ended, so a reload resumes it.
    pub async fn logout(mut self) -> Result<()> {
        if matches!(self.state, DutyState::On { .. }) {
            self.end_shift().await?;
        }
        self.provider.clear_session().context("clearing cached session")?;
        info!(operator_id = %self.session.operator_id(), "logged out");
        Ok(())
    }

    fn cache_session(&self) {
        let cached = CachedSession { session: self.session.clone(), token: self.token.clone() };
        if let Err(err) = self.provider.store_session(&cached) {
            warn!(error = %err, "failed to cache session");
        }
    }
}
