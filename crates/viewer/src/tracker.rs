//! # Tracker
//!
//! Orchestrates the viewer: the rider's own position, the fleet list, and
//! the selected vehicle with its route progression. State lives behind one
//! lock so that every update is seen whole; each polling loop checks its
//! ticket under that lock before writing.

use std::sync::Arc;

use anyhow::Context;
use common::{FleetEntry, Fix, PositionError, PositionSample, RouteView, Stop};
use realtime::{Flow, LoopHandle, Result, Schedule, Ticket};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::Provider;
use crate::config::Config;
use crate::fleet::fetch_fleet;
use crate::progression::{Progress, ProgressionCursor};

/// The rider's own position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UserPosition {
    #[default]
    Unknown,
    Located { fix: Fix },
    Failed { error: PositionError },
}

/// What is known about the selected vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    pub vehicle_id: String,
    pub route_view: Option<RouteView>,
    pub next_stop: Option<Stop>,
    pub position: Option<PositionSample>,
    /// Heading to draw the vehicle with; the corrected bearing after a stop
    /// is reached, otherwise the reported heading.
    pub heading: Option<f64>,
}

/// A consistent copy of the viewer's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub user_position: UserPosition,
    pub fleet: Vec<FleetEntry>,
    pub selection: Option<SelectionView>,
}

#[derive(Debug)]
struct Selection {
    vehicle_id: String,
    // the route the cursor was built for, even when it could not be resolved
    route_id: Option<String>,
    cursor: Option<ProgressionCursor>,
    position: Option<PositionSample>,
    heading: Option<f64>,
}

impl Selection {
    fn view(&self) -> SelectionView {
        SelectionView {
            vehicle_id: self.vehicle_id.clone(),
            route_view: self.cursor.as_ref().map(|c| c.route_view().clone()),
            next_stop: self.cursor.as_ref().and_then(|c| c.next_stop().cloned()),
            position: self.position.clone(),
            heading: self.heading,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    user_position: UserPosition,
    fleet: Vec<FleetEntry>,
    selection: Option<Selection>,
}

pub struct Viewer<P: Provider> {
    provider: Arc<P>,
    config: Config,
    state: Arc<Mutex<TrackerState>>,
    fleet_loop: Option<LoopHandle>,
    position_loop: Option<LoopHandle>,
}

impl<P: Provider> Viewer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: Config) -> Self {
        Self {
            provider,
            config,
            state: Arc::new(Mutex::new(TrackerState::default())),
            fleet_loop: None,
            position_loop: None,
        }
    }

    /// Locate the rider and start polling the fleet. The first fleet fetch
    /// happens immediately.
    pub async fn start(&mut self) -> UserPosition {
        let located = self.locate_user().await;
        if self.fleet_loop.is_none() {
            self.fleet_loop = Some(self.spawn_fleet_loop());
        }
        located
    }

    /// Stop every loop. State is kept.
    pub fn stop(&mut self) {
        if let Some(handle) = self.fleet_loop.take() {
            handle.stop();
        }
        if let Some(handle) = self.position_loop.take() {
            handle.stop();
        }
    }

    /// Request the rider's own position once. A failure is kept until the
    /// next call; nothing retries on a timer.
    pub async fn locate_user(&self) -> UserPosition {
        let request = self.config.user_position_request();
        let located = match self.provider.current_position(request).await {
            Ok(fix) => {
                info!(latitude = fix.latitude, longitude = fix.longitude, "user located");
                UserPosition::Located { fix }
            }
            Err(error) => {
                warn!(error = %error, "user position unavailable");
                UserPosition::Failed { error }
            }
        };

        self.state.lock().await.user_position = located.clone();
        located
    }

    fn spawn_fleet_loop(&self) -> LoopHandle {
        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);
        let advance_meters = self.config.stop_advance_meters;

        Schedule::every("fleet-poll", self.config.fleet_poll_interval).spawn(move |ticket| {
            let provider = Arc::clone(&provider);
            let state = Arc::clone(&state);
            async move {
                refresh_fleet(&*provider, &state, advance_meters, &ticket).await;
                Flow::Continue
            }
        })
    }

    /// Track `vehicle_id`: resolve its route, reset progression to the first
    /// stop, and start polling its position. The first poll happens
    /// immediately. A route that cannot be resolved leaves the vehicle
    /// tracked by raw position only. When a later fleet refresh lists the
    /// vehicle on another route, progression restarts on that route.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when the vehicle cannot be read; the previous
    /// selection is cleared.
    pub async fn select_vehicle(&mut self, vehicle_id: &str) -> Result<()> {
        if let Some(handle) = self.position_loop.take() {
            handle.stop();
        }

        let route_id = match self.route_id_for(vehicle_id).await {
            Ok(route_id) => route_id,
            Err(err) => {
                self.state.lock().await.selection = None;
                return Err(err);
            }
        };
        let cursor = resolve_cursor(
            &*self.provider,
            vehicle_id,
            route_id.as_deref(),
            self.config.stop_advance_meters,
        )
        .await;

        info!(
            vehicle_id = %vehicle_id,
            stops = cursor.as_ref().map_or(0, |c| c.route_view().stops.len()),
            "vehicle selected"
        );

        self.state.lock().await.selection = Some(Selection {
            vehicle_id: vehicle_id.to_string(),
            route_id,
            cursor,
            position: None,
            heading: None,
        });
        self.position_loop = Some(self.spawn_position_loop(vehicle_id.to_string()));
        Ok(())
    }

    // fleet entries carry the route; fall back to storage for vehicles not
    // (yet) in the list
    async fn route_id_for(&self, vehicle_id: &str) -> Result<Option<String>> {
        let listed = {
            let state = self.state.lock().await;
            state.fleet.iter().find(|e| e.vehicle_id == vehicle_id).map(|e| e.route_id.clone())
        };
        if let Some(route_id) = listed {
            return Ok(route_id);
        }

        let vehicle =
            self.provider.fetch_vehicle(vehicle_id).await.context("fetching selected vehicle")?;
        Ok(vehicle.and_then(|v| v.route_id))
    }

    fn spawn_position_loop(&self, vehicle_id: String) -> LoopHandle {
        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);

        Schedule::every("position-poll", self.config.position_poll_interval).spawn(move |ticket| {
            let provider = Arc::clone(&provider);
            let state = Arc::clone(&state);
            let vehicle_id = vehicle_id.clone();
            async move {
                refresh_position(&*provider, &state, &vehicle_id, &ticket).await;
                Flow::Continue
            }
        })
    }

    /// Stop tracking the selected vehicle. Route, progression and position
    /// are cleared together.
    pub async fn clear_selection(&mut self) {
        if let Some(handle) = self.position_loop.take() {
            handle.stop();
        }
        if let Some(selection) = self.state.lock().await.selection.take() {
            info!(vehicle_id = %selection.vehicle_id, "selection cleared");
        }
    }

    /// The stop the selected vehicle is heading for.
    pub async fn next_stop(&self) -> Option<Stop> {
        let state = self.state.lock().await;
        state.selection.as_ref()?.cursor.as_ref()?.next_stop().cloned()
    }

    pub async fn fleet(&self) -> Vec<FleetEntry> {
        self.state.lock().await.fleet.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot {
            user_position: state.user_position.clone(),
            fleet: state.fleet.clone(),
            selection: state.selection.as_ref().map(Selection::view),
        }
    }
}

/// Build a progression cursor for `route_id`, starting at the first stop. A
/// route that is missing or cannot be read yields no cursor.
async fn resolve_cursor<P: Provider>(
    provider: &P, vehicle_id: &str, route_id: Option<&str>, advance_meters: f64,
) -> Option<ProgressionCursor> {
    let route_id = route_id?;
    match route_view(provider, route_id).await {
        Ok(Some(view)) => Some(ProgressionCursor::new(view, advance_meters)),
        Ok(None) => {
            warn!(vehicle_id = %vehicle_id, route_id = %route_id, "route not found");
            None
        }
        Err(err) => {
            warn!(
                vehicle_id = %vehicle_id,
                route_id = %route_id,
                error = %err,
                "route unavailable"
            );
            None
        }
    }
}

async fn route_view<P: Provider>(
    provider: &P, route_id: &str,
) -> anyhow::Result<Option<RouteView>> {
    let Some(route) = provider.fetch_route(route_id).await? else {
        return Ok(None);
    };
    let stops = provider.fetch_active_stops(&route.stop_sequence).await?;
    Ok(Some(RouteView::resolve(route, stops)))
}

async fn refresh_fleet<P: Provider>(
    provider: &P, state: &Mutex<TrackerState>, advance_meters: f64, ticket: &Ticket,
) {
    let fleet = match fetch_fleet(provider).await {
        Ok(fleet) => fleet,
        Err(err) => {
            warn!(error = %err, "fleet refresh failed; keeping previous list");
            return;
        }
    };

    // a selected vehicle now listed on another route
    let rerouted = {
        let mut state = state.lock().await;
        if !ticket.is_current() {
            return;
        }
        info!(monotonic_counter.fleet_refreshes = 1, vehicles = fleet.len(), "fleet refreshed");

        let rerouted = state.selection.as_ref().and_then(|selection| {
            let entry = fleet.iter().find(|e| e.vehicle_id == selection.vehicle_id)?;
            (entry.route_id != selection.route_id)
                .then(|| (selection.vehicle_id.clone(), entry.route_id.clone()))
        });
        state.fleet = fleet;
        rerouted
    };
    let Some((vehicle_id, route_id)) = rerouted else {
        return;
    };

    let cursor = resolve_cursor(provider, &vehicle_id, route_id.as_deref(), advance_meters).await;

    let mut state = state.lock().await;
    if !ticket.is_current() {
        return;
    }
    if let Some(selection) = state.selection.as_mut().filter(|s| s.vehicle_id == vehicle_id) {
        info!(vehicle_id = %vehicle_id, route_id = ?route_id, "route changed; progression reset");
        selection.route_id = route_id;
        selection.cursor = cursor;
    }
}

async fn refresh_position<P: Provider>(
    provider: &P, state: &Mutex<TrackerState>, vehicle_id: &str, ticket: &Ticket,
) {
    let sample = match provider.fetch_latest_position(vehicle_id).await {
        Ok(Some(sample)) => sample,
        Ok(None) => {
            debug!(vehicle_id = %vehicle_id, "no position reported");
            let mut state = state.lock().await;
            if !ticket.is_current() {
                return;
            }
            let selected = state.selection.as_mut().filter(|s| s.vehicle_id == vehicle_id);
            if let Some(selection) = selected {
                selection.position = None;
                selection.heading = None;
            }
            return;
        }
        Err(err) => {
            warn!(vehicle_id = %vehicle_id, error = %err, "position refresh failed");
            return;
        }
    };

    let correction = {
        let mut state = state.lock().await;
        if !ticket.is_current() {
            return;
        }
        let Some(selection) = state.selection.as_mut().filter(|s| s.vehicle_id == vehicle_id)
        else {
            return;
        };

        let progress = match selection.cursor.as_mut() {
            Some(cursor) => cursor.evaluate(&sample),
            None => Progress { heading: sample.heading, advanced: false },
        };
        selection.heading = progress.heading;
        selection.position = Some(sample.clone());

        progress.heading.filter(|_| progress.advanced)
    };

    // share the corrected heading with other viewers
    if let Some(heading) = correction {
        if !ticket.is_current() {
            return;
        }
        if let Err(err) = provider.correct_heading(vehicle_id, sample.captured_at, heading).await {
            warn!(
                monotonic_counter.heading_correction_failures = 1,
                vehicle_id = %vehicle_id,
                error = %err,
                "failed to write corrected heading"
            );
        }
    }
}
