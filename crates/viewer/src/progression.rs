//! # Route progression
//!
//! Works out which stop a vehicle is heading for. The cursor points at the
//! next stop; a sample within the advance radius of that stop moves the
//! cursor on, wrapping from the last stop back to the first, and the display
//! heading becomes the bearing towards the new target.

use chrono::{DateTime, Utc};
use common::{PositionSample, RouteView, Stop};
use tracing::debug;

/// The outcome of evaluating one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Heading to display for the sample.
    pub heading: Option<f64>,
    /// Whether this sample moved the cursor. `heading` is then the corrected
    /// bearing towards the new target.
    pub advanced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionCursor {
    route_view: RouteView,
    current_stop_index: usize,
    advance_meters: f64,
    last_evaluated: Option<(DateTime<Utc>, Option<f64>)>,
}

impl ProgressionCursor {
    /// A cursor at the first stop of `route_view`.
    #[must_use]
    pub const fn new(route_view: RouteView, advance_meters: f64) -> Self {
        Self { route_view, current_stop_index: 0, advance_meters, last_evaluated: None }
    }

    #[must_use]
    pub const fn route_view(&self) -> &RouteView {
        &self.route_view
    }

    /// Index of the next stop, or `None` when the route has no stops.
    #[must_use]
    pub fn current_stop_index(&self) -> Option<usize> {
        (!self.route_view.is_empty()).then_some(self.current_stop_index)
    }

    #[must_use]
    pub fn next_stop(&self) -> Option<&Stop> {
        self.route_view.stops.get(self.current_stop_index)
    }

    /// Apply the stop-advancement rule to `sample`.
    ///
    /// A sample already evaluated (same `captured_at`) returns the heading it
    /// produced before and never advances again.
    pub fn evaluate(&mut self, sample: &PositionSample) -> Progress {
        if let Some((captured_at, heading)) = self.last_evaluated
            && captured_at == sample.captured_at
        {
            return Progress { heading, advanced: false };
        }

        let progress = self.advance(sample);
        self.last_evaluated = Some((sample.captured_at, progress.heading));
        progress
    }

    fn advance(&mut self, sample: &PositionSample) -> Progress {
        let unchanged = Progress { heading: sample.heading, advanced: false };
        let Some(target) = self.next_stop() else {
            return unchanged;
        };

        let distance = sample.distance_to(target.latitude, target.longitude);
        if distance > self.advance_meters {
            return unchanged;
        }

        let reached = target.stop_id.clone();
        self.current_stop_index = (self.current_stop_index + 1) % self.route_view.stops.len();
        let target = &self.route_view.stops[self.current_stop_index];
        let heading = sample.bearing_to(target.latitude, target.longitude);

        debug!(
            monotonic_counter.stops_advanced = 1,
            vehicle_id = %sample.vehicle_id,
            reached = %reached,
            next = %target.stop_id,
            distance,
            heading,
            "stop reached"
        );
        Progress { heading: Some(heading), advanced: true }
    }
}
