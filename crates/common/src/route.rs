use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fleet::RouteSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub route_id: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    /// Stop identifiers in travel order.
    pub stop_sequence: Vec<String>,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default = "active_default")]
    pub active: bool,
}

const fn active_default() -> bool {
    true
}

impl Route {
    #[must_use]
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            route_name: self.name.clone(),
            source: self.origin.clone(),
            destination: self.destination.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub active: bool,
}

/// A route with its stop sequence resolved to active stops, in sequence
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub route: Route,
    pub stops: Vec<Stop>,
}

impl RouteView {
    /// Orders `stops` by the route's stop sequence. Stops that are inactive or
    /// not returned by storage are skipped; the remaining order is never
    /// re-sorted.
    #[must_use]
    pub fn resolve(route: Route, stops: Vec<Stop>) -> Self {
        let by_id: HashMap<String, Stop> =
            stops.into_iter().filter(|stop| stop.active).map(|s| (s.stop_id.clone(), s)).collect();

        // a stop listed twice in the sequence is visited twice
        let stops = route
            .stop_sequence
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect::<Vec<_>>();

        Self { route, stops }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}
