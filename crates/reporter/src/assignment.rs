use anyhow::Context;
use common::{FleetStore, RouteSummary, Vehicle};
use realtime::{Result, not_found};
use serde::Serialize;
use tracing::warn;

/// The vehicle an operator is driving, with its route summary for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub vehicle: Vehicle,
    pub route: RouteSummary,
}

/// Look up the vehicle and route summary for an assignment. A missing or
/// unreadable route is reported as the unknown placeholder.
///
/// # Errors
///
/// Returns `NotFound` when the vehicle does not exist and `Unavailable` when
/// the vehicle cannot be read.
pub async fn assignment(provider: &impl FleetStore, vehicle_id: &str) -> Result<Assignment> {
    let Some(vehicle) =
        provider.fetch_vehicle(vehicle_id).await.context("fetching assigned vehicle")?
    else {
        return Err(not_found!("vehicle {vehicle_id} not found"));
    };

    let route = match vehicle.route_id.as_deref() {
        Some(route_id) => match provider.fetch_route(route_id).await {
            Ok(Some(route)) => route.summary(),
            Ok(None) => RouteSummary::unknown(),
            Err(err) => {
                warn!(vehicle_id = %vehicle_id, route_id = %route_id, error = %err, "route fetch failed");
                RouteSummary::unknown()
            }
        },
        None => RouteSummary::unknown(),
    };

    Ok(Assignment { vehicle, route })
}
