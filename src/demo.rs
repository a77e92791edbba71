//! A small campus network used by the demo binary.

use common::{Route, Stop, Vehicle};

use crate::provider::MemoryProvider;

pub const OPERATOR_ID: &str = "D-1";
pub const OPERATOR_PASSWORD: &str = "kia-ora";
pub const VEHICLE_ID: &str = "B-12";

/// Where the bus drives during the demo: up to each stop in turn and back to
/// the first.
pub const PATH: [(f64, f64); 7] = [
    (12.0001, 77.0),
    (12.0015, 77.0),
    (12.0029, 77.0),
    (12.0030, 77.0015),
    (12.0030, 77.0029),
    (12.0015, 77.0015),
    (12.0001, 77.0001),
];

/// Where the rider is standing.
pub const RIDER: (f64, f64) = (12.0012, 77.0008);

fn stop(stop_id: &str, name: &str, latitude: f64, longitude: f64) -> Stop {
    Stop { stop_id: stop_id.to_string(), name: name.to_string(), latitude, longitude, active: true }
}

/// Two operators, two buses and one three-stop loop. The second bus has no
/// route, so it shows in the fleet with placeholders.
#[must_use]
pub fn campus() -> MemoryProvider {
    MemoryProvider::new()
        .with_operator(OPERATOR_ID, "Aroha", OPERATOR_PASSWORD)
        .with_operator("D-2", "Tama", "haere-mai")
        .with_vehicle(Vehicle {
            vehicle_id: VEHICLE_ID.to_string(),
            name: "Bus 12".to_string(),
            route_id: Some("R1".to_string()),
            avg_speed: Some(22.0),
            active: true,
            last_updated: None,
        })
        .with_vehicle(Vehicle {
            vehicle_id: "B-7".to_string(),
            name: "Bus 7".to_string(),
            route_id: None,
            avg_speed: None,
            active: true,
            last_updated: None,
        })
        .with_route(Route {
            route_id: "R1".to_string(),
            name: "Campus Loop".to_string(),
            origin: "North Gate".to_string(),
            destination: "Library".to_string(),
            stop_sequence: vec!["S1".to_string(), "S2".to_string(), "S3".to_string()],
            distance_km: 1.0,
            estimated_minutes: 6,
            active: true,
        })
        .with_stop(stop("S1", "North Gate", 12.0, 77.0))
        .with_stop(stop("S2", "Science Block", 12.003, 77.0))
        .with_stop(stop("S3", "Library", 12.003, 77.003))
}
