use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ROUTE: &str = "Unknown Route";
pub const UNKNOWN_PLACE: &str = "Unknown";

/// A bus as held in storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vehicle_id: String,
    pub name: String,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub avg_speed: Option<f64>,
    pub active: bool,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// The descriptive part of a route shown alongside a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_name: String,
    pub source: String,
    pub destination: String,
}

impl RouteSummary {
    /// Placeholder used when a vehicle's route cannot be resolved.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            route_name: UNKNOWN_ROUTE.to_string(),
            source: UNKNOWN_PLACE.to_string(),
            destination: UNKNOWN_PLACE.to_string(),
        }
    }
}

/// Raw join row returned by storage for one on-duty operator. Any of the
/// joined parts may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetRow {
    pub vehicle_id: String,
    pub operator_name: String,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub route: Option<RouteSummary>,
}

/// A vehicle currently on duty, joined with its operator and route summary.
/// Recomputed on every fleet poll; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    pub vehicle_id: String,
    pub vehicle_name: String,
    pub operator_name: String,
    pub route_id: Option<String>,
    pub route_name: String,
    pub source: String,
    pub destination: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FleetEntry {
    /// Builds an entry from a join row. Rows without vehicle data are
    /// dropped; a missing route is filled with placeholders so an entry is
    /// never partially populated.
    #[must_use]
    pub fn from_row(row: FleetRow) -> Option<Self> {
        let vehicle = row.vehicle?;
        let route = row.route.unwrap_or_else(RouteSummary::unknown);

        Some(Self {
            vehicle_id: row.vehicle_id,
            vehicle_name: vehicle.name,
            operator_name: row.operator_name,
            route_id: vehicle.route_id,
            route_name: route.route_name,
            source: route.source,
            destination: route.destination,
            last_updated: vehicle.last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vehicle() -> Vehicle {
        Vehicle {
            vehicle_id: "B-12".to_string(),
            name: "Bus 12".to_string(),
            route_id: Some("R1".to_string()),
            active: true,
            ..Vehicle::default()
        }
    }

    #[test]
    fn complete_row() {
        let row = FleetRow {
            vehicle_id: "B-12".to_string(),
            operator_name: "Aroha".to_string(),
            vehicle: Some(vehicle()),
            route: Some(RouteSummary {
                route_name: "Campus Loop".to_string(),
                source: "North Gate".to_string(),
                destination: "Library".to_string(),
            }),
        };

        let entry = FleetEntry::from_row(row).expect("entry");
        assert_eq!(entry.vehicle_name, "Bus 12");
        assert_eq!(entry.route_id.as_deref(), Some("R1"));
        assert_eq!(entry.route_name, "Campus Loop");
    }

    #[test]
    fn missing_route_uses_placeholders() {
        let row = FleetRow {
            vehicle_id: "B-12".to_string(),
            operator_name: "Aroha".to_string(),
            vehicle: Some(vehicle()),
            route: None,
        };

        let entry = FleetEntry::from_row(row).expect("entry");
        assert_eq!(entry.route_name, UNKNOWN_ROUTE);
        assert_eq!(entry.source, UNKNOWN_PLACE);
        assert_eq!(entry.destination, UNKNOWN_PLACE);
    }

    #[test]
    fn missing_vehicle_is_omitted() {
        let row = FleetRow {
            vehicle_id: "B-12".to_string(),
            operator_name: "Aroha".to_string(),
            ..FleetRow::default()
        };
        assert!(FleetEntry::from_row(row).is_none());
    }
}
