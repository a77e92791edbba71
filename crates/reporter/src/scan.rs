//! Vehicle identifiers captured from a QR code or typed in by hand.

use realtime::{Result, bad_request};
use serde_json::Value;

const ID_FIELDS: [&str; 4] = ["bus_id", "busId", "vehicle_id", "vehicleId"];

/// Extract a vehicle identifier from a scan payload.
///
/// A JSON object payload is searched for a known identifier field; anything
/// else (plain text, JSON scalars) is taken as the identifier itself.
///
/// # Errors
///
/// Returns `BadRequest` when no identifier can be found.
pub fn parse_scan_payload(raw: &str) -> Result<String> {
    let raw = raw.trim();

    let vehicle_id = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => ID_FIELDS
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default(),
        _ => raw.to_string(),
    };

    if vehicle_id.is_empty() {
        return Err(bad_request!("invalid QR code: vehicle id not found"));
    }
    Ok(vehicle_id)
}
