use anyhow::Context;
use common::{FleetEntry, FleetStore};
use realtime::Result;
use tracing::{debug, warn};

/// Fetch the vehicles currently on duty.
///
/// Rows whose vehicle data is missing are omitted; rows whose route is
/// missing carry the unknown placeholders. No operators on duty is an empty
/// list.
///
/// # Errors
///
/// Returns `Unavailable` when storage cannot be read.
pub async fn fetch_fleet(provider: &impl FleetStore) -> Result<Vec<FleetEntry>> {
    let rows = provider.fetch_on_duty_fleet().await.context("fetching on-duty fleet")?;
    let total = rows.len();

    let fleet = rows.into_iter().filter_map(FleetEntry::from_row).collect::<Vec<_>>();
    if fleet.len() < total {
        warn!(omitted = total - fleet.len(), "on-duty rows without vehicle data");
    }

    debug!(vehicles = fleet.len(), "fleet fetched");
    Ok(fleet)
}
