//! Drives one operator and one rider against the in-memory campus network.

use std::sync::Arc;

use anyhow::Result;
use bustrack::demo::{self, OPERATOR_ID, OPERATOR_PASSWORD, VEHICLE_ID};
use common::Capture;
use reporter::DutyMachine;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::Viewer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let provider = Arc::new(demo::campus());
    let reporter_config = reporter::Config::from_env();

    // the rider opens the map first
    provider.push_fix(demo::RIDER.0, demo::RIDER.1, None);
    let mut viewer = Viewer::new(Arc::clone(&provider), viewer::Config::from_env());
    viewer.start().await;

    for (latitude, longitude) in demo::PATH {
        provider.push_fix(latitude, longitude, Some(0.0));
    }
    provider.push_capture(Capture::Captured(format!(r#"{{"bus_id": "{VEHICLE_ID}"}}"#)));

    let login = reporter::login(&*provider, OPERATOR_ID, OPERATOR_PASSWORD).await?;
    let mut duty = DutyMachine::new(Arc::clone(&provider), reporter_config.clone(), login).await;
    let state = duty.start_shift().await?;
    info!(state = ?state, "operator on duty");

    viewer.select_vehicle(VEHICLE_ID).await?;

    for _ in demo::PATH {
        tokio::time::sleep(reporter_config.report_interval).await;
        let snapshot = viewer.snapshot().await;
        if let Some(selection) = snapshot.selection {
            info!(
                vehicle_id = %selection.vehicle_id,
                next_stop = selection.next_stop.as_ref().map_or("-", |s| s.name.as_str()),
                heading = ?selection.heading,
                fleet = snapshot.fleet.len(),
                "tracking"
            );
        }
    }

    duty.end_shift().await?;
    duty.logout().await?;
    viewer.clear_selection().await;
    viewer.stop();

    let written = provider.positions(VEHICLE_ID).await.len();
    info!(samples = written, "demo finished");
    Ok(())
}
