//! Fleet polling, selection and route progression against the in-memory host.

use std::sync::Arc;
use std::time::Duration;

use bustrack::MemoryProvider;
use bustrack::demo::{self, VEHICLE_ID};
use chrono::{DateTime, TimeZone, Utc};
use common::{
    DutyStore, PositionError, PositionSample, PositionStore, Route, Stop, UNKNOWN_ROUTE,
};
use pretty_assertions::assert_eq;
use viewer::{Config, UserPosition, Viewer};

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, second).unwrap()
}

fn sample(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> PositionSample {
    PositionSample {
        vehicle_id: VEHICLE_ID.to_string(),
        latitude,
        longitude,
        heading: Some(123.0),
        captured_at,
    }
}

fn is_north(heading: f64) -> bool {
    heading < 0.01 || heading > 359.99
}

async fn next_stop(viewer: &Viewer<MemoryProvider>) -> Option<String> {
    viewer.next_stop().await.map(|stop| stop.stop_id)
}

#[tokio::test(start_paused = true)]
async fn fleet_lists_on_duty_vehicles() {
    let provider = Arc::new(demo::campus());
    provider.claim_vehicle("D-1", VEHICLE_ID).await.unwrap();
    provider.claim_vehicle("D-2", "B-7").await.unwrap();

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let fleet = viewer.fleet().await;
    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet[0].vehicle_id, "B-12");
    assert_eq!(fleet[0].operator_name, "Aroha");
    assert_eq!(fleet[0].route_name, "Campus Loop");
    assert_eq!(fleet[1].vehicle_id, "B-7");
    assert_eq!(fleet[1].route_name, UNKNOWN_ROUTE);
    assert_eq!(fleet[1].source, "Unknown");

    // the next poll replaces the list wholesale
    provider.set_operator_duty("D-2", None).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    let fleet = viewer.fleet().await;
    assert_eq!(fleet.len(), 1);
    assert_eq!(fleet[0].vehicle_id, "B-12");
}

#[tokio::test(start_paused = true)]
async fn empty_fleet_is_not_an_error() {
    let provider = Arc::new(demo::campus());
    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(viewer.fleet().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_fleet_poll_keeps_previous_list() {
    let provider = Arc::new(demo::campus());
    provider.claim_vehicle("D-1", VEHICLE_ID).await.unwrap();

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    provider.set_offline(true).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(viewer.fleet().await.len(), 1);
}

#[tokio::test]
async fn user_position_is_located_once() {
    let provider = Arc::new(demo::campus());
    let viewer = Viewer::new(Arc::clone(&provider), Config::default());

    // nothing queued: the device cannot place the rider
    assert_eq!(
        viewer.locate_user().await,
        UserPosition::Failed { error: PositionError::Unavailable }
    );
    assert_eq!(
        viewer.snapshot().await.user_position,
        UserPosition::Failed { error: PositionError::Unavailable }
    );

    provider.push_fix(demo::RIDER.0, demo::RIDER.1, None);
    let UserPosition::Located { fix } = viewer.locate_user().await else {
        panic!("rider not located");
    };
    assert!((fix.latitude - demo::RIDER.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn progression_follows_stops() {
    let provider = Arc::new(demo::campus());
    provider.claim_vehicle("D-1", VEHICLE_ID).await.unwrap();
    // ~11 m from the first stop
    provider.insert_position(sample(12.0001, 77.0, at(0))).await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S1"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S2"));

    // heading now points at the new target, for this viewer and in storage
    let selection = viewer.snapshot().await.selection.unwrap();
    assert!(is_north(selection.heading.unwrap()));
    let stored = provider.fetch_latest_position(VEHICLE_ID).await.unwrap().unwrap();
    assert!(is_north(stored.heading.unwrap()));

    // polling the same sample again does not advance twice
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S2"));

    // ~67 m short of the second stop
    provider.insert_position(sample(12.0024, 77.0, at(20))).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S2"));
    let selection = viewer.snapshot().await.selection.unwrap();
    assert_eq!(selection.heading, Some(123.0));

    provider.insert_position(sample(12.0029, 77.0, at(30))).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S3"));

    provider.insert_position(sample(12.0030, 77.0029, at(40))).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S1"));
}

#[tokio::test(start_paused = true)]
async fn vehicle_without_route_shows_raw_position() {
    let provider = Arc::new(demo::campus());
    provider.claim_vehicle("D-2", "B-7").await.unwrap();
    provider
        .insert_position(PositionSample { vehicle_id: "B-7".to_string(), ..sample(12.0, 77.0, at(0)) })
        .await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.select_vehicle("B-7").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let selection = viewer.snapshot().await.selection.unwrap();
    assert_eq!(selection.route_view, None);
    assert_eq!(selection.next_stop, None);
    assert_eq!(selection.heading, Some(123.0));
    assert_eq!(selection.position.unwrap().vehicle_id, "B-7");
}

#[tokio::test(start_paused = true)]
async fn clearing_selection_clears_everything() {
    let provider = Arc::new(demo::campus());
    provider.insert_position(sample(12.0001, 77.0, at(0))).await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(viewer.snapshot().await.selection.unwrap().position.is_some());

    viewer.clear_selection().await;
    assert_eq!(viewer.snapshot().await.selection, None);
    assert_eq!(viewer.next_stop().await, None);

    // the stopped poller writes nothing back
    provider.insert_position(sample(12.003, 77.0, at(10))).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(viewer.snapshot().await.selection, None);
}

#[tokio::test(start_paused = true)]
async fn reselecting_resets_progression() {
    let provider = Arc::new(demo::campus());
    provider.insert_position(sample(12.0001, 77.0, at(0))).await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S2"));

    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S1"));
    assert_eq!(viewer.snapshot().await.selection.unwrap().position, None);
}

#[tokio::test(start_paused = true)]
async fn route_change_restarts_progression() {
    let stop = |stop_id: &str, latitude: f64, longitude: f64| Stop {
        stop_id: stop_id.to_string(),
        name: format!("Wharf {stop_id}"),
        latitude,
        longitude,
        active: true,
    };
    let provider = Arc::new(
        demo::campus()
            .with_route(Route {
                route_id: "R2".to_string(),
                name: "Harbour Express".to_string(),
                origin: "Ferry Terminal".to_string(),
                destination: "Marina".to_string(),
                stop_sequence: vec!["T1".to_string(), "T2".to_string()],
                distance_km: 2.0,
                estimated_minutes: 9,
                active: true,
            })
            .with_stop(stop("T1", 12.01, 77.0))
            .with_stop(stop("T2", 12.01, 77.003)),
    );
    provider.claim_vehicle("D-1", VEHICLE_ID).await.unwrap();
    provider.insert_position(sample(12.0001, 77.0, at(0))).await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.start().await;
    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("S2"));

    provider.set_vehicle_route(VEHICLE_ID, Some("R2")).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let selection = viewer.snapshot().await.selection.unwrap();
    let route_id = selection.route_view.map(|view| view.route.route_id);
    assert_eq!(route_id.as_deref(), Some("R2"));
    assert_eq!(next_stop(&viewer).await.as_deref(), Some("T1"));
    assert_eq!(selection.position.unwrap().vehicle_id, VEHICLE_ID);

    // taken off every route: raw position only
    provider.set_vehicle_route(VEHICLE_ID, None).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    let selection = viewer.snapshot().await.selection.unwrap();
    assert_eq!(selection.route_view, None);
    assert_eq!(selection.next_stop, None);
}

#[tokio::test(start_paused = true)]
async fn vanished_position_is_cleared() {
    let provider = Arc::new(demo::campus());
    provider.insert_position(sample(12.0001, 77.0, at(0))).await;

    let mut viewer = Viewer::new(Arc::clone(&provider), Config::default());
    viewer.select_vehicle(VEHICLE_ID).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(viewer.snapshot().await.selection.unwrap().position.is_some());

    // a failed poll keeps the last position
    provider.set_offline(true).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(viewer.snapshot().await.selection.unwrap().position.is_some());

    provider.set_offline(false).await;
    provider.clear_positions(VEHICLE_ID).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let selection = viewer.snapshot().await.selection.unwrap();
    assert_eq!(selection.position, None);
    assert_eq!(selection.heading, None);
    assert_eq!(selection.next_stop.map(|stop| stop.stop_id).as_deref(), Some("S2"));
}
