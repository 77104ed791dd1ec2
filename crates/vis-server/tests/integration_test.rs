//! Integration tests for the vehicle data provider.
//!
//! These tests start a real provider loop and observe it only through its
//! handle and the subscriber channels, the same way a transport would.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use vis_core::config::{ProviderSettings, VisConfig};
use vis_core::DataPoint;
use vis_server::{
    ClientSession, DataProvider, DataProviderHandle, ProviderError, PublicPaths,
    SubscriptionOutput, Update, Value, VisError,
};

const RPM: &str = "Signal.Drivetrain.InternalCombustionEngine.RPM";
const POWER: &str = "Signal.Drivetrain.InternalCombustionEngine.Power";
const USERS: &str = "Attribute.Vehicle.UserIdentification.Users";
const VIN: &str = "Attribute.Vehicle.VehicleIdentification.VIN";

/// Start a provider seeded with the built-in data points.
fn start_provider() -> (DataProviderHandle, JoinHandle<()>) {
    start_provider_with(ProviderSettings::default(), VisConfig::default().data_points)
}

fn start_provider_with(
    settings: ProviderSettings,
    seed: Vec<DataPoint>,
) -> (DataProviderHandle, JoinHandle<()>) {
    let (provider, handle) = DataProvider::new(&settings, seed);
    (handle, provider.spawn())
}

/// Wait for the next notification with timeout.
async fn recv(rx: &mut mpsc::Receiver<SubscriptionOutput>) -> Result<SubscriptionOutput, &'static str> {
    match timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(output)) => Ok(output),
        Ok(None) => Err("Channel closed"),
        Err(_) => Err("Timeout"),
    }
}

/// Assert that nothing is queued on the channel.
fn assert_silent(rx: &mut mpsc::Receiver<SubscriptionOutput>) {
    assert!(rx.try_recv().is_err(), "Unexpected notification");
}

#[tokio::test]
async fn test_end_to_end_notification() {
    let (handle, task) = start_provider_with(
        ProviderSettings::default(),
        vec![DataPoint::new(RPM, 2372).with_initialized(true)],
    );
    let (tx, mut rx) = mpsc::channel(8);

    let id = handle.subscribe(&tx, "Signal.Drivetrain.*").await.unwrap();
    assert_eq!(id.to_string(), "1");

    handle.ingest(vec![Update::new(RPM, 3000)]).await.unwrap();

    let output = recv(&mut rx).await.expect("Should receive notification");
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "subscriptionID": "1", "data": { RPM: 3000 } })
    );

    // Exactly one message
    handle.apply(Vec::new()).await.unwrap();
    assert_silent(&mut rx);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_same_scalar_twice_notifies_once() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    handle.subscribe(&tx, RPM).await.unwrap();
    handle.apply(vec![Update::new(RPM, 3000)]).await.unwrap();
    handle.apply(vec![Update::new(RPM, 3000)]).await.unwrap();

    let output = recv(&mut rx).await.unwrap();
    assert_eq!(output.data[RPM], Value::from(3000));
    assert_silent(&mut rx);
}

#[tokio::test]
async fn test_array_updates_always_notify() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    handle.subscribe(&tx, USERS).await.unwrap();
    handle.apply(vec![Update::new(USERS, vec!["User1"])]).await.unwrap();
    handle.apply(vec![Update::new(USERS, vec!["User1"])]).await.unwrap();

    for _ in 0..2 {
        let output = recv(&mut rx).await.unwrap();
        assert_eq!(output.data[USERS], Value::from(vec!["User1"]));
    }
    assert_silent(&mut rx);
}

#[tokio::test]
async fn test_wildcard_and_exact_matching() {
    let longer = format!("{}.Max", RPM);
    let (handle, _task) = start_provider_with(
        ProviderSettings::default(),
        vec![DataPoint::new(RPM, 2372), DataPoint::new(longer.as_str(), 7000)],
    );
    let (wild_tx, mut wild_rx) = mpsc::channel(8);
    let (exact_tx, mut exact_rx) = mpsc::channel(8);

    handle.subscribe(&wild_tx, "Signal.Drivetrain.*").await.unwrap();
    handle.subscribe(&exact_tx, RPM).await.unwrap();

    handle
        .apply(vec![Update::new(longer.as_str(), 7500)])
        .await
        .unwrap();

    let output = recv(&mut wild_rx).await.unwrap();
    assert_eq!(output.data.len(), 1);
    assert!(output.data.contains_key(&longer));
    assert_silent(&mut exact_rx);
}

#[tokio::test]
async fn test_subscription_isolation() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    let rpm_id = handle.subscribe(&tx, RPM).await.unwrap();
    let vin_id = handle.subscribe(&tx, VIN).await.unwrap();

    handle
        .apply(vec![Update::new(RPM, 4000), Update::new(VIN, "WVWZZZ1JZXW000001")])
        .await
        .unwrap();

    let first = recv(&mut rx).await.unwrap();
    let second = recv(&mut rx).await.unwrap();

    assert_eq!(first.id, rpm_id.to_string());
    assert_eq!(first.data.keys().collect::<Vec<_>>(), vec![RPM]);
    assert_eq!(second.id, vin_id.to_string());
    assert_eq!(second.data.keys().collect::<Vec<_>>(), vec![VIN]);
    assert_silent(&mut rx);
}

#[tokio::test]
async fn test_cycle_coalesces_to_last_value() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    handle.subscribe(&tx, "Signal.*").await.unwrap();
    handle
        .apply(vec![
            Update::new(RPM, 3000),
            Update::new(POWER, 80),
            Update::new(RPM, 3500),
        ])
        .await
        .unwrap();

    let output = recv(&mut rx).await.unwrap();
    assert_eq!(output.data.len(), 2);
    assert_eq!(output.data[RPM], Value::from(3500));
    assert_eq!(output.data[POWER], Value::from(80));
    assert_silent(&mut rx);
}

#[tokio::test]
async fn test_unknown_path_update_is_ignored() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    handle.subscribe(&tx, "*").await.unwrap();
    let before = handle.get_by_path("*").await.unwrap();

    let report = handle
        .apply(vec![Update::new("Signal.Cabin.Door.IsOpen", true)])
        .await
        .unwrap();

    assert_eq!(report.unknown, 1);
    assert_eq!(report.applied, 0);
    assert_eq!(handle.get_by_path("*").await.unwrap(), before);
    assert!(matches!(
        handle.get_by_path("Signal.Cabin.Door.IsOpen").await,
        Err(ProviderError::Vis(VisError::NotFound(_)))
    ));
    assert_silent(&mut rx);
}

#[tokio::test]
async fn test_unsubscribe_correctness() {
    let (handle, _task) = start_provider();
    let (tx, mut rx) = mpsc::channel(8);

    let id = handle.subscribe(&tx, RPM).await.unwrap().to_string();
    handle.unsubscribe(&tx, &id).await.unwrap();

    handle.apply(vec![Update::new(RPM, 5000)]).await.unwrap();
    assert_silent(&mut rx);

    assert!(matches!(
        handle.unsubscribe(&tx, &id).await,
        Err(ProviderError::Vis(VisError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_unsubscribe_on_other_channel_is_not_found() {
    let (handle, _task) = start_provider();
    let (tx, _rx) = mpsc::channel(8);
    let (other, _other_rx) = mpsc::channel(8);

    let id = handle.subscribe(&tx, RPM).await.unwrap().to_string();
    assert!(matches!(
        handle.unsubscribe(&other, &id).await,
        Err(ProviderError::Vis(VisError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_query_not_found_and_invalid() {
    let (handle, _task) = start_provider();

    assert!(matches!(
        handle.get_by_path("Nonexistent.*").await,
        Err(ProviderError::Vis(VisError::NotFound(_)))
    ));
    assert!(matches!(
        handle.get_by_path("").await,
        Err(ProviderError::Vis(VisError::InvalidPattern(_)))
    ));

    let (tx, _rx) = mpsc::channel(8);
    assert!(matches!(
        handle.subscribe(&tx, "Signal.*Engine").await,
        Err(ProviderError::Vis(VisError::InvalidPattern(_)))
    ));

    // A rejected pattern does not consume an id
    assert_eq!(handle.subscribe(&tx, RPM).await.unwrap().to_string(), "1");
}

#[tokio::test]
async fn test_get_by_path_returns_seed() {
    let (handle, _task) = start_provider();

    let values = handle.get_by_path("Attribute.*").await.unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[VIN], Value::from("1234567890QWERTYU"));
    assert_eq!(values[USERS], Value::from(vec!["User1"]));
}

#[tokio::test]
async fn test_slow_subscriber_is_evicted() {
    let settings = ProviderSettings {
        send_timeout_ms: 10,
        max_consecutive_timeouts: 2,
        ..ProviderSettings::default()
    };
    let (handle, _task) = start_provider_with(settings, VisConfig::default().data_points);

    // Capacity 1 and never read
    let (slow_tx, _slow_rx) = mpsc::channel(1);
    let (fast_tx, mut fast_rx) = mpsc::channel(16);

    handle.subscribe(&slow_tx, RPM).await.unwrap();
    handle.subscribe(&fast_tx, RPM).await.unwrap();

    let mut evicted = 0;
    for rpm in [3000, 3100, 3200] {
        let report = handle.apply(vec![Update::new(RPM, rpm)]).await.unwrap();
        evicted += report.evicted;
        let output = recv(&mut fast_rx).await.unwrap();
        assert_eq!(output.data[RPM], Value::from(rpm));
    }
    assert_eq!(evicted, 1);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.channels_evicted, 1);
    assert_eq!(stats.subscriptions, 1);
    assert_eq!(stats.channels, 1);
}

#[tokio::test]
async fn test_closed_subscriber_is_evicted_immediately() {
    let (handle, _task) = start_provider();
    let (closed_tx, closed_rx) = mpsc::channel(8);
    let (tx, mut rx) = mpsc::channel(8);

    handle.subscribe(&closed_tx, RPM).await.unwrap();
    handle.subscribe(&tx, RPM).await.unwrap();
    drop(closed_rx);

    let report = handle.apply(vec![Update::new(RPM, 3000)]).await.unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(recv(&mut rx).await.unwrap().data[RPM], Value::from(3000));

    assert_eq!(handle.stats().await.unwrap().subscriptions, 1);
}

#[tokio::test]
async fn test_shutdown_stops_provider() {
    let (handle, task) = start_provider();
    let (tx, _rx) = mpsc::channel(8);

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

    assert_eq!(handle.subscribe(&tx, RPM).await, Err(ProviderError::Stopped));
    assert_eq!(handle.ingest(Vec::new()).await, Err(ProviderError::Stopped));
}

#[tokio::test]
async fn test_session_access_list() {
    let (handle, _task) = start_provider();
    let access = Arc::new(PublicPaths::from_config(&VisConfig::default()).unwrap());
    let (session, mut rx) = ClientSession::open(handle.clone(), access, 8);

    assert_eq!(
        session.subscribe(RPM).await,
        Err(ProviderError::Forbidden(RPM.to_string()))
    );

    let id = session.subscribe(POWER).await.unwrap();
    handle.apply(vec![Update::new(POWER, 75)]).await.unwrap();

    let output = recv(&mut rx).await.unwrap();
    assert_eq!(output.id, id.to_string());
    assert_eq!(output.data[POWER], Value::from(75));

    session.close().await.unwrap();
    handle.apply(vec![Update::new(POWER, 90)]).await.unwrap();
    assert_silent(&mut rx);
}
