//! Background refresh loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vpar_control::monitor::{spawn_refresh_task, ResourceMonitor};
use vpar_control::persistence::db;
use vpar_control::persistence::node_repo::NodeResourceRepo;

use super::test_helpers::{available, inventory_xml, vgdisplay, ScriptedExecutor};

#[tokio::test]
async fn first_tick_refreshes_and_cancel_stops_the_loop() {
    let executor = ScriptedExecutor::new();
    executor.on(
        "ignite client list",
        &inventory_xml(&[("npar1", "10.0.0.11", 8, 64 * 1024 * 1024)]),
    );
    executor.on("vparstatus -A", &available(5, 55_936));
    executor.on("vgdisplay", &vgdisplay(64, 8912, 7456));
    let pool = Arc::new(db::connect_memory().await.expect("db"));
    let monitor = Arc::new(
        ResourceMonitor::new(
            Arc::new(executor.clone()),
            NodeResourceRepo::new(pool),
            "ignite",
            "/dev/vg00",
        )
        .expect("monitor"),
    );
    let cancel = CancellationToken::new();

    let handle = spawn_refresh_task(Arc::clone(&monitor), Duration::from_secs(3600), cancel.clone());

    let mut waited = Duration::ZERO;
    while monitor.cached().await.is_none() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(monitor.cached().await.is_some());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("task stops")
        .expect("task did not panic");
    assert_eq!(executor.count("ignite client list"), 1);
}

#[tokio::test]
async fn failing_refresh_keeps_the_loop_alive() {
    let executor = ScriptedExecutor::new();
    executor.fail_on("ignite client list", "connection refused");
    let pool = Arc::new(db::connect_memory().await.expect("db"));
    let monitor = Arc::new(
        ResourceMonitor::new(
            Arc::new(executor.clone()),
            NodeResourceRepo::new(pool),
            "ignite",
            "/dev/vg00",
        )
        .expect("monitor"),
    );
    let cancel = CancellationToken::new();

    let handle = spawn_refresh_task(Arc::clone(&monitor), Duration::from_millis(20), cancel.clone());
    let mut waited = Duration::ZERO;
    while executor.count("ignite client list") < 2 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    assert!(executor.count("ignite client list") >= 2);
    assert!(!handle.is_finished());
    cancel.cancel();
    handle.await.expect("task did not panic");
}
