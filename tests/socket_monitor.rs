//! Monitor fed through the Unix-socket source.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::watch;

use tachr::sensor::socket::SocketHeartRateSource;
use tachr::{BreathingPhase, HeartRateMonitor, LogHaptic, MonitorConfig, MonitorSnapshot};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn wait_for(
    rx: &mut watch::Receiver<MonitorSnapshot>,
    done: impl Fn(&MonitorSnapshot) -> bool,
) -> MonitorSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if done(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.expect("monitor task ended");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

async fn wait_until_gone(path: &Path) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("socket file still present");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_socket_feed_drives_exercise() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hr.sock");
    let haptic = Arc::new(LogHaptic::new());
    let monitor = HeartRateMonitor::spawn(
        Arc::new(SocketHeartRateSource::new(&path)),
        haptic.clone(),
        MonitorConfig::default(),
    );
    let snapshot = monitor.sync_snapshot().await.unwrap();
    assert!(snapshot.is_authorized);
    assert!(snapshot.is_monitoring);
    assert!(path.exists());

    let mut rx = monitor.subscribe();
    let mut feed = UnixStream::connect(&path).await.unwrap();
    feed.write_all(b"{\"quantity\": 72.0, \"unit\": \"count/min\"}\n")
        .await
        .unwrap();
    let snapshot = wait_for(&mut rx, |s| s.current_heart_rate == 72.0).await;
    assert!(!snapshot.is_breathing_exercise_active);

    // Malformed lines are skipped, batches reduce to their last sample
    feed.write_all(b"not json\n")
        .await
        .unwrap();
    feed.write_all(b"[{\"quantity\": 80.0}, {\"quantity\": 1.75, \"unit\": \"count/s\"}]\n")
        .await
        .unwrap();
    let snapshot = wait_for(&mut rx, |s| s.is_breathing_exercise_active).await;
    assert_eq!(snapshot.current_heart_rate, 105.0);
    assert_eq!(snapshot.breathing_state, BreathingPhase::BreatheIn);
    assert_eq!(haptic.count(), 1);

    feed.write_all(b"{\"bpm\": 90.0, \"source\": \"ring\"}\n")
        .await
        .unwrap();
    let snapshot = wait_for(&mut rx, |s| s.current_heart_rate == 90.0).await;
    assert_eq!(snapshot.breathing_state, BreathingPhase::Idle);

    assert!(!monitor.stop_monitoring().await.unwrap());
    assert!(!path.exists());

    monitor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropped_handle_releases_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hr.sock");
    let monitor = HeartRateMonitor::spawn(
        Arc::new(SocketHeartRateSource::new(&path)),
        Arc::new(LogHaptic::new()),
        MonitorConfig::default(),
    );
    assert!(monitor.sync_snapshot().await.unwrap().is_monitoring);
    assert!(path.exists());

    drop(monitor);
    wait_until_gone(&path).await;
}
