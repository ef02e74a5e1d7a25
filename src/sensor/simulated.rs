//! In-process heart-rate sensor simulator
//!
//! Behaves like an anchored sensor query: a new subscription first receives
//! the most recent sample already pushed, then each later batch as it is
//! pushed. Nothing older than that sample is retained.
//! `push` may be called from any thread. Used for integration testing and
//! the demo without real sensor hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Authorization, HeartRateSource, SampleBridge, SensorError, SensorSubscription};
use crate::types::SensorSample;

#[derive(Default)]
struct SimState {
    /// Last sample of the last non-empty batch.
    latest: Option<SensorSample>,
    subscribers: HashMap<Uuid, SampleBridge>,
    authorization_requests: usize,
}

/// A simulated sensor shared between the monitor and a test or demo driver.
pub struct SimulatedHeartRateSource {
    authorization: Result<Authorization, String>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHeartRateSource {
    /// A sensor that grants access.
    pub fn new() -> Self {
        Self {
            authorization: Ok(Authorization::Granted),
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// A sensor whose permission prompt is declined.
    pub fn denied() -> Self {
        Self {
            authorization: Ok(Authorization::Denied),
            ..Self::new()
        }
    }

    /// A sensor whose permission request fails outright.
    pub fn failing(reason: &str) -> Self {
        Self {
            authorization: Err(reason.to_string()),
            ..Self::new()
        }
    }

    /// Record a batch and deliver it to every live subscription.
    /// Returns the number of subscriptions that accepted it.
    pub fn push(&self, batch: Vec<SensorSample>) -> usize {
        let bridges: Vec<SampleBridge> = match self.state.lock() {
            Ok(mut state) => {
                if let Some(last) = batch.last() {
                    state.latest = Some(last.clone());
                }
                state.subscribers.values().cloned().collect()
            }
            Err(_) => return 0,
        };
        bridges.iter().filter(|b| b.deliver(&batch)).count()
    }

    /// Push a single sample in beats per minute.
    pub fn push_bpm(&self, bpm: f64) -> usize {
        self.push(vec![SensorSample::bpm(bpm)])
    }

    /// The sample a new subscription would start from.
    pub fn latest(&self) -> Option<SensorSample> {
        self.state.lock().ok().and_then(|s| s.latest.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }

    pub fn authorization_requests(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.authorization_requests)
            .unwrap_or(0)
    }
}

impl Default for SimulatedHeartRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeartRateSource for SimulatedHeartRateSource {
    async fn request_authorization(&self) -> Result<Authorization, SensorError> {
        if let Ok(mut state) = self.state.lock() {
            state.authorization_requests += 1;
        }
        self.authorization
            .clone()
            .map_err(SensorError::Authorization)
    }

    fn subscribe(&self, bridge: SampleBridge) -> Result<Box<dyn SensorSubscription>, SensorError> {
        let id = bridge.subscription_id();
        let initial = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| SensorError::Subscription("Simulator state poisoned".into()))?;
            state.subscribers.insert(id, bridge.clone());
            state.latest.clone()
        };
        if let Some(sample) = initial {
            bridge.deliver(std::slice::from_ref(&sample));
        }

        Ok(Box::new(SimSubscription {
            id,
            state: Arc::clone(&self.state),
            active: true,
        }))
    }
}

struct SimSubscription {
    id: Uuid,
    state: Arc<Mutex<SimState>>,
    active: bool,
}

impl SensorSubscription for SimSubscription {
    fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.remove(&self.id);
        }
    }
}

impl Drop for SimSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorCommand;
    use tokio::sync::mpsc;

    fn recv_bpm(rx: &mut mpsc::Receiver<MonitorCommand>) -> Option<f64> {
        match rx.try_recv().ok()? {
            MonitorCommand::Reading { reading, .. } => Some(reading.bpm),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_authorization_outcomes() {
        let granted = SimulatedHeartRateSource::new();
        assert_eq!(
            granted.request_authorization().await.unwrap(),
            Authorization::Granted
        );
        assert_eq!(granted.authorization_requests(), 1);

        let denied = SimulatedHeartRateSource::denied();
        assert_eq!(
            denied.request_authorization().await.unwrap(),
            Authorization::Denied
        );

        let failing = SimulatedHeartRateSource::failing("no health store");
        assert!(matches!(
            failing.request_authorization().await,
            Err(SensorError::Authorization(_))
        ));
    }

    #[test]
    fn test_initial_snapshot_then_updates() {
        let source = SimulatedHeartRateSource::new();
        source.push_bpm(64.0);
        source.push_bpm(66.0);

        let (tx, mut rx) = mpsc::channel(8);
        let _sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();

        // The anchored snapshot is the latest sample only
        assert_eq!(recv_bpm(&mut rx), Some(66.0));
        assert_eq!(recv_bpm(&mut rx), None);

        assert_eq!(source.push_bpm(101.0), 1);
        assert_eq!(recv_bpm(&mut rx), Some(101.0));
    }

    #[test]
    fn test_only_latest_sample_is_retained() {
        let source = SimulatedHeartRateSource::new();
        for i in 0..10_000 {
            source.push_bpm(60.0 + (i % 50) as f64);
        }
        source.push(vec![SensorSample::bpm(71.0), SensorSample::bpm(104.0)]);
        // Empty batches leave the anchor alone
        source.push(Vec::new());
        assert_eq!(source.latest(), Some(SensorSample::bpm(104.0)));

        let (first_tx, mut first_rx) = mpsc::channel(8);
        let _first = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &first_tx))
            .unwrap();
        assert_eq!(recv_bpm(&mut first_rx), Some(104.0));

        source.push_bpm(97.0);
        assert_eq!(recv_bpm(&mut first_rx), Some(97.0));

        let (second_tx, mut second_rx) = mpsc::channel(8);
        let _second = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &second_tx))
            .unwrap();
        assert_eq!(recv_bpm(&mut second_rx), Some(97.0));
        assert_eq!(recv_bpm(&mut second_rx), None);
    }

    #[test]
    fn test_fresh_source_sends_no_snapshot() {
        let source = SimulatedHeartRateSource::new();
        let (tx, mut rx) = mpsc::channel(8);
        let _sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();
        assert_eq!(recv_bpm(&mut rx), None);
        assert_eq!(source.latest(), None);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let source = SimulatedHeartRateSource::new();
        let (tx, mut rx) = mpsc::channel(8);
        let mut sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();
        assert_eq!(source.subscriber_count(), 1);

        sub.cancel();
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.push_bpm(120.0), 0);
        assert_eq!(recv_bpm(&mut rx), None);

        // Cancelling twice is harmless
        sub.cancel();
    }

    #[test]
    fn test_drop_cancels() {
        let source = SimulatedHeartRateSource::new();
        let (tx, _rx) = mpsc::channel(8);
        let sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();
        drop(sub);
        assert_eq!(source.subscriber_count(), 0);
    }
}
