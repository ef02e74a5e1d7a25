//! Heart-rate monitor
//!
//! A single tokio task owns every piece of mutable state: the latest heart
//! rate, the authorization and monitoring flags, the sensor subscription and
//! the breathing driver. Sensor readings and user commands arrive on one
//! mpsc channel; driver ticks come from the driver's own timers. Both are
//! serialized by one `select!` loop, and every change is published as a
//! [`MonitorSnapshot`] on a watch channel.
//!
//! Only `MonitorHandle`s hold strong senders. Dropping the last one closes
//! the channel, which stops monitoring and ends the task even if
//! `shutdown` was never called.
//!
//! Readings are tagged with the id of the subscription that produced them.
//! Stopping cancels the subscription and forgets its id, so a reading still
//! queued from it is discarded instead of changing state.

mod command;
mod snapshot;

pub use command::{ControlAction, MonitorCommand};
pub use snapshot::MonitorSnapshot;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::breathing::BreathingDriver;
use crate::config::MonitorConfig;
use crate::haptic::HapticActuator;
use crate::sensor::{
    Authorization, HeartRateSource, SampleBridge, SensorError, SensorSubscription,
};
use crate::types::HeartRateReading;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Heart-rate access not authorized")]
    Unauthorized,

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Monitor task has stopped")]
    Closed,
}

struct ActiveSubscription {
    id: Uuid,
    handle: Box<dyn SensorSubscription>,
}

/// The update task's state.
struct UpdateLoop {
    source: Arc<dyn HeartRateSource>,
    driver: BreathingDriver,
    config: MonitorConfig,
    /// Weak, like the bridges' senders, so the loop ends once every
    /// `MonitorHandle` is dropped.
    commands_tx: mpsc::WeakSender<MonitorCommand>,
    commands_rx: mpsc::Receiver<MonitorCommand>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    subscription: Option<ActiveSubscription>,
    current_heart_rate: f64,
    is_authorized: bool,
}

impl UpdateLoop {
    async fn run(mut self) {
        self.authorize().await;
        self.publish();

        loop {
            tokio::select! {
                biased;
                tick = self.driver.next_tick() => {
                    self.driver.apply_tick(tick, Instant::now());
                }
                command = self.commands_rx.recv() => match command {
                    Some(MonitorCommand::Shutdown { reply }) => {
                        self.stop_monitoring();
                        self.publish();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
            self.publish();
        }

        self.stop_monitoring();
        log::debug!("Monitor update task finished");
    }

    /// One-shot permission check. A denial or a failed request is final.
    async fn authorize(&mut self) {
        let status = match self.source.request_authorization().await {
            Ok(status) => status,
            Err(e) => {
                log::warn!("Heart-rate authorization request failed: {}", e);
                Authorization::Denied
            }
        };
        self.is_authorized = status == Authorization::Granted;

        if !self.is_authorized {
            log::warn!("Heart-rate access denied; sampling disabled");
            return;
        }
        log::info!("Heart-rate access granted");
        if self.config.auto_start {
            if let Err(e) = self.start_monitoring() {
                log::warn!("Failed to start heart-rate monitoring: {}", e);
            }
        }
    }

    fn handle(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Reading {
                subscription,
                reading,
            } => self.on_reading(subscription, reading),
            MonitorCommand::Control { action, reply } => {
                let result = match action {
                    ControlAction::Start => self.start_monitoring(),
                    ControlAction::Stop => Ok(self.stop_monitoring()),
                    ControlAction::Toggle if self.is_monitoring() => Ok(self.stop_monitoring()),
                    ControlAction::Toggle => self.start_monitoring(),
                };
                let _ = reply.send(result);
            }
            MonitorCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the loop itself
            MonitorCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn on_reading(&mut self, subscription: Uuid, reading: HeartRateReading) {
        let current = self.subscription.as_ref().map(|s| s.id);
        if current != Some(subscription) {
            log::debug!("Discarding reading from stale subscription {}", subscription);
            return;
        }

        self.current_heart_rate = reading.bpm;
        let observation = self.driver.observe(reading.bpm, Instant::now());
        log::debug!(
            "Heart rate {:.1} BPM at {} ({:?})",
            reading.bpm,
            reading.timestamp.format("%H:%M:%S%.3f"),
            observation
        );
    }

    fn is_monitoring(&self) -> bool {
        self.subscription.is_some()
    }

    /// (Re)start sampling. Returns the new monitoring flag.
    fn start_monitoring(&mut self) -> Result<bool, MonitorError> {
        if !self.is_authorized {
            return Err(MonitorError::Unauthorized);
        }
        self.stop_monitoring();

        let tx = self.commands_tx.upgrade().ok_or(MonitorError::Closed)?;
        let id = Uuid::new_v4();
        let handle = self.source.subscribe(SampleBridge::new(id, &tx))?;
        self.subscription = Some(ActiveSubscription { id, handle });

        log::info!("Heart-rate monitoring started");
        Ok(true)
    }

    /// Cancel the subscription and any running exercise. Returns the new
    /// monitoring flag.
    fn stop_monitoring(&mut self) -> bool {
        if let Some(mut active) = self.subscription.take() {
            active.handle.cancel();
            log::info!("Heart-rate monitoring stopped");
        }
        self.driver.end_session();
        self.current_heart_rate = 0.0;
        false
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            current_heart_rate: self.current_heart_rate,
            is_authorized: self.is_authorized,
            is_monitoring: self.is_monitoring(),
            breathing_state: self.driver.phase(),
            is_breathing_exercise_active: self.driver.is_active(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

pub struct HeartRateMonitor;

impl HeartRateMonitor {
    /// Spawn the update task on the current tokio runtime.
    ///
    /// Authorization is requested once, right away. When granted and
    /// `config.auto_start` is set, sampling starts immediately.
    pub fn spawn(
        source: Arc<dyn HeartRateSource>,
        haptic: Arc<dyn HapticActuator>,
        config: MonitorConfig,
    ) -> MonitorHandle {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::default());

        let update_loop = UpdateLoop {
            source,
            driver: BreathingDriver::new(haptic, config.haptic_cue),
            config,
            commands_tx: commands_tx.downgrade(),
            commands_rx,
            snapshot_tx,
            subscription: None,
            current_heart_rate: 0.0,
            is_authorized: false,
        };
        let task = tokio::spawn(update_loop.run());

        MonitorHandle {
            commands: commands_tx,
            snapshots: snapshot_rx,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }
}

/// Cheap, cloneable handle to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl MonitorHandle {
    /// Start sampling if stopped, stop if running. Resolves once the change
    /// has been applied, with the new monitoring flag.
    pub async fn toggle_monitoring(&self) -> Result<bool, MonitorError> {
        self.control(ControlAction::Toggle).await
    }

    /// Start (or restart) sampling.
    pub async fn start_monitoring(&self) -> Result<bool, MonitorError> {
        self.control(ControlAction::Start).await
    }

    /// Stop sampling. After this resolves no reading or tick changes state.
    pub async fn stop_monitoring(&self) -> Result<bool, MonitorError> {
        self.control(ControlAction::Stop).await
    }

    async fn control(&self, action: ControlAction) -> Result<bool, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Control { action, reply })
            .await
            .map_err(|_| MonitorError::Closed)?;
        rx.await.map_err(|_| MonitorError::Closed)?
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Snapshot taken by the update task after everything queued before
    /// this call has been applied.
    pub async fn sync_snapshot(&self) -> Result<MonitorSnapshot, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Snapshot { reply })
            .await
            .map_err(|_| MonitorError::Closed)?;
        rx.await.map_err(|_| MonitorError::Closed)
    }

    /// Change notifications for the UI layer.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    /// Stop monitoring and end the update task.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Shutdown { reply })
            .await
            .map_err(|_| MonitorError::Closed)?;
        rx.await.map_err(|_| MonitorError::Closed)?;

        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }
}
