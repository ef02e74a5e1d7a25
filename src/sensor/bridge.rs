//! Sampling bridge
//!
//! Sensor sources call [`SampleBridge::deliver`] from whatever thread they
//! run on. The bridge reduces a batch to its most recent heart rate and hands
//! it to the monitor's update task through its command channel. It never
//! blocks: a saturated channel drops the reading.
//!
//! The bridge only holds a weak sender. A subscription left alive inside a
//! sensor source does not keep the update task running once every
//! `MonitorHandle` is gone.

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::monitor::MonitorCommand;
use crate::types::{HeartRateReading, SensorSample};

#[derive(Clone, Debug)]
pub struct SampleBridge {
    subscription: Uuid,
    tx: mpsc::WeakSender<MonitorCommand>,
}

impl SampleBridge {
    pub(crate) fn new(subscription: Uuid, tx: &mpsc::Sender<MonitorCommand>) -> Self {
        Self {
            subscription,
            tx: tx.downgrade(),
        }
    }

    /// Subscription this bridge delivers for.
    pub fn subscription_id(&self) -> Uuid {
        self.subscription
    }

    /// Forward the most recent sample of a chronologically ordered batch.
    ///
    /// Returns `true` if a reading was handed to the update task. Empty
    /// batches and malformed samples are dropped silently.
    pub fn deliver(&self, batch: &[SensorSample]) -> bool {
        let Some(latest) = batch.last() else {
            return false;
        };
        let Some(reading) = HeartRateReading::from_sample(latest) else {
            log::debug!(
                "Dropping heart-rate sample {} {}",
                latest.quantity,
                latest.unit
            );
            return false;
        };

        let Some(tx) = self.tx.upgrade() else {
            log::debug!("Monitor gone, dropping heart-rate reading");
            return false;
        };
        let command = MonitorCommand::Reading {
            subscription: self.subscription,
            reading,
        };
        match tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Monitor busy, dropping heart-rate reading");
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Monitor stopped, dropping heart-rate reading");
                false
            }
        }
    }

    /// Whether the update task is still receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.upgrade().map_or(true, |tx| tx.is_closed())
    }
}
