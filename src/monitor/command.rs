use tokio::sync::oneshot;
use uuid::Uuid;

use super::{MonitorError, MonitorSnapshot};
use crate::types::HeartRateReading;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Toggle,
}

/// Everything the update task reacts to, apart from its own timers.
#[derive(Debug)]
pub enum MonitorCommand {
    /// A heart rate forwarded by a [`SampleBridge`](crate::sensor::SampleBridge).
    Reading {
        subscription: Uuid,
        reading: HeartRateReading,
    },
    /// Start or stop sampling. Replies with the new monitoring flag.
    Control {
        action: ControlAction,
        reply: oneshot::Sender<Result<bool, MonitorError>>,
    },
    /// Reply with the state after every earlier command has been applied.
    Snapshot {
        reply: oneshot::Sender<MonitorSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
