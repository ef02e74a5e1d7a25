//! Heart-rate sensor layer
//!
//! Provides the sensor abstraction the monitor subscribes to, the bridge that
//! hands samples over to the update task, an in-process simulated sensor for
//! tests and demos, and a Unix-socket source for an external sensor daemon.

pub mod bridge;
pub mod simulated;
#[cfg(unix)]
pub mod socket;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bridge::SampleBridge;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Authorization request failed: {0}")]
    Authorization(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of the one-shot permission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authorization {
    Granted,
    Denied,
}

/// A live sensor subscription.
///
/// `cancel` is synchronous: once it returns the source must not deliver to
/// the subscription's bridge again.
pub trait SensorSubscription: Send {
    fn cancel(&mut self);
}

/// A source of heart-rate samples with subscribe-with-callback semantics.
#[async_trait]
pub trait HeartRateSource: Send + Sync {
    /// Ask for read access to heart-rate data.
    async fn request_authorization(&self) -> Result<Authorization, SensorError>;

    /// Start delivering sample batches to `bridge`: first whatever the source
    /// already holds, then every new batch as it arrives.
    fn subscribe(&self, bridge: SampleBridge) -> Result<Box<dyn SensorSubscription>, SensorError>;
}
