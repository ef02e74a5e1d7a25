//! Unix-socket heart-rate source
//!
//! An external sensor daemon (a ring or chest-strap bridge) connects to the
//! socket and writes newline-delimited JSON. Each line is either one sample
//! or an array of samples in chronological order:
//!
//! ```text
//! {"quantity": 72.5, "unit": "count/min"}
//! [{"quantity": 98.0}, {"quantity": 101.0}]
//! {"bpm": 104.0, "timestamp": "2025-03-09T10:00:00Z", "source": "ring"}
//! ```
//!
//! Lines that do not parse are logged and skipped.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};

use super::{Authorization, HeartRateSource, SampleBridge, SensorError, SensorSubscription};
use crate::types::SensorSample;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tachr_heartrate.sock";

#[derive(Deserialize)]
#[serde(untagged)]
enum SampleBatch {
    Many(Vec<SensorSample>),
    One(SensorSample),
}

/// Parse one line of socket input into a batch.
pub(crate) fn parse_line(line: &str) -> Result<Vec<SensorSample>, serde_json::Error> {
    let batch: SampleBatch = serde_json::from_str(line.trim())?;
    Ok(match batch {
        SampleBatch::Many(samples) => samples,
        SampleBatch::One(sample) => vec![sample],
    })
}

pub struct SocketHeartRateSource {
    path: PathBuf,
}

impl SocketHeartRateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SocketHeartRateSource {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

#[async_trait]
impl HeartRateSource for SocketHeartRateSource {
    /// Anyone who can reach the socket may feed it.
    async fn request_authorization(&self) -> Result<Authorization, SensorError> {
        Ok(Authorization::Granted)
    }

    fn subscribe(&self, bridge: SampleBridge) -> Result<Box<dyn SensorSubscription>, SensorError> {
        remove_stale_socket(&self.path);
        let listener = UnixListener::bind(&self.path)?;
        log::info!("Listening for heart-rate samples on {}", self.path.display());

        let task = tokio::spawn(accept_loop(listener, bridge));
        Ok(Box::new(SocketSubscription {
            task: Some(task),
            path: self.path.clone(),
        }))
    }
}

/// Remove a socket left behind by a previous run. Anything that is not a
/// socket stays put and makes the bind fail instead.
fn remove_stale_socket(path: &Path) {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Failed to remove stale socket {}: {}", path.display(), e);
            }
        }
        Ok(_) => log::warn!("{} exists and is not a socket", path.display()),
        Err(_) => {}
    }
}

async fn accept_loop(listener: UnixListener, bridge: SampleBridge) {
    // Dropping the set aborts every connection task with it
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    log::info!("Sensor feed connected");
                    connections.spawn(read_feed(stream, bridge.clone()));
                }
                Err(e) => {
                    log::warn!("Failed to accept sensor connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn read_feed(stream: UnixStream, bridge: SampleBridge) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match parse_line(&line) {
                Ok(batch) => {
                    bridge.deliver(&batch);
                }
                Err(e) => log::warn!("Skipping malformed sensor line: {}", e),
            },
            Ok(None) => break,
            Err(e) => {
                log::warn!("Sensor feed read error: {}", e);
                break;
            }
        }
    }
    log::info!("Sensor feed disconnected");
}

struct SocketSubscription {
    task: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl SensorSubscription for SocketSubscription {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            remove_stale_socket(&self.path);
            log::info!("Stopped listening on {}", self.path.display());
        }
    }
}

impl Drop for SocketSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorCommand;
    use crate::types::SampleUnit;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[test]
    fn test_parse_single_and_batch() {
        let one = parse_line(r#"{"quantity": 72.5, "unit": "count/min"}"#).unwrap();
        assert_eq!(one, vec![SensorSample::bpm(72.5)]);

        let many = parse_line(r#"[{"quantity": 98.0}, {"quantity": 1.7, "unit": "count/s"}]"#).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].unit, SampleUnit::BeatsPerSecond);

        assert!(parse_line("not json").is_err());
    }

    #[test]
    fn test_parse_ring_message() {
        let batch = parse_line(
            r#"{"bpm": 104.0, "timestamp": "2025-03-09T10:00:00Z", "source": "ring", "raw_data": null}"#,
        )
        .unwrap();
        assert_eq!(batch, vec![SensorSample::bpm(104.0)]);
    }

    #[tokio::test]
    async fn test_socket_feed_reaches_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hr.sock");
        let source = SocketHeartRateSource::new(&path);

        let (tx, mut rx) = mpsc::channel(8);
        let mut sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream
            .write_all(b"garbage\n{\"quantity\": 111.0}\n")
            .await
            .unwrap();

        let cmd = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match cmd {
            MonitorCommand::Reading { reading, .. } => assert_eq!(reading.bpm, 111.0),
            other => panic!("unexpected command {:?}", other),
        }

        sub.cancel();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hr.sock");
        // Left behind by a run that never cleaned up
        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let source = SocketHeartRateSource::new(&path);
        let (tx, _rx) = mpsc::channel(8);
        let mut sub = source
            .subscribe(SampleBridge::new(Uuid::new_v4(), &tx))
            .unwrap();
        assert!(UnixStream::connect(&path).await.is_ok());
        sub.cancel();
    }

    #[tokio::test]
    async fn test_regular_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "keep me").unwrap();

        let source = SocketHeartRateSource::new(&path);
        let (tx, _rx) = mpsc::channel(8);
        let result = source.subscribe(SampleBridge::new(Uuid::new_v4(), &tx));
        assert!(matches!(result, Err(SensorError::Io(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }
}
