// src/bin/tachr.rs
//! Headless heart-rate monitor. Feeds the monitor from a simulated trace or
//! a Unix socket, prints the watch face on every change, and toggles
//! monitoring when a line is entered on stdin.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;

use tachr::face;
use tachr::sensor::simulated::SimulatedHeartRateSource;
use tachr::{HapticCue, HeartRateMonitor, HeartRateSource, LogHaptic, MonitorConfig, MonitorHandle};

#[derive(Parser)]
#[command(name = "tachr", version, about = "Heart-rate monitor with guided box breathing")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Drive haptic cues from a timer at each phase's pulse rate
    #[arg(long, global = true)]
    paced: bool,

    /// Ring the terminal bell on each haptic pulse
    #[arg(long, global = true)]
    bell: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a synthetic heart-rate trace that crosses the exercise threshold
    Demo {
        /// Milliseconds between samples
        #[arg(long, default_value_t = 1000)]
        period_ms: u64,

        /// Simulate a declined permission prompt
        #[arg(long)]
        deny_authorization: bool,
    },
    /// Read samples from a Unix socket (newline-delimited JSON)
    Socket {
        #[arg(long, default_value = "/tmp/tachr_heartrate.sock")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if cli.paced {
        config.haptic_cue = HapticCue::Paced;
    }
    let haptic = Arc::new(LogHaptic::new().with_bell(cli.bell));

    match cli.command {
        Command::Demo {
            period_ms,
            deny_authorization,
        } => {
            let source = Arc::new(if deny_authorization {
                SimulatedHeartRateSource::denied()
            } else {
                SimulatedHeartRateSource::new()
            });
            let monitor = HeartRateMonitor::spawn(source.clone(), haptic.clone(), config);
            tokio::spawn(demo_feed(source, Duration::from_millis(period_ms.max(1))));
            run(monitor).await?;
        }
        Command::Socket { path } => {
            let source = socket_source(path)?;
            let monitor = HeartRateMonitor::spawn(source, haptic.clone(), config);
            run(monitor).await?;
        }
    }

    log::info!("{} haptic pulses fired", haptic.count());
    Ok(())
}

#[cfg(unix)]
fn socket_source(path: PathBuf) -> anyhow::Result<Arc<dyn HeartRateSource>> {
    Ok(Arc::new(tachr::sensor::socket::SocketHeartRateSource::new(path)))
}

#[cfg(not(unix))]
fn socket_source(_path: PathBuf) -> anyhow::Result<Arc<dyn HeartRateSource>> {
    anyhow::bail!("the socket source needs Unix domain sockets")
}

/// Synthetic trace oscillating between resting and elevated heart rate.
async fn demo_feed(source: Arc<SimulatedHeartRateSource>, period: Duration) {
    let mut count: u32 = 0;
    loop {
        let t = count as f64;
        let bpm = 92.0 + (t * 0.05).sin() * 18.0 + (t * 0.3).cos() * 1.5;
        source.push_bpm(bpm.max(40.0));
        count = count.wrapping_add(1);
        sleep(period).await;
    }
}

/// Print the face on every change until Ctrl+C or end of stdin.
async fn run(monitor: MonitorHandle) -> anyhow::Result<()> {
    let mut snapshots = monitor.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("Press Enter to start/stop monitoring, Ctrl+C to quit.\n");
    println!("{}\n", face::render(&snapshots.borrow_and_update()));

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}\n", face::render(&snapshots.borrow_and_update()));
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => match monitor.toggle_monitoring().await {
                    Ok(true) => log::info!("Monitoring on"),
                    Ok(false) => log::info!("Monitoring off"),
                    Err(e) => log::warn!("Cannot toggle monitoring: {}", e),
                },
                _ => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    monitor.shutdown().await.context("shutting down monitor")?;
    Ok(())
}
