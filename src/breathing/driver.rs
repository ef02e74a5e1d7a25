//! Breathing-cycle driver
//!
//! Owns the current breathing session, the phase timer and the haptic
//! cooldown gate. The driver is not thread-safe on purpose: it lives inside
//! the monitor's update task, which serializes heart-rate observations and
//! timer ticks.
//!
//! A session is an `Option<ActiveSession>`. The phase timer lives inside the
//! session, so ending a session drops the timer and no tick can fire for it
//! afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::phase::BreathingPhase;
use crate::config::HapticCue;
use crate::haptic::HapticActuator;

/// Readings at or above this start the exercise, readings below end it.
pub const HIGH_HEART_RATE_BPM: f64 = 100.0;

/// Length of every breathing phase.
pub const PHASE_INTERVAL: Duration = Duration::from_secs(4);

/// Minimum spacing between two haptic pulses.
pub const HAPTIC_COOLDOWN: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionTransition {
    Started,
    Ended,
}

/// What a single heart-rate observation caused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub transition: Option<SessionTransition>,
    pub pulsed: bool,
}

/// Which timer woke the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverTick {
    Phase,
    Cue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: BreathingPhase,
    pub to: BreathingPhase,
}

struct ActiveSession {
    /// Never `Idle`.
    phase: BreathingPhase,
    phase_timer: Interval,
    /// Present only under the paced cue policy.
    cue_timer: Option<Interval>,
    started_at: Instant,
}

impl ActiveSession {
    fn start(now: Instant, cue: HapticCue) -> Self {
        let mut phase_timer = interval_at(now + PHASE_INTERVAL, PHASE_INTERVAL);
        phase_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let phase = BreathingPhase::BreatheIn;
        Self {
            phase,
            phase_timer,
            cue_timer: cue_timer_for(cue, phase, now),
            started_at: now,
        }
    }

    async fn next_tick(&mut self) -> DriverTick {
        match self.cue_timer.as_mut() {
            Some(cue_timer) => tokio::select! {
                biased;
                _ = self.phase_timer.tick() => DriverTick::Phase,
                _ = cue_timer.tick() => DriverTick::Cue,
            },
            None => {
                self.phase_timer.tick().await;
                DriverTick::Phase
            }
        }
    }
}

/// Cue timer for a phase, first firing at `now`.
fn cue_timer_for(cue: HapticCue, phase: BreathingPhase, now: Instant) -> Option<Interval> {
    if cue != HapticCue::Paced {
        return None;
    }
    let period = phase.cue_interval()?;
    let mut timer = interval_at(now, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

pub struct BreathingDriver {
    session: Option<ActiveSession>,
    /// Survives across sessions so a quick stop/start cannot double-tap.
    last_pulse: Option<Instant>,
    cue: HapticCue,
    haptic: Arc<dyn HapticActuator>,
}

impl BreathingDriver {
    pub fn new(haptic: Arc<dyn HapticActuator>, cue: HapticCue) -> Self {
        Self {
            session: None,
            last_pulse: None,
            cue,
            haptic,
        }
    }

    /// Current phase, `Idle` when no session is running.
    pub fn phase(&self) -> BreathingPhase {
        self.session
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(BreathingPhase::Idle)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Time since the running session started.
    pub fn session_elapsed(&self, now: Instant) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|s| now.saturating_duration_since(s.started_at))
    }

    /// Feed one heart-rate value: threshold check first, then the haptic
    /// gate against the resulting state.
    pub fn observe(&mut self, bpm: f64, now: Instant) -> Observation {
        let transition = if bpm >= HIGH_HEART_RATE_BPM && self.session.is_none() {
            self.session = Some(ActiveSession::start(now, self.cue));
            log::info!("Breathing exercise started at {:.1} BPM", bpm);
            Some(SessionTransition::Started)
        } else if bpm < HIGH_HEART_RATE_BPM && self.session.is_some() {
            self.end_session_at(now);
            Some(SessionTransition::Ended)
        } else {
            None
        };

        let pulsed = self.cue == HapticCue::OnReading && self.try_pulse(now);

        Observation { transition, pulsed }
    }

    /// Resolves on the next timer tick of the running session. Pends forever
    /// while idle. Cancel-safe.
    pub async fn next_tick(&mut self) -> DriverTick {
        match self.session.as_mut() {
            Some(session) => session.next_tick().await,
            None => std::future::pending().await,
        }
    }

    /// Handle a tick returned by [`next_tick`](Self::next_tick).
    pub fn apply_tick(&mut self, tick: DriverTick, now: Instant) -> Option<PhaseChange> {
        match tick {
            DriverTick::Phase => {
                let cue = self.cue;
                let session = self.session.as_mut()?;
                let from = session.phase;
                let to = from.next();
                session.phase = to;
                if session.cue_timer.is_some() {
                    session.cue_timer = cue_timer_for(cue, to, now);
                }
                log::debug!("Breathing phase {} -> {}", from, to);
                Some(PhaseChange { from, to })
            }
            DriverTick::Cue => {
                self.try_pulse(now);
                None
            }
        }
    }

    /// Stop the running session, if any. The phase timer is dropped here.
    pub fn end_session(&mut self) -> bool {
        self.end_session_at(Instant::now())
    }

    fn end_session_at(&mut self, now: Instant) -> bool {
        match self.session.take() {
            Some(session) => {
                log::info!(
                    "Breathing exercise ended after {:.1}s",
                    now.saturating_duration_since(session.started_at).as_secs_f64()
                );
                true
            }
            None => false,
        }
    }

    fn try_pulse(&mut self, now: Instant) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if session.phase.pulse_rate() == 0 {
            return false;
        }
        if let Some(last) = self.last_pulse {
            if now.saturating_duration_since(last) < HAPTIC_COOLDOWN {
                return false;
            }
        }
        self.haptic.pulse();
        self.last_pulse = Some(now);
        log::debug!("Haptic pulse during {}", session.phase);
        true
    }
}
