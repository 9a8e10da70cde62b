//! 引擎发布的决策与时间点快照

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;

use super::coordinator::SpeechQueueItem;
use crate::config::{BehaviorMode, GestureKind};
use crate::gesture::ArmMode;
use crate::suppression::{DeviceState, SuppressionReason};

/// Capacity of the outcome broadcast; slow subscribers see `Lagged`
pub const OUTCOME_CHANNEL_CAPACITY: usize = 256;

/// What discarded pending or in-flight speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Gesture(GestureKind),
    /// The notification was dismissed by the user
    Dismissed,
    /// A newer readout took the slot
    Superseded,
    /// Explicit `cancel_all` from the host
    Requested,
    Shutdown,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Gesture(kind) => write!(f, "{kind} gesture"),
            CancelCause::Dismissed => f.write_str("dismissed"),
            CancelCause::Superseded => f.write_str("superseded"),
            CancelCause::Requested => f.write_str("requested"),
            CancelCause::Shutdown => f.write_str("shutdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    /// An utterance started
    Spoken { app_id: String, text: String },
    /// The backend reported the current utterance done
    Finished { app_id: String },
    Queued { app_id: String, position: usize },
    Preempted { stopped_app_id: String, by_app_id: String },
    /// Discarded by the behavior mode while busy
    Dropped { app_id: String, mode: BehaviorMode },
    Suppressed { app_id: String, reason: SuppressionReason },
    Delayed { app_id: String, delay: Duration },
    DelayCancelled { app_id: String, cause: CancelCause },
    /// Current speech stopped and/or queued items removed
    Cancelled {
        cause: CancelCause,
        stopped_app_id: Option<String>,
        cleared: usize,
    },
    GestureTriggered(GestureKind),
    GestureTested(GestureKind),
    GestureDisarmed(GestureKind),
}

impl fmt::Display for EngineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineOutcome::Spoken { app_id, text } => write!(f, "spoken    {app_id}: {text}"),
            EngineOutcome::Finished { app_id } => write!(f, "finished  {app_id}"),
            EngineOutcome::Queued { app_id, position } => {
                write!(f, "queued    {app_id} at position {position}")
            }
            EngineOutcome::Preempted {
                stopped_app_id,
                by_app_id,
            } => write!(f, "preempted {stopped_app_id} by {by_app_id}"),
            EngineOutcome::Dropped { app_id, mode } => write!(f, "dropped   {app_id} ({mode} mode)"),
            EngineOutcome::Suppressed { app_id, reason } => {
                write!(f, "suppressed {app_id}: {reason}")
            }
            EngineOutcome::Delayed { app_id, delay } => {
                write!(f, "delayed   {app_id} for {}s", delay.as_secs())
            }
            EngineOutcome::DelayCancelled { app_id, cause } => {
                write!(f, "discarded {app_id} ({cause})")
            }
            EngineOutcome::Cancelled {
                cause,
                stopped_app_id,
                cleared,
            } => {
                write!(f, "cancelled ({cause})")?;
                if let Some(app_id) = stopped_app_id {
                    write!(f, " stopped {app_id}")?;
                }
                write!(f, ", {cleared} queued removed")
            }
            EngineOutcome::GestureTriggered(kind) => write!(f, "gesture   {kind} cancel"),
            EngineOutcome::GestureTested(kind) => write!(f, "gesture   {kind} test ok"),
            EngineOutcome::GestureDisarmed(kind) => write!(f, "gesture   {kind} disarmed"),
        }
    }
}

/// Broadcast side of the outcome stream
#[derive(Debug, Clone)]
pub struct OutcomeSink {
    tx: broadcast::Sender<EngineOutcome>,
}

impl OutcomeSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, outcome: EngineOutcome) {
        // No subscribers is fine
        let _ = self.tx.send(outcome);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineOutcome> {
        self.tx.subscribe()
    }
}

impl Default for OutcomeSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Speaking,
    /// Speaking with more items waiting
    Draining,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Speaking => "speaking",
            Phase::Draining => "draining",
        };
        f.write_str(s)
    }
}

/// Engine state as seen between two commands
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub phase: Phase,
    pub speaking: Option<SpeechQueueItem>,
    pub queue: Vec<SpeechQueueItem>,
    /// Admitted readout still inside its delay window
    pub pending: Option<SpeechQueueItem>,
    pub armed: Vec<(GestureKind, ArmMode)>,
    pub device: DeviceState,
}

impl EngineSnapshot {
    pub fn speaking_app(&self) -> Option<&str> {
        self.speaking.as_ref().map(|item| item.app_id.as_str())
    }

    pub fn queued_apps(&self) -> Vec<&str> {
        self.queue.iter().map(|item| item.app_id.as_str()).collect()
    }

    pub fn is_armed(&self, kind: GestureKind) -> bool {
        self.armed.iter().any(|(armed, _)| *armed == kind)
    }
}
