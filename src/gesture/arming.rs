//! 手势布防状态
//!
//! `Disarmed -> Armed -> (trigger) -> Armed | Disarmed`。每次布防分配新的
//! generation；自动解除定时器只有在 generation 仍匹配时才生效，
//! 早先布防遗留的定时器不会产生任何效果。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::detector::{detect, SensorSample};
use crate::config::{GestureKind, GestureSettings, GestureTimeout};

/// Why a gesture is listening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Armed because an utterance started; a trigger cancels playback
    Playback,
    /// Armed from settings to try the gesture out; a trigger only reports
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Disarmed,
    Armed {
        armed_at: Instant,
        generation: u64,
        mode: ArmMode,
    },
}

/// Result of arming one gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmTicket {
    pub kind: GestureKind,
    pub generation: u64,
    /// When to self-disarm; `None` when the timeout is disabled
    pub timeout: Option<Duration>,
    /// The gesture was disarmed before, so its sensor must be acquired
    pub acquire_sensor: bool,
}

/// A completed gesture on an armed kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTrigger {
    pub kind: GestureKind,
    pub mode: ArmMode,
}

#[derive(Debug, Default)]
pub struct GestureArming {
    states: HashMap<GestureKind, ArmState>,
    next_generation: u64,
}

impl GestureArming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: GestureKind) -> ArmState {
        self.states.get(&kind).copied().unwrap_or(ArmState::Disarmed)
    }

    pub fn is_armed(&self, kind: GestureKind) -> bool {
        matches!(self.state(kind), ArmState::Armed { .. })
    }

    /// Armed kinds in `GestureKind::ALL` order
    pub fn armed(&self) -> Vec<(GestureKind, ArmMode)> {
        GestureKind::ALL
            .into_iter()
            .filter_map(|kind| match self.state(kind) {
                ArmState::Armed { mode, .. } => Some((kind, mode)),
                ArmState::Disarmed => None,
            })
            .collect()
    }

    /// Arm (or re-arm) `kind`. Re-arming restarts the self-disarm window.
    pub fn arm(
        &mut self,
        kind: GestureKind,
        mode: ArmMode,
        timeout: GestureTimeout,
        now: Instant,
    ) -> ArmTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let previous = self.states.insert(
            kind,
            ArmState::Armed {
                armed_at: now,
                generation,
                mode,
            },
        );
        let acquire_sensor = !matches!(previous, Some(ArmState::Armed { .. }));
        debug!(gesture = %kind, ?mode, generation, "Gesture armed");
        ArmTicket {
            kind,
            generation,
            timeout: timeout.duration(),
            acquire_sensor,
        }
    }

    /// Arm every active gesture for a starting utterance.
    ///
    /// Kinds currently armed for a test keep their test arming.
    pub fn arm_for_playback(&mut self, settings: &GestureSettings, now: Instant) -> Vec<ArmTicket> {
        let kinds: Vec<GestureKind> = GestureKind::ALL
            .into_iter()
            .filter(|kind| settings.is_active(*kind))
            .filter(|kind| {
                !matches!(
                    self.state(*kind),
                    ArmState::Armed {
                        mode: ArmMode::Test,
                        ..
                    }
                )
            })
            .collect();
        kinds
            .into_iter()
            .map(|kind| self.arm(kind, ArmMode::Playback, settings.timeout(kind), now))
            .collect()
    }

    /// Self-disarm timer fired. Returns true if `kind` was disarmed by it.
    pub fn expire(&mut self, kind: GestureKind, generation: u64) -> bool {
        match self.state(kind) {
            ArmState::Armed {
                generation: current,
                ..
            } if current == generation => {
                self.states.insert(kind, ArmState::Disarmed);
                info!(gesture = %kind, "Gesture self-disarmed after timeout");
                true
            }
            _ => {
                debug!(gesture = %kind, generation, "Stale disarm timer ignored");
                false
            }
        }
    }

    /// Returns true if `kind` was armed
    pub fn disarm(&mut self, kind: GestureKind) -> bool {
        let was_armed = self.is_armed(kind);
        self.states.insert(kind, ArmState::Disarmed);
        was_armed
    }

    /// Disarm kinds armed for playback; returns the kinds disarmed
    pub fn disarm_playback(&mut self) -> Vec<GestureKind> {
        let kinds: Vec<GestureKind> = self
            .armed()
            .into_iter()
            .filter(|(_, mode)| *mode == ArmMode::Playback)
            .map(|(kind, _)| kind)
            .collect();
        for kind in &kinds {
            self.states.insert(*kind, ArmState::Disarmed);
        }
        kinds
    }

    /// Disarm everything; returns the kinds that were armed
    pub fn disarm_all(&mut self) -> Vec<GestureKind> {
        let kinds: Vec<GestureKind> = self.armed().into_iter().map(|(kind, _)| kind).collect();
        self.states.clear();
        kinds
    }

    /// Feed one sample. Only armed, active gestures can trigger.
    pub fn on_sample(
        &self,
        sample: &SensorSample,
        settings: &GestureSettings,
    ) -> Option<GestureTrigger> {
        let kind = detect(sample, settings)?;
        match self.state(kind) {
            ArmState::Armed { mode, .. } => Some(GestureTrigger { kind, mode }),
            ArmState::Disarmed => {
                debug!(gesture = %kind, "Gesture detected while disarmed, ignoring");
                None
            }
        }
    }
}
