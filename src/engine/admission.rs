//! 准入控制 - 门控、渲染、行为表、延迟朗读
//!
//! | mode      | idle      | busy                              |
//! |-----------|-----------|-----------------------------------|
//! | Interrupt | speak now | preempt                           |
//! | Queue     | speak now | enqueue                           |
//! | Skip      | speak now | drop                              |
//! | Smart     | speak now | priority app: preempt, else queue |
//!
//! 处于延迟等待中的朗读占据下一个朗读位置，因此存在待定朗读时引擎视为忙碌。

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::coordinator::SpeechQueueItem;
use crate::config::{BehaviorMode, PolicyConfig};
use crate::notification::{Fingerprint, NotificationEvent};
use crate::render::render_utterance;
use crate::suppression::{DeviceState, SuppressionReason, SuppressionStore, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SpeakNow,
    Preempt,
    Enqueue,
    Drop,
}

pub fn choose_action(mode: BehaviorMode, busy: bool, priority_app: bool) -> Action {
    if !busy {
        return Action::SpeakNow;
    }
    match mode {
        BehaviorMode::Interrupt => Action::Preempt,
        BehaviorMode::Queue => Action::Enqueue,
        BehaviorMode::Skip => Action::Drop,
        BehaviorMode::Smart if priority_app => Action::Preempt,
        BehaviorMode::Smart => Action::Enqueue,
    }
}

/// Decision for one incoming event
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Suppressed(SuppressionReason),
    Dropped(SpeechQueueItem),
    Enqueue(SpeechQueueItem),
    /// Speak now or preempt, right away
    Execute { action: Action, item: SpeechQueueItem },
    /// Speak now or preempt, once `delay` passes without a cancel
    Delayed {
        action: Action,
        item: SpeechQueueItem,
        delay: Duration,
    },
}

/// Admitted readout inside its delay window
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReadout {
    pub ticket: u64,
    pub action: Action,
    pub item: SpeechQueueItem,
}

#[derive(Debug, Default)]
pub struct AdmissionController {
    pending: Option<PendingReadout>,
    next_ticket: u64,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingReadout> {
        self.pending.as_ref()
    }

    /// Decide what to do with `event` under the `config` snapshot.
    ///
    /// Read-only apart from store pruning; nothing is recorded until the
    /// coordinator actually starts an utterance.
    pub fn admit(
        &self,
        event: &NotificationEvent,
        config: &PolicyConfig,
        device: &DeviceState,
        store: &mut SuppressionStore,
        playback_busy: bool,
        now: Instant,
    ) -> Admission {
        let app_id = event.app_id.as_str();

        if let Some(reason) = device.blocking_reason(&config.honour) {
            info!(app_id = %app_id, reason = %reason, "Notification suppressed");
            return Admission::Suppressed(reason);
        }
        let fingerprint = event.fingerprint();
        if let Verdict::Suppress(reason) = store.check(app_id, fingerprint, config, now) {
            info!(app_id = %app_id, reason = %reason, "Notification suppressed");
            return Admission::Suppressed(reason);
        }

        let item = SpeechQueueItem {
            text: render_utterance(event, config),
            app_id: app_id.to_string(),
            fingerprint,
            enqueued_at: now,
        };

        let busy = playback_busy || self.pending.is_some();
        let action = choose_action(config.behavior_mode, busy, config.is_priority(app_id));
        debug!(
            app_id = %app_id,
            mode = %config.behavior_mode,
            busy,
            ?action,
            "Admission decided"
        );

        match (action, config.readout_delay()) {
            (Action::Drop, _) => Admission::Dropped(item),
            (Action::Enqueue, _) => Admission::Enqueue(item),
            (action, Some(delay)) => Admission::Delayed {
                action,
                item,
                delay,
            },
            (action, None) => Admission::Execute { action, item },
        }
    }

    /// Hold `item` for its delay window. Returns the new ticket and any
    /// readout it superseded.
    pub fn defer(
        &mut self,
        action: Action,
        item: SpeechQueueItem,
    ) -> (u64, Option<PendingReadout>) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let replaced = self.pending.replace(PendingReadout {
            ticket,
            action,
            item,
        });
        (ticket, replaced)
    }

    /// Delay timer `ticket` fired. `None` when that readout was already
    /// cancelled or superseded.
    pub fn take_due(&mut self, ticket: u64) -> Option<PendingReadout> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => self.pending.take(),
            _ => {
                debug!(ticket, "Stale readout timer ignored");
                None
            }
        }
    }

    pub fn cancel(&mut self) -> Option<PendingReadout> {
        self.pending.take()
    }

    pub fn cancel_matching(&mut self, fingerprint: Fingerprint) -> Option<PendingReadout> {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.item.fingerprint == fingerprint)
        {
            self.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppression::RingerMode;

    fn event(app: &str, text: &str) -> NotificationEvent {
        NotificationEvent::builder(app)
            .app_name(app)
            .title("Hi")
            .text(text)
            .build()
    }

    #[test]
    fn test_behavior_table() {
        use Action::*;
        use BehaviorMode::*;

        for mode in [Interrupt, Queue, Skip, Smart] {
            assert_eq!(choose_action(mode, false, false), SpeakNow);
            assert_eq!(choose_action(mode, false, true), SpeakNow);
        }
        assert_eq!(choose_action(Interrupt, true, false), Preempt);
        assert_eq!(choose_action(Queue, true, true), Enqueue);
        assert_eq!(choose_action(Skip, true, true), Drop);
        assert_eq!(choose_action(Smart, true, true), Preempt);
        assert_eq!(choose_action(Smart, true, false), Enqueue);
    }

    #[test]
    fn test_device_gate_runs_first() {
        let controller = AdmissionController::new();
        let mut store = SuppressionStore::new();
        let device = DeviceState {
            ringer: RingerMode::Vibrate,
            ..Default::default()
        };

        let admission = controller.admit(
            &event("chat", "hello"),
            &PolicyConfig::default(),
            &device,
            &mut store,
            false,
            Instant::now(),
        );
        assert_eq!(admission, Admission::Suppressed(SuppressionReason::VibrateMode));
    }

    #[test]
    fn test_delay_applies_to_speak_now_only() {
        let controller = AdmissionController::new();
        let mut store = SuppressionStore::new();
        let config = PolicyConfig {
            delay_before_readout_secs: 2,
            ..Default::default()
        };
        let now = Instant::now();

        match controller.admit(&event("a", "one"), &config, &DeviceState::default(), &mut store, false, now) {
            Admission::Delayed { action, delay, .. } => {
                assert_eq!(action, Action::SpeakNow);
                assert_eq!(delay, Duration::from_secs(2));
            }
            other => panic!("expected delay, got {other:?}"),
        }

        // Smart, busy, non-priority: queued without delay
        let admission =
            controller.admit(&event("b", "two"), &config, &DeviceState::default(), &mut store, true, now);
        assert!(matches!(admission, Admission::Enqueue(_)));
    }

    #[test]
    fn test_pending_readout_counts_as_busy() {
        let mut controller = AdmissionController::new();
        let mut store = SuppressionStore::new();
        let config = PolicyConfig {
            behavior_mode: BehaviorMode::Skip,
            delay_before_readout_secs: 1,
            ..Default::default()
        };
        let now = Instant::now();

        if let Admission::Delayed { action, item, .. } =
            controller.admit(&event("a", "one"), &config, &DeviceState::default(), &mut store, false, now)
        {
            controller.defer(action, item);
        }
        let admission =
            controller.admit(&event("b", "two"), &config, &DeviceState::default(), &mut store, false, now);
        assert!(matches!(admission, Admission::Dropped(_)));
    }

    #[test]
    fn test_superseded_ticket_is_stale() {
        let mut controller = AdmissionController::new();
        let now = Instant::now();
        let item = |app: &str| SpeechQueueItem {
            text: app.to_string(),
            app_id: app.to_string(),
            fingerprint: Fingerprint::of(app, app),
            enqueued_at: now,
        };

        let (first, _) = controller.defer(Action::SpeakNow, item("a"));
        let (second, replaced) = controller.defer(Action::Preempt, item("b"));

        assert_eq!(replaced.map(|p| p.item.app_id), Some("a".to_string()));
        assert!(controller.take_due(first).is_none());
        assert_eq!(controller.take_due(second).map(|p| p.item.app_id), Some("b".to_string()));
        assert!(controller.pending().is_none());
    }

    #[test]
    fn test_cancel_matching_only_removes_same_fingerprint() {
        let mut controller = AdmissionController::new();
        let e = event("a", "one");
        let item = SpeechQueueItem {
            text: "x".into(),
            app_id: "a".into(),
            fingerprint: e.fingerprint(),
            enqueued_at: Instant::now(),
        };
        controller.defer(Action::SpeakNow, item);

        assert!(controller
            .cancel_matching(event("a", "other").fingerprint())
            .is_none());
        assert!(controller.cancel_matching(e.fingerprint()).is_some());
    }
}
