//! 朗读队列与播放协调器
//!
//! 持有唯一的朗读位置及其后的 FIFO 队列。冷却和去重时间戳在朗读开始的
//! 那一刻记录，绝不提前。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::backend::{MediaController, SpeechBackend, SpeechHandle};
use super::outcome::{CancelCause, EngineOutcome, OutcomeSink, Phase};
use crate::config::{DuckFallback, MediaBehavior};
use crate::notification::Fingerprint;
use crate::suppression::SuppressionStore;

/// 为迟到的回调保留的已停止句柄数量
const MAX_ABANDONED: usize = 64;

/// A rendered utterance waiting for, or holding, the speaking slot
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechQueueItem {
    pub text: String,
    pub app_id: String,
    pub fingerprint: Fingerprint,
    pub enqueued_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub item: SpeechQueueItem,
    pub started_at: Instant,
    pub handle: SpeechHandle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EngineState {
    #[default]
    Idle,
    Speaking(Utterance),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaEffect {
    Ducked,
    Lowered,
    Paused,
    Silenced,
}

pub struct PlaybackCoordinator {
    speech: Arc<dyn SpeechBackend>,
    media: Arc<dyn MediaController>,
    outcomes: OutcomeSink,
    state: EngineState,
    queue: VecDeque<SpeechQueueItem>,
    media_effect: Option<MediaEffect>,
    abandoned: VecDeque<SpeechHandle>,
}

impl PlaybackCoordinator {
    pub fn new(
        speech: Arc<dyn SpeechBackend>,
        media: Arc<dyn MediaController>,
        outcomes: OutcomeSink,
    ) -> Self {
        Self {
            speech,
            media,
            outcomes,
            state: EngineState::Idle,
            queue: VecDeque::new(),
            media_effect: None,
            abandoned: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, EngineState::Idle)
    }

    /// Speaking, or items waiting
    pub fn is_busy(&self) -> bool {
        !self.is_idle() || !self.queue.is_empty()
    }

    pub fn phase(&self) -> Phase {
        match (&self.state, self.queue.is_empty()) {
            (EngineState::Idle, _) => Phase::Idle,
            (EngineState::Speaking(_), true) => Phase::Speaking,
            (EngineState::Speaking(_), false) => Phase::Draining,
        }
    }

    pub fn current(&self) -> Option<&Utterance> {
        match &self.state {
            EngineState::Speaking(utterance) => Some(utterance),
            EngineState::Idle => None,
        }
    }

    pub fn current_handle(&self) -> Option<SpeechHandle> {
        self.current().map(|u| u.handle)
    }

    pub fn queue(&self) -> impl Iterator<Item = &SpeechQueueItem> {
        self.queue.iter()
    }

    /// Still waiting for a `stopped` confirmation for `handle`
    pub fn awaiting_stop(&self, handle: SpeechHandle) -> bool {
        self.abandoned.contains(&handle)
    }

    /// 加入 FIFO 队列，不会自行开始播放
    pub fn enqueue(&mut self, item: SpeechQueueItem) -> usize {
        debug!(app_id = %item.app_id, "Queued utterance");
        self.queue.push_back(item);
        self.queue.len()
    }

    /// Start `item` now. Requires `Idle`; otherwise the item goes to the
    /// front of the queue. Returns false if nothing started.
    pub fn start_speaking(
        &mut self,
        item: SpeechQueueItem,
        media: &MediaBehavior,
        store: &mut SuppressionStore,
        now: Instant,
    ) -> bool {
        if !self.is_idle() {
            warn!(app_id = %item.app_id, "Start requested while speaking, queueing at front");
            self.queue.push_front(item);
            return false;
        }

        store.record_spoken(&item.app_id, item.fingerprint, now);
        self.apply_media(media);

        match self.speech.speak(&item.text) {
            Ok(handle) => {
                info!(
                    app_id = %item.app_id,
                    handle = %handle,
                    backend = self.speech.name(),
                    "Speaking"
                );
                self.outcomes.emit(EngineOutcome::Spoken {
                    app_id: item.app_id.clone(),
                    text: item.text.clone(),
                });
                self.state = EngineState::Speaking(Utterance {
                    item,
                    started_at: now,
                    handle,
                });
                true
            }
            Err(e) => {
                warn!(app_id = %item.app_id, error = %e, "Speech backend failed, skipping utterance");
                false
            }
        }
    }

    /// Start queued items until one plays; restore media when nothing does
    pub fn advance(&mut self, media: &MediaBehavior, store: &mut SuppressionStore, now: Instant) {
        while self.is_idle() {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            self.start_speaking(next, media, store, now);
        }
        if self.is_idle() {
            self.restore_media();
        }
    }

    /// Backend reported `handle` done. Returns true if it was the current
    /// utterance; late callbacks for stopped handles are ignored.
    ///
    /// Leaves the coordinator idle. The caller decides whether the queue may
    /// advance, since a pending readout holds the next slot.
    pub fn on_playback_finished(&mut self, handle: SpeechHandle) -> bool {
        if self.current_handle() == Some(handle) {
            if let EngineState::Speaking(done) = std::mem::take(&mut self.state) {
                debug!(app_id = %done.item.app_id, handle = %handle, "Utterance finished");
                self.outcomes.emit(EngineOutcome::Finished {
                    app_id: done.item.app_id,
                });
            }
            return true;
        }

        if let Some(pos) = self.abandoned.iter().position(|h| *h == handle) {
            self.abandoned.remove(pos);
            debug!(handle = %handle, "Late callback for stopped utterance ignored");
        } else {
            debug!(handle = %handle, "Callback for unknown utterance ignored");
        }
        false
    }

    /// Stop the current utterance (not requeued) and start `item` in its place.
    ///
    /// Returns the stopped handle so the caller can watch for confirmation.
    pub fn preempt(
        &mut self,
        item: SpeechQueueItem,
        media: &MediaBehavior,
        store: &mut SuppressionStore,
        now: Instant,
    ) -> Option<SpeechHandle> {
        let stopped = self.stop_current();
        if let Some((_, ref stopped_item)) = stopped {
            info!(
                stopped = %stopped_item.app_id,
                by = %item.app_id,
                "Preempting current utterance"
            );
            self.outcomes.emit(EngineOutcome::Preempted {
                stopped_app_id: stopped_item.app_id.clone(),
                by_app_id: item.app_id.clone(),
            });
        }
        if !self.start_speaking(item, media, store, now) {
            self.advance(media, store, now);
        }
        stopped.map(|(handle, _)| handle)
    }

    /// 停止朗读并清空队列，恢复媒体
    pub fn cancel_all(&mut self, cause: CancelCause) -> Option<SpeechHandle> {
        let stopped = self.stop_current();
        let cleared = self.queue.len();
        self.queue.clear();
        self.restore_media();

        if stopped.is_some() || cleared > 0 {
            info!(cause = %cause, cleared, "Cancelled all speech");
            self.outcomes.emit(EngineOutcome::Cancelled {
                cause,
                stopped_app_id: stopped.as_ref().map(|(_, item)| item.app_id.clone()),
                cleared,
            });
        }
        stopped.map(|(handle, _)| handle)
    }

    /// Remove every trace of `fingerprint`: queued copies and, if it is the
    /// one speaking, the current utterance. Does not advance the queue.
    pub fn remove_fingerprint(&mut self, fingerprint: Fingerprint) -> Option<SpeechHandle> {
        let before = self.queue.len();
        self.queue.retain(|item| item.fingerprint != fingerprint);
        let cleared = before - self.queue.len();

        let speaking_it = self
            .current()
            .is_some_and(|u| u.item.fingerprint == fingerprint);
        let stopped = if speaking_it { self.stop_current() } else { None };

        if stopped.is_some() || cleared > 0 {
            info!(fingerprint = %fingerprint, cleared, "Removed dismissed notification");
            self.outcomes.emit(EngineOutcome::Cancelled {
                cause: CancelCause::Dismissed,
                stopped_app_id: stopped.as_ref().map(|(_, item)| item.app_id.clone()),
                cleared,
            });
        }
        stopped.map(|(handle, _)| handle)
    }

    fn stop_current(&mut self) -> Option<(SpeechHandle, SpeechQueueItem)> {
        let EngineState::Speaking(utterance) = std::mem::take(&mut self.state) else {
            return None;
        };
        let handle = utterance.handle;
        if let Err(e) = self.speech.stop(handle) {
            warn!(handle = %handle, error = %e, "Speech backend failed to stop");
        }
        if self.abandoned.len() == MAX_ABANDONED {
            self.abandoned.pop_front();
        }
        self.abandoned.push_back(handle);
        Some((handle, utterance.item))
    }

    fn apply_media(&mut self, behavior: &MediaBehavior) {
        // Carried over from the previous utterance
        if self.media_effect.is_some() {
            return;
        }
        let result = match *behavior {
            MediaBehavior::Ignore => return,
            MediaBehavior::Pause => self.media.pause().map(|_| MediaEffect::Paused),
            MediaBehavior::Silence => self.media.silence().map(|_| MediaEffect::Silenced),
            MediaBehavior::Duck {
                volume_percent,
                fallback,
            } => {
                let percent = u8::try_from(volume_percent.clamp(0, 100)).unwrap_or(100);
                match self.media.duck(percent) {
                    Ok(true) => Ok(MediaEffect::Ducked),
                    Ok(false) => match fallback {
                        DuckFallback::Manual => self
                            .media
                            .lower_volume(percent)
                            .map(|_| MediaEffect::Lowered),
                        DuckFallback::Pause => self.media.pause().map(|_| MediaEffect::Paused),
                    },
                    Err(e) => Err(e),
                }
            }
        };
        match result {
            Ok(effect) => {
                debug!(?effect, "Media effect applied");
                self.media_effect = Some(effect);
            }
            Err(e) => warn!(error = %e, "Media controller failed, speaking over media"),
        }
    }

    fn restore_media(&mut self) {
        let Some(effect) = self.media_effect.take() else {
            return;
        };
        match self.media.restore() {
            Ok(()) => debug!(?effect, "Media restored"),
            Err(e) => warn!(?effect, error = %e, "Media controller failed to restore"),
        }
    }
}
