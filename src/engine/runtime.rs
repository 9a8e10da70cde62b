//! 引擎任务
//!
//! 所有输入 (通知、关闭、传感器样本、播放回调、定时器触发、配置替换)
//! 都是发给同一个任务的消息，严格逐条处理。其他代码不接触引擎状态。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::admission::{Action, Admission, AdmissionController, PendingReadout};
use super::backend::{AlwaysOnSensors, MediaController, NoMedia, SensorControl, SpeechBackend, SpeechHandle};
use super::coordinator::{PlaybackCoordinator, SpeechQueueItem};
use super::outcome::{CancelCause, EngineOutcome, EngineSnapshot, OutcomeSink};
use crate::config::{ConfigStore, GestureKind, PolicyConfig};
use crate::error::{ReadoutError, Result};
use crate::gesture::{ArmMode, ArmTicket, GestureArming, SensorSample};
use crate::notification::{Fingerprint, NotificationEvent};
use crate::suppression::{DeviceState, SuppressionStore};

/// How long a stopped utterance may go without a `stopped` callback
pub const STOP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

const COMMAND_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
enum EngineCommand {
    Notify(Box<NotificationEvent>),
    Dismissed(Fingerprint),
    Sensor(SensorSample),
    PlaybackFinished(SpeechHandle),
    PlaybackStopped(SpeechHandle),
    DeviceState(DeviceState),
    StartGestureTest {
        kind: GestureKind,
        reply: oneshot::Sender<Result<()>>,
    },
    StopGestureTest(GestureKind),
    CancelAll,
    Snapshot(oneshot::Sender<EngineSnapshot>),
    /// Fired by the engine's own sleep tasks
    Timer(TimerEvent),
}

#[derive(Debug, Clone, Copy)]
enum TimerEvent {
    Readout { ticket: u64 },
    Disarm { kind: GestureKind, generation: u64 },
    StopConfirm { handle: SpeechHandle },
}

/// External collaborators the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub speech: Arc<dyn SpeechBackend>,
    pub media: Arc<dyn MediaController>,
    pub sensors: Arc<dyn SensorControl>,
}

impl Collaborators {
    /// Speech only: no media session, sensors always on
    pub fn new(speech: Arc<dyn SpeechBackend>) -> Self {
        Self {
            speech,
            media: Arc::new(NoMedia),
            sensors: Arc::new(AlwaysOnSensors),
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaController>) -> Self {
        self.media = media;
        self
    }

    pub fn with_sensors(mut self, sensors: Arc<dyn SensorControl>) -> Self {
        self.sensors = sensors;
        self
    }
}

/// Cloneable front door to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    outcomes: OutcomeSink,
    shutdown: CancellationToken,
}

impl EngineHandle {
    async fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ReadoutError::EngineClosed)
    }

    pub async fn notify(&self, event: NotificationEvent) -> Result<()> {
        self.send(EngineCommand::Notify(Box::new(event))).await
    }

    /// The user dismissed the notification with this fingerprint
    pub async fn dismissed(&self, fingerprint: Fingerprint) -> Result<()> {
        self.send(EngineCommand::Dismissed(fingerprint)).await
    }

    pub async fn sensor(&self, sample: SensorSample) -> Result<()> {
        self.send(EngineCommand::Sensor(sample)).await
    }

    /// Non-blocking variant for sensor callbacks outside the runtime.
    /// A full channel drops the sample.
    pub fn try_sensor(&self, sample: SensorSample) -> Result<()> {
        match self.tx.try_send(EngineCommand::Sensor(sample)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Engine busy, sensor sample dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ReadoutError::EngineClosed),
        }
    }

    pub async fn playback_finished(&self, handle: SpeechHandle) -> Result<()> {
        self.send(EngineCommand::PlaybackFinished(handle)).await
    }

    pub async fn playback_stopped(&self, handle: SpeechHandle) -> Result<()> {
        self.send(EngineCommand::PlaybackStopped(handle)).await
    }

    pub async fn set_device_state(&self, state: DeviceState) -> Result<()> {
        self.send(EngineCommand::DeviceState(state)).await
    }

    /// Arm `kind` for trying it out; triggers report `GestureTested` and
    /// never cancel speech.
    pub async fn start_gesture_test(&self, kind: GestureKind) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::StartGestureTest { kind, reply }).await?;
        rx.await.map_err(|_| ReadoutError::EngineClosed)?
    }

    pub async fn stop_gesture_test(&self, kind: GestureKind) -> Result<()> {
        self.send(EngineCommand::StopGestureTest(kind)).await
    }

    /// Stop speaking, clear the queue and any pending readout
    pub async fn cancel_all(&self) -> Result<()> {
        self.send(EngineCommand::CancelAll).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| ReadoutError::EngineClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineOutcome> {
        self.outcomes.subscribe()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn now() -> Instant {
    // tokio's clock, so paused test time applies
    tokio::time::Instant::now().into_std()
}

pub struct Engine {
    config: Arc<PolicyConfig>,
    device: DeviceState,
    store: SuppressionStore,
    admission: AdmissionController,
    coordinator: PlaybackCoordinator,
    gestures: GestureArming,
    sensors: Arc<dyn SensorControl>,
    outcomes: OutcomeSink,
    /// Weak so that dropping every handle still ends the task
    timer_tx: mpsc::WeakSender<EngineCommand>,
    readout_timer: Option<JoinHandle<()>>,
    disarm_timers: HashMap<GestureKind, JoinHandle<()>>,
    /// Utterance and pending readout the gesture arming was last synced to
    observed: (Option<SpeechHandle>, Option<u64>),
}

impl Engine {
    /// Start the engine task on the current runtime
    pub fn spawn(config: &ConfigStore, collaborators: Collaborators) -> (EngineHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let mut config_rx = config.subscribe();
        let initial = config_rx.borrow_and_update().clone();
        let outcomes = OutcomeSink::new();
        let shutdown = CancellationToken::new();

        let engine = Engine {
            config: initial,
            device: DeviceState::default(),
            store: SuppressionStore::new(),
            admission: AdmissionController::new(),
            coordinator: PlaybackCoordinator::new(
                collaborators.speech,
                collaborators.media,
                outcomes.clone(),
            ),
            gestures: GestureArming::new(),
            sensors: collaborators.sensors,
            outcomes: outcomes.clone(),
            timer_tx: tx.downgrade(),
            readout_timer: None,
            disarm_timers: HashMap::new(),
            observed: (None, None),
        };

        let task = tokio::spawn(engine.run(commands, config_rx, shutdown.clone()));
        let handle = EngineHandle {
            tx,
            outcomes,
            shutdown,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut config_rx: watch::Receiver<Arc<PolicyConfig>>,
        shutdown: CancellationToken,
    ) {
        info!("Readout engine started");
        let mut config_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }
                changed = config_rx.changed(), if config_open => match changed {
                    Ok(()) => {
                        self.config = config_rx.borrow_and_update().clone();
                        info!(mode = %self.config.behavior_mode, "Policy config swapped");
                    }
                    Err(_) => {
                        debug!("Config store dropped, keeping last snapshot");
                        config_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All engine handles dropped");
                        break;
                    }
                },
            }
        }

        self.stop();
        info!("Readout engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        let now = now();
        match command {
            EngineCommand::Notify(event) => self.on_notification(&event, now),
            EngineCommand::Dismissed(fingerprint) => self.on_dismissed(fingerprint, now),
            EngineCommand::Sensor(sample) => self.on_sensor(&sample),
            EngineCommand::PlaybackFinished(handle) | EngineCommand::PlaybackStopped(handle) => {
                if self.coordinator.on_playback_finished(handle) {
                    self.resume_if_stalled();
                }
            }
            EngineCommand::DeviceState(state) => {
                info!(
                    dnd = state.do_not_disturb,
                    ringer = ?state.ringer,
                    call = state.call_active,
                    "Device state updated"
                );
                self.device = state;
            }
            EngineCommand::StartGestureTest { kind, reply } => {
                let result = self.start_gesture_test(kind, now);
                let _ = reply.send(result);
            }
            EngineCommand::StopGestureTest(kind) => {
                if self.gestures.armed().contains(&(kind, ArmMode::Test)) {
                    self.gestures.disarm(kind);
                    self.on_disarmed(kind);
                }
            }
            EngineCommand::CancelAll => self.cancel_everything(CancelCause::Requested),
            EngineCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            EngineCommand::Timer(timer) => {
                self.handle_timer(timer);
                return;
            }
        }
        self.sync_gestures(now);
    }

    fn handle_timer(&mut self, timer: TimerEvent) {
        let now = now();
        match timer {
            TimerEvent::Readout { ticket } => {
                if let Some(pending) = self.admission.take_due(ticket) {
                    self.readout_timer = None;
                    debug!(app_id = %pending.item.app_id, "Readout delay elapsed");
                    self.execute(pending.action, pending.item, now);
                }
            }
            TimerEvent::Disarm { kind, generation } => {
                if self.gestures.expire(kind, generation) {
                    self.disarm_timers.remove(&kind);
                    self.on_disarmed(kind);
                }
            }
            TimerEvent::StopConfirm { handle } => {
                if self.coordinator.awaiting_stop(handle) {
                    warn!(
                        handle = %handle,
                        wait_secs = STOP_CONFIRM_TIMEOUT.as_secs(),
                        "Speech backend unresponsive: stop not confirmed"
                    );
                }
            }
        }
        self.sync_gestures(now);
    }

    fn on_notification(&mut self, event: &NotificationEvent, now: Instant) {
        // Snapshot for the whole decision
        let config = Arc::clone(&self.config);
        let admission = self.admission.admit(
            event,
            &config,
            &self.device,
            &mut self.store,
            self.coordinator.is_busy(),
            now,
        );

        match admission {
            Admission::Suppressed(reason) => self.outcomes.emit(EngineOutcome::Suppressed {
                app_id: event.app_id.clone(),
                reason,
            }),
            Admission::Dropped(item) => {
                info!(app_id = %item.app_id, mode = %config.behavior_mode, "Busy, notification dropped");
                self.outcomes.emit(EngineOutcome::Dropped {
                    app_id: item.app_id,
                    mode: config.behavior_mode,
                });
            }
            Admission::Enqueue(item) => self.enqueue(item),
            Admission::Execute { action, item } => self.execute(action, item, now),
            Admission::Delayed {
                action,
                item,
                delay,
            } => {
                let app_id = item.app_id.clone();
                let (ticket, replaced) = self.admission.defer(action, item);
                if let Some(old) = replaced {
                    self.emit_delay_cancelled(old, CancelCause::Superseded);
                }
                if let Some(timer) = self.readout_timer.take() {
                    timer.abort();
                }
                self.readout_timer = Some(self.schedule(delay, TimerEvent::Readout { ticket }));
                info!(app_id = %app_id, delay_secs = delay.as_secs(), "Readout delayed");
                self.outcomes.emit(EngineOutcome::Delayed { app_id, delay });
            }
        }
    }

    fn execute(&mut self, action: Action, item: SpeechQueueItem, now: Instant) {
        let media = self.config.media_behavior;
        match action {
            Action::Preempt => {
                // Preemption also takes the pending slot
                self.cancel_pending(CancelCause::Superseded);
                if let Some(stopped) =
                    self.coordinator
                        .preempt(item, &media, &mut self.store, now)
                {
                    self.watch_stop(stopped);
                }
            }
            Action::SpeakNow if self.coordinator.is_idle() => {
                if !self
                    .coordinator
                    .start_speaking(item, &media, &mut self.store, now)
                {
                    self.coordinator.advance(&media, &mut self.store, now);
                }
            }
            Action::SpeakNow | Action::Enqueue => self.enqueue(item),
            Action::Drop => {}
        }
    }

    fn enqueue(&mut self, item: SpeechQueueItem) {
        let app_id = item.app_id.clone();
        let position = self.coordinator.enqueue(item);
        self.outcomes.emit(EngineOutcome::Queued { app_id, position });
        self.resume_if_stalled();
    }

    fn on_dismissed(&mut self, fingerprint: Fingerprint, now: Instant) {
        if self.config.dismissal_memory_enabled {
            self.store.record_dismissed(fingerprint, now);
        }
        if let Some(pending) = self.admission.cancel_matching(fingerprint) {
            if let Some(timer) = self.readout_timer.take() {
                timer.abort();
            }
            self.emit_delay_cancelled(pending, CancelCause::Dismissed);
        }
        if let Some(stopped) = self.coordinator.remove_fingerprint(fingerprint) {
            self.watch_stop(stopped);
        }
        self.resume_if_stalled();
    }

    fn on_sensor(&mut self, sample: &SensorSample) {
        let Some(trigger) = self.gestures.on_sample(sample, &self.config.gestures) else {
            return;
        };
        match trigger.mode {
            ArmMode::Test => {
                info!(gesture = %trigger.kind, "Gesture test triggered");
                self.outcomes.emit(EngineOutcome::GestureTested(trigger.kind));
            }
            ArmMode::Playback => {
                info!(gesture = %trigger.kind, "Gesture cancel");
                self.outcomes
                    .emit(EngineOutcome::GestureTriggered(trigger.kind));
                self.cancel_everything(CancelCause::Gesture(trigger.kind));
            }
        }
    }

    fn start_gesture_test(&mut self, kind: GestureKind, now: Instant) -> Result<()> {
        let settings = &self.config.gestures;
        if kind == GestureKind::Wave && !settings.wave.is_calibrated() {
            return Err(ReadoutError::CalibrationMissing(kind));
        }
        if !settings.is_active(kind) {
            return Err(ReadoutError::GestureInactive(kind));
        }
        let ticket = self
            .gestures
            .arm(kind, ArmMode::Test, settings.timeout(kind), now);
        info!(gesture = %kind, "Gesture test started");
        self.on_armed(ticket);
        Ok(())
    }

    fn cancel_pending(&mut self, cause: CancelCause) {
        if let Some(pending) = self.admission.cancel() {
            if let Some(timer) = self.readout_timer.take() {
                timer.abort();
            }
            self.emit_delay_cancelled(pending, cause);
        }
    }

    fn cancel_everything(&mut self, cause: CancelCause) {
        self.cancel_pending(cause);
        if let Some(stopped) = self.coordinator.cancel_all(cause) {
            self.watch_stop(stopped);
        }
    }

    fn emit_delay_cancelled(&self, pending: PendingReadout, cause: CancelCause) {
        info!(app_id = %pending.item.app_id, cause = %cause, "Delayed readout discarded");
        self.outcomes.emit(EngineOutcome::DelayCancelled {
            app_id: pending.item.app_id,
            cause,
        });
    }

    /// Queued items only wait behind speech or a pending readout
    fn resume_if_stalled(&mut self) {
        if self.coordinator.is_idle() && self.admission.pending().is_none() {
            let media = self.config.media_behavior;
            self.coordinator.advance(&media, &mut self.store, now());
        }
    }

    /// Arm on every new utterance or pending readout, disarm playback
    /// gestures once neither exists
    fn sync_gestures(&mut self, now: Instant) {
        let current = (
            self.coordinator.current_handle(),
            self.admission.pending().map(|p| p.ticket),
        );
        if current == self.observed {
            return;
        }
        self.observed = current;

        if current.0.is_some() || current.1.is_some() {
            let tickets = self.gestures.arm_for_playback(&self.config.gestures, now);
            for ticket in tickets {
                self.on_armed(ticket);
            }
        } else {
            for kind in self.gestures.disarm_playback() {
                self.on_disarmed(kind);
            }
        }
    }

    fn on_armed(&mut self, ticket: ArmTicket) {
        if ticket.acquire_sensor {
            if let Err(e) = self.sensors.acquire(ticket.kind) {
                warn!(gesture = %ticket.kind, error = %e, "Failed to acquire sensor");
            }
        }
        if let Some(old) = self.disarm_timers.remove(&ticket.kind) {
            old.abort();
        }
        if let Some(timeout) = ticket.timeout {
            let timer = self.schedule(
                timeout,
                TimerEvent::Disarm {
                    kind: ticket.kind,
                    generation: ticket.generation,
                },
            );
            self.disarm_timers.insert(ticket.kind, timer);
        }
    }

    fn on_disarmed(&mut self, kind: GestureKind) {
        if let Some(timer) = self.disarm_timers.remove(&kind) {
            timer.abort();
        }
        if let Err(e) = self.sensors.release(kind) {
            warn!(gesture = %kind, error = %e, "Failed to release sensor");
        }
        debug!(gesture = %kind, "Gesture disarmed, sensor released");
        self.outcomes.emit(EngineOutcome::GestureDisarmed(kind));
    }

    fn watch_stop(&self, handle: SpeechHandle) {
        // Fire and forget; the check happens when it fires
        self.schedule(STOP_CONFIRM_TIMEOUT, TimerEvent::StopConfirm { handle });
    }

    fn schedule(&self, delay: Duration, event: TimerEvent) -> JoinHandle<()> {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Queued behind commands that arrived first
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(EngineCommand::Timer(event)).await;
            }
        })
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.coordinator.phase(),
            speaking: self.coordinator.current().map(|u| u.item.clone()),
            queue: self.coordinator.queue().cloned().collect(),
            pending: self.admission.pending().map(|p| p.item.clone()),
            armed: self.gestures.armed(),
            device: self.device,
        }
    }

    fn stop(&mut self) {
        self.cancel_everything(CancelCause::Shutdown);
        for (_, timer) in self.disarm_timers.drain() {
            timer.abort();
        }
        for kind in self.gestures.disarm_all() {
            if let Err(e) = self.sensors.release(kind) {
                warn!(gesture = %kind, error = %e, "Failed to release sensor");
            }
        }
    }
}
