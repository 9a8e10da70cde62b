//! Recording collaborators shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use notification_readout::config::GestureKind;
use notification_readout::engine::{Collaborators, MediaController, SensorControl, SpeechBackend, SpeechHandle};
use notification_readout::{EngineOutcome, NotificationEvent};
use tokio::sync::broadcast;

#[derive(Default)]
pub struct RecordingSpeech {
    next: AtomicU64,
    pub spoken: Mutex<Vec<(SpeechHandle, String)>>,
    pub stopped: Mutex<Vec<SpeechHandle>>,
}

impl RecordingSpeech {
    pub fn texts(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn last_handle(&self) -> SpeechHandle {
        self.spoken.lock().unwrap().last().expect("nothing spoken").0
    }

    pub fn stopped(&self) -> Vec<SpeechHandle> {
        self.stopped.lock().unwrap().clone()
    }
}

impl SpeechBackend for RecordingSpeech {
    fn name(&self) -> &str {
        "recording"
    }

    fn speak(&self, text: &str) -> anyhow::Result<SpeechHandle> {
        let handle = SpeechHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.spoken.lock().unwrap().push((handle, text.to_string()));
        Ok(handle)
    }

    fn stop(&self, handle: SpeechHandle) -> anyhow::Result<()> {
        self.stopped.lock().unwrap().push(handle);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMedia {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingMedia {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl MediaController for RecordingMedia {
    fn duck(&self, volume_percent: u8) -> anyhow::Result<bool> {
        self.record(format!("duck {volume_percent}"));
        Ok(true)
    }

    fn lower_volume(&self, volume_percent: u8) -> anyhow::Result<()> {
        self.record(format!("lower {volume_percent}"));
        Ok(())
    }

    fn pause(&self) -> anyhow::Result<()> {
        self.record("pause");
        Ok(())
    }

    fn silence(&self) -> anyhow::Result<()> {
        self.record("silence");
        Ok(())
    }

    fn restore(&self) -> anyhow::Result<()> {
        self.record("restore");
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSensors {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingSensors {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SensorControl for RecordingSensors {
    fn acquire(&self, kind: GestureKind) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("acquire {kind}"));
        Ok(())
    }

    fn release(&self, kind: GestureKind) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(format!("release {kind}"));
        Ok(())
    }
}

pub struct Harness {
    pub speech: Arc<RecordingSpeech>,
    pub media: Arc<RecordingMedia>,
    pub sensors: Arc<RecordingSensors>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            speech: Arc::new(RecordingSpeech::default()),
            media: Arc::new(RecordingMedia::default()),
            sensors: Arc::new(RecordingSensors::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.speech.clone())
            .with_media(self.media.clone())
            .with_sensors(self.sensors.clone())
    }
}

pub fn event(app_id: &str, text: &str) -> NotificationEvent {
    NotificationEvent::builder(app_id)
        .app_name(app_id)
        .text(text)
        .build()
}

/// Everything published so far
pub fn drain(rx: &mut broadcast::Receiver<EngineOutcome>) -> Vec<EngineOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(outcome) = rx.try_recv() {
        outcomes.push(outcome);
    }
    outcomes
}
