//! Speech backend that logs instead of synthesizing
//!
//! Each utterance "plays" for its estimated spoken duration, then reports
//! back through the playback event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::{SpeechBackend, SpeechHandle};
use crate::render::WORDS_PER_SECOND;

const MIN_PLAYBACK: Duration = Duration::from_millis(500);

/// Completion callbacks for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished(SpeechHandle),
    Stopped(SpeechHandle),
}

pub struct LoggingSpeech {
    next: AtomicU64,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    playing: Mutex<HashMap<SpeechHandle, JoinHandle<()>>>,
}

impl LoggingSpeech {
    pub fn new(events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            next: AtomicU64::new(1),
            events,
            playing: Mutex::new(HashMap::new()),
        }
    }

    pub fn estimated_duration(text: &str) -> Duration {
        let words = text.split_whitespace().count() as f32;
        Duration::from_secs_f32(words / WORDS_PER_SECOND).max(MIN_PLAYBACK)
    }
}

impl SpeechBackend for LoggingSpeech {
    fn name(&self) -> &str {
        "log"
    }

    fn speak(&self, text: &str) -> Result<SpeechHandle> {
        let handle = SpeechHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let duration = Self::estimated_duration(text);
        info!(handle = %handle, secs = duration.as_secs_f32(), "🔊 {}", text);

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(PlaybackEvent::Finished(handle));
        });
        if let Ok(mut playing) = self.playing.lock() {
            playing.retain(|_, task| !task.is_finished());
            playing.insert(handle, task);
        }
        Ok(handle)
    }

    fn stop(&self, handle: SpeechHandle) -> Result<()> {
        let task = self
            .playing
            .lock()
            .map_err(|_| anyhow::anyhow!("playback table poisoned"))?
            .remove(&handle);
        if let Some(task) = task {
            task.abort();
        }
        info!(handle = %handle, "🔇 stopped");
        let _ = self.events.send(PlaybackEvent::Stopped(handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_duration() {
        assert_eq!(
            LoggingSpeech::estimated_duration("one two three four five"),
            Duration::from_secs(2)
        );
        assert_eq!(LoggingSpeech::estimated_duration("hi"), MIN_PLAYBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_after_estimate_and_stop_reports() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let speech = LoggingSpeech::new(tx);

        let first = speech.speak("one two three four five").unwrap();
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Finished(first)));

        let second = speech.speak("a much longer sentence that keeps going").unwrap();
        speech.stop(second).unwrap();
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Stopped(second)));
    }
}
