//! JSON-lines replay scripts for `readout run`
//!
//! One step per line; blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"type": "notify", "app_id": "com.chat", "title": "Bob", "text": "Lunch?"}
//! {"type": "wait", "ms": 1500}
//! {"type": "sensor", "sample": {"sensor": "acceleration", "x": 25.0, "y": 0.0, "z": 9.8}}
//! {"type": "dismiss", "app_id": "com.chat", "title": "Bob", "text": "Lunch?"}
//! ```

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::GestureKind;
use crate::gesture::SensorSample;
use crate::notification::{Fingerprint, NotificationEvent};
use crate::suppression::DeviceState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    Notify(NotificationEvent),
    /// Dismissal of the notification with this app id and content
    Dismiss {
        app_id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        text: String,
    },
    Sensor {
        sample: SensorSample,
    },
    Device(DeviceState),
    Wait {
        ms: u64,
    },
    GestureTest {
        gesture: GestureKind,
    },
    Cancel,
    Snapshot,
}

impl ScriptStep {
    /// Fingerprint a `dismiss` step refers to
    pub fn dismissed_fingerprint(app_id: &str, title: &str, text: &str) -> Fingerprint {
        NotificationEvent::builder(app_id)
            .title(title)
            .text(text)
            .build()
            .fingerprint()
    }

    pub fn wait_duration(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }
}

pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read script line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: ScriptStep = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid script step on line {}", index + 1))?;
        steps.push(step);
    }
    Ok(steps)
}
