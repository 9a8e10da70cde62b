//! 原始传感器样本与手势触发条件

use serde::{Deserialize, Serialize};

use crate::config::{GestureKind, GestureSettings, WaveConfig};

/// Standard gravity, m/s²
pub const GRAVITY_EARTH: f32 = 9.806_65;

/// Proximity reading reported when an object covers the sensor
pub const PROXIMITY_TOUCHING: f32 = 0.0;

/// One sample from a sensor producer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorSample {
    Acceleration { x: f32, y: f32, z: f32 },
    Proximity { distance: f32 },
    /// Global press action delivered by the accessibility layer
    Press,
}

impl SensorSample {
    pub fn kind(&self) -> GestureKind {
        match self {
            SensorSample::Acceleration { .. } => GestureKind::Shake,
            SensorSample::Proximity { .. } => GestureKind::Wave,
            SensorSample::Press => GestureKind::Press,
        }
    }
}

/// Acceleration beyond gravity, regardless of direction
pub fn shake_magnitude(x: f32, y: f32, z: f32) -> f32 {
    ((x * x + y * y + z * z).sqrt() - GRAVITY_EARTH).abs()
}

pub fn is_shake(x: f32, y: f32, z: f32, threshold: f32) -> bool {
    shake_magnitude(x, y, z) >= threshold
}

pub fn is_wave(distance: f32, wave: &WaveConfig) -> bool {
    if distance == PROXIMITY_TOUCHING {
        return true;
    }
    wave.trigger_distance()
        .map(|limit| distance <= limit)
        .unwrap_or(false)
}

/// Gesture a sample completes under `settings`, if any.
///
/// Arming is not considered here; disabled gestures never trigger.
pub fn detect(sample: &SensorSample, settings: &GestureSettings) -> Option<GestureKind> {
    let kind = sample.kind();
    if !settings.is_active(kind) {
        return None;
    }
    let triggered = match *sample {
        SensorSample::Acceleration { x, y, z } => is_shake(x, y, z, settings.shake.threshold),
        SensorSample::Proximity { distance } => is_wave(distance, &settings.wave),
        SensorSample::Press => true,
    };
    triggered.then_some(kind)
}
