//! 协作方接口 - 语音合成、媒体会话、传感器订阅
//!
//! 实现必须快速返回。音频播放在引擎之外进行，完成后通过
//! `EngineHandle::playback_finished` 或 `EngineHandle::playback_stopped`
//! 携带 `speak` 返回的句柄回报。

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::GestureKind;

/// Opaque id of one synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeechHandle(pub u64);

impl fmt::Display for SpeechHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Text-to-speech backend
pub trait SpeechBackend: Send + Sync {
    /// Backend name (for logs)
    fn name(&self) -> &str;

    /// Start speaking `text`; returns immediately
    fn speak(&self, text: &str) -> Result<SpeechHandle>;

    /// Ask the backend to stop `handle`. Best effort; a `stopped` callback
    /// is expected once it actually stopped.
    fn stop(&self, handle: SpeechHandle) -> Result<()>;
}

/// Background media session control
pub trait MediaController: Send + Sync {
    /// Lower other audio to `volume_percent`. `Ok(false)` when the platform
    /// cannot duck, so the configured fallback applies.
    fn duck(&self, volume_percent: u8) -> Result<bool>;

    /// Manually lower the media stream volume to `volume_percent`
    fn lower_volume(&self, volume_percent: u8) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn silence(&self) -> Result<()>;

    /// Undo whatever duck / lower / pause / silence was applied
    fn restore(&self) -> Result<()>;
}

/// Turns sensor producers on and off
pub trait SensorControl: Send + Sync {
    fn acquire(&self, kind: GestureKind) -> Result<()>;

    fn release(&self, kind: GestureKind) -> Result<()>;
}

/// Media controller for setups with no media session to manage
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMedia;

impl MediaController for NoMedia {
    fn duck(&self, _volume_percent: u8) -> Result<bool> {
        Ok(false)
    }

    fn lower_volume(&self, _volume_percent: u8) -> Result<()> {
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        Ok(())
    }

    fn silence(&self) -> Result<()> {
        Ok(())
    }

    fn restore(&self) -> Result<()> {
        Ok(())
    }
}

/// Sensor control for producers that are always on
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnSensors;

impl SensorControl for AlwaysOnSensors {
    fn acquire(&self, _kind: GestureKind) -> Result<()> {
        Ok(())
    }

    fn release(&self, _kind: GestureKind) -> Result<()> {
        Ok(())
    }
}
