//! Notification Readout - 通知朗读仲裁引擎
//!
//! 决定收到的通知是否朗读、何时朗读以及如何朗读。

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod notification;
pub mod render;
pub mod suppression;

pub use config::{BehaviorMode, ConfigStore, ContentCap, GestureKind, MediaBehavior, PolicyConfig, SpeechTemplate};
pub use engine::{
    Collaborators, Engine, EngineHandle, EngineOutcome, EngineSnapshot, MediaController, SensorControl,
    SpeechBackend, SpeechHandle,
};
pub use error::{PolicyViolation, ReadoutError, Result};
pub use gesture::SensorSample;
pub use notification::{Fingerprint, NotificationEvent, NotificationEventBuilder, Priority};
pub use render::render_utterance;
pub use suppression::{DeviceState, RingerMode, SuppressionReason};
