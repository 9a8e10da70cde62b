//! 朗读仲裁引擎
//!
//! - `admission`: 门控、行为表、延迟朗读
//! - `coordinator`: 朗读位置、FIFO 队列、媒体效果
//! - `backend`: 语音、媒体、传感器协作方 trait
//! - `outcome`: 发布的决策与快照
//! - `runtime`: 串行化的引擎任务及其句柄

pub mod admission;
pub mod backend;
pub mod coordinator;
pub mod outcome;
pub mod runtime;

pub use admission::{choose_action, Action, Admission, AdmissionController, PendingReadout};
pub use backend::{
    AlwaysOnSensors, MediaController, NoMedia, SensorControl, SpeechBackend, SpeechHandle,
};
pub use coordinator::{EngineState, PlaybackCoordinator, SpeechQueueItem, Utterance};
pub use outcome::{CancelCause, EngineOutcome, EngineSnapshot, OutcomeSink, Phase};
pub use runtime::{Collaborators, Engine, EngineHandle, STOP_CONFIRM_TIMEOUT};
