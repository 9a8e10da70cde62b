//! 朗读策略配置
//!
//! - `policy`: `PolicyConfig` 值对象、文件加载、规范化
//! - `gesture`: 各手势阈值与自动解除超时
//! - `store`: 向运行中的引擎分发配置快照

pub mod gesture;
pub mod policy;
pub mod store;

pub use gesture::{
    normalize_timeout_secs, normalize_wave_percent, GestureKind, GestureSettings, GestureTimeout,
    PendingTimeoutDisable, PressConfig, ShakeConfig, TimeoutChange, WaveConfig,
};
pub use policy::{
    migrate_legacy_audio_mode, BehaviorMode, ContentCap, DuckFallback, HonourFile, HonourFlags,
    MediaBehavior, PolicyConfig, SpeechTemplate,
};
pub use store::ConfigStore;
