//! 通知模块 - 平台监听器送来的通知事件
//!
//! - `event`: 不可变的 `NotificationEvent` 及其构建器
//! - `fingerprint`: 去重和关闭记忆使用的稳定内容键

pub mod event;
pub mod fingerprint;

pub use event::{NotificationEvent, NotificationEventBuilder, Priority};
pub use fingerprint::{normalize_content, Fingerprint};
