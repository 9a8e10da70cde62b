//! 抑制门控 - 通知朗读前的检查
//!
//! - `device`: 勿扰、铃声模式和通话状态
//! - `store`: 按应用冷却、内容去重、关闭记忆

pub mod device;
pub mod store;

use std::fmt;
use std::time::Duration;

pub use device::{DeviceState, RingerMode};
pub use store::{SuppressionStore, Verdict};

/// Why a notification was not read. A normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionReason {
    DoNotDisturb,
    SilentMode,
    VibrateMode,
    PhoneCall,
    Cooldown { remaining: Duration },
    Duplicate,
    Dismissed,
}

impl SuppressionReason {
    pub fn code(&self) -> &'static str {
        match self {
            SuppressionReason::DoNotDisturb => "dnd",
            SuppressionReason::SilentMode => "silent",
            SuppressionReason::VibrateMode => "vibrate",
            SuppressionReason::PhoneCall => "phone_call",
            SuppressionReason::Cooldown { .. } => "cooldown",
            SuppressionReason::Duplicate => "dedup",
            SuppressionReason::Dismissed => "dismissal_memory",
        }
    }
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressionReason::Cooldown { remaining } => {
                write!(f, "cooldown ({:.1}s left)", remaining.as_secs_f32())
            }
            other => f.write_str(other.code()),
        }
    }
}
