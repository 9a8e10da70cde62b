//! 设备状态门控 (勿扰模式、铃声模式、通话中)

use serde::{Deserialize, Serialize};

use super::SuppressionReason;
use crate::config::HonourFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingerMode {
    #[default]
    Normal,
    Vibrate,
    Silent,
}

/// Device conditions reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    pub do_not_disturb: bool,
    pub ringer: RingerMode,
    pub call_active: bool,
}

impl DeviceState {
    /// First honoured condition that blocks readout, in gate order
    pub fn blocking_reason(&self, honour: &HonourFlags) -> Option<SuppressionReason> {
        if honour.do_not_disturb && self.do_not_disturb {
            return Some(SuppressionReason::DoNotDisturb);
        }
        match self.ringer {
            RingerMode::Silent if honour.silent_mode => return Some(SuppressionReason::SilentMode),
            RingerMode::Vibrate if honour.vibrate_mode => {
                return Some(SuppressionReason::VibrateMode)
            }
            _ => {}
        }
        if honour.phone_calls && self.call_active {
            return Some(SuppressionReason::PhoneCall);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_device_never_blocks() {
        assert_eq!(DeviceState::default().blocking_reason(&HonourFlags::default()), None);
    }

    #[test]
    fn test_gate_order() {
        let state = DeviceState {
            do_not_disturb: true,
            ringer: RingerMode::Silent,
            call_active: true,
        };
        assert_eq!(
            state.blocking_reason(&HonourFlags::default()),
            Some(SuppressionReason::DoNotDisturb)
        );

        let honour = HonourFlags {
            do_not_disturb: false,
            ..HonourFlags::default()
        };
        assert_eq!(state.blocking_reason(&honour), Some(SuppressionReason::SilentMode));
    }

    #[test]
    fn test_unhonoured_flags_are_ignored() {
        let state = DeviceState {
            do_not_disturb: true,
            ringer: RingerMode::Vibrate,
            call_active: true,
        };
        let honour = HonourFlags {
            do_not_disturb: false,
            silent_mode: true,
            vibrate_mode: false,
            phone_calls: false,
        };
        assert_eq!(state.blocking_reason(&honour), None);
    }

    #[test]
    fn test_vibrate_and_call() {
        let vibrate = DeviceState {
            ringer: RingerMode::Vibrate,
            ..DeviceState::default()
        };
        assert_eq!(
            vibrate.blocking_reason(&HonourFlags::default()),
            Some(SuppressionReason::VibrateMode)
        );

        let call = DeviceState {
            call_active: true,
            ..DeviceState::default()
        };
        assert_eq!(
            call.blocking_reason(&HonourFlags::default()),
            Some(SuppressionReason::PhoneCall)
        );
    }
}
