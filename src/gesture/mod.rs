//! 手势取消
//!
//! 传感器生产者只向引擎发送 `SensorSample`；检测和布防都在引擎任务内完成。
//!
//! - `detector`: 摇晃 / 挥手 / 按键触发条件
//! - `arming`: 布防状态、自动解除 generation、测试模式

pub mod arming;
pub mod detector;

pub use arming::{ArmMode, ArmState, ArmTicket, GestureArming, GestureTrigger};
pub use detector::{
    detect, is_shake, is_wave, shake_magnitude, SensorSample, GRAVITY_EARTH, PROXIMITY_TOUCHING,
};
