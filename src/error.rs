//! 错误类型与策略规范化记录

use std::fmt;
use std::path::PathBuf;

use crate::config::GestureKind;

/// Errors surfaced by the readout library
#[derive(Debug, thiserror::Error)]
pub enum ReadoutError {
    /// Wave gesture requested without a usable calibration
    #[error("{0} gesture needs calibration before it can be enabled")]
    CalibrationMissing(GestureKind),

    /// Calibration value rejected (non-positive or not finite)
    #[error("invalid calibration distance {0}")]
    InvalidCalibration(f32),

    /// Gesture test requested for a gesture that cannot listen
    #[error("{0} gesture is not enabled")]
    GestureInactive(GestureKind),

    /// The engine task has shut down
    #[error("readout engine is no longer running")]
    EngineClosed,

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReadoutError>;

/// A config value outside its allowed range, and what it was replaced with.
///
/// Never fatal: the normalized value is already in effect when the caller
/// sees this.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyViolation {
    pub field: String,
    pub rejected: String,
    pub normalized: String,
}

impl PolicyViolation {
    pub fn new(
        field: impl Into<String>,
        rejected: impl fmt::Display,
        normalized: impl fmt::Display,
    ) -> Self {
        Self {
            field: field.into(),
            rejected: rejected.to_string(),
            normalized: normalized.to_string(),
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} is out of range, using {}",
            self.field, self.rejected, self.normalized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_violation_display() {
        let v = PolicyViolation::new("cooldowns.com.chat", 3, 30);
        assert_eq!(v.to_string(), "cooldowns.com.chat: 3 is out of range, using 30");
    }

    #[test]
    fn test_error_messages() {
        let err = ReadoutError::CalibrationMissing(GestureKind::Wave);
        assert_eq!(
            err.to_string(),
            "wave gesture needs calibration before it can be enabled"
        );
        let err = ReadoutError::GestureInactive(GestureKind::Shake);
        assert_eq!(err.to_string(), "shake gesture is not enabled");
    }
}
