//! 手势设置 - 摇晃、挥手、按键取消朗读
//!
//! 每个手势都有自动解除的超时。合法值为 0 (永不解除) 或 5..=300 秒，
//! 其他值规范化为 30。设为 0 需要两步确认
//! (`request_timeout` 然后 `confirm_timeout_disable`)，
//! 没有超时的传感器监听会持续耗电。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PolicyViolation, ReadoutError};

pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const MIN_WAVE_PERCENT: u8 = 30;
pub const MAX_WAVE_PERCENT: u8 = 90;
pub const DEFAULT_WAVE_PERCENT: u8 = 60;

/// Acceleration delta (m/s², gravity removed) that counts as a shake
pub const DEFAULT_SHAKE_THRESHOLD: f32 = 12.0;

/// Normalize a timeout-style seconds value.
///
/// `0` and `5..=300` pass through; everything else becomes 30.
pub fn normalize_timeout_secs(secs: u64) -> u64 {
    if secs == 0 || (MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
        secs
    } else {
        DEFAULT_TIMEOUT_SECS
    }
}

/// Normalize a persisted seconds value, which may be negative or huge.
pub fn normalize_persisted_secs(raw: i64) -> u64 {
    u64::try_from(raw)
        .map(normalize_timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Normalize a wave threshold percent; out of range becomes 60.
pub fn normalize_wave_percent(percent: u8) -> u8 {
    if (MIN_WAVE_PERCENT..=MAX_WAVE_PERCENT).contains(&percent) {
        percent
    } else {
        DEFAULT_WAVE_PERCENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Shake,
    Wave,
    Press,
}

impl GestureKind {
    pub const ALL: [GestureKind; 3] = [GestureKind::Shake, GestureKind::Wave, GestureKind::Press];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::Shake => "shake",
            GestureKind::Wave => "wave",
            GestureKind::Press => "press",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-disarm timeout of one gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTimeout {
    /// Signed so that any persisted number loads and gets normalized
    secs: i64,
    /// Persisted proof that a 0 (never) timeout went through confirmation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    disable_confirmed: bool,
}

impl Default for GestureTimeout {
    fn default() -> Self {
        Self {
            secs: DEFAULT_TIMEOUT_SECS as i64,
            disable_confirmed: false,
        }
    }
}

impl GestureTimeout {
    pub fn secs(&self) -> u64 {
        u64::try_from(self.secs).unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// `None` when self-disarm is turned off
    pub fn duration(&self) -> Option<Duration> {
        match self.secs() {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Load-time normalization of a persisted value
    fn normalize(&mut self, field: &str) -> Option<PolicyViolation> {
        if self.secs == 0 {
            if self.disable_confirmed {
                return None;
            }
            self.secs = DEFAULT_TIMEOUT_SECS as i64;
            return Some(PolicyViolation::new(
                field,
                "0 (unconfirmed)",
                DEFAULT_TIMEOUT_SECS,
            ));
        }
        self.disable_confirmed = false;
        let normalized = normalize_persisted_secs(self.secs);
        if u64::try_from(self.secs).ok() != Some(normalized) {
            let violation = PolicyViolation::new(field, self.secs, normalized);
            self.secs = normalized as i64;
            return Some(violation);
        }
        None
    }
}

/// Result of asking for a new timeout value
#[derive(Debug, PartialEq)]
pub enum TimeoutChange {
    /// Stored; carries the normalization if the value was out of range
    Applied {
        secs: u64,
        violation: Option<PolicyViolation>,
    },
    /// Disabling was requested and waits for `confirm_timeout_disable`
    NeedsConfirmation(PendingTimeoutDisable),
}

/// Token proving that a timeout disable was requested for `kind`.
///
/// Only `GestureSettings::request_timeout` can create one.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingTimeoutDisable {
    kind: GestureKind,
}

impl PendingTimeoutDisable {
    pub fn kind(&self) -> GestureKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakeConfig {
    pub enabled: bool,
    pub threshold: f32,
    pub timeout: GestureTimeout,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_SHAKE_THRESHOLD,
            timeout: GestureTimeout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub enabled: bool,
    calibrated_max_distance: Option<f32>,
    threshold_percent: i64,
    pub timeout: GestureTimeout,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            calibrated_max_distance: None,
            threshold_percent: i64::from(DEFAULT_WAVE_PERCENT),
            timeout: GestureTimeout::default(),
        }
    }
}

impl WaveConfig {
    pub fn calibrated_max_distance(&self) -> Option<f32> {
        self.calibrated_max_distance
    }

    pub fn threshold_percent(&self) -> u8 {
        u8::try_from(self.threshold_percent)
            .map(normalize_wave_percent)
            .unwrap_or(DEFAULT_WAVE_PERCENT)
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self.calibrated_max_distance, Some(d) if d.is_finite() && d > 0.0)
    }

    /// Proximity distance at or below which a wave triggers
    pub fn trigger_distance(&self) -> Option<f32> {
        self.calibrated_max_distance
            .filter(|_| self.is_calibrated())
            .map(|d| d * f32::from(self.threshold_percent()) / 100.0)
    }

    /// Store the maximum distance the proximity sensor reported while calibrating
    pub fn calibrate(&mut self, max_distance: f32) -> Result<(), ReadoutError> {
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(ReadoutError::InvalidCalibration(max_distance));
        }
        self.calibrated_max_distance = Some(max_distance);
        info!(max_distance, "Wave gesture calibrated");
        Ok(())
    }

    pub fn enable(&mut self) -> Result<(), ReadoutError> {
        if !self.is_calibrated() {
            return Err(ReadoutError::CalibrationMissing(GestureKind::Wave));
        }
        self.enabled = true;
        Ok(())
    }

    pub fn set_threshold_percent(&mut self, percent: u8) -> Option<PolicyViolation> {
        let normalized = normalize_wave_percent(percent);
        self.threshold_percent = i64::from(normalized);
        (normalized != percent)
            .then(|| PolicyViolation::new("gestures.wave.threshold_percent", percent, normalized))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressConfig {
    pub enabled: bool,
    /// Whether the platform can deliver global press actions at all
    pub capability_available: bool,
    pub timeout: GestureTimeout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub shake: ShakeConfig,
    pub wave: WaveConfig,
    pub press: PressConfig,
}

impl GestureSettings {
    pub fn timeout(&self, kind: GestureKind) -> GestureTimeout {
        match kind {
            GestureKind::Shake => self.shake.timeout,
            GestureKind::Wave => self.wave.timeout,
            GestureKind::Press => self.press.timeout,
        }
    }

    fn timeout_mut(&mut self, kind: GestureKind) -> &mut GestureTimeout {
        match kind {
            GestureKind::Shake => &mut self.shake.timeout,
            GestureKind::Wave => &mut self.wave.timeout,
            GestureKind::Press => &mut self.press.timeout,
        }
    }

    /// Whether `kind` should listen for samples once armed
    pub fn is_active(&self, kind: GestureKind) -> bool {
        match kind {
            GestureKind::Shake => self.shake.enabled,
            GestureKind::Wave => self.wave.enabled && self.wave.is_calibrated(),
            GestureKind::Press => self.press.enabled && self.press.capability_available,
        }
    }

    pub fn request_timeout(&mut self, kind: GestureKind, secs: u64) -> TimeoutChange {
        if secs == 0 {
            info!(gesture = %kind, "Timeout disable requested, awaiting confirmation");
            return TimeoutChange::NeedsConfirmation(PendingTimeoutDisable { kind });
        }
        let normalized = normalize_timeout_secs(secs);
        let violation = (normalized != secs).then(|| {
            let v = PolicyViolation::new(format!("gestures.{kind}.timeout"), secs, normalized);
            warn!(violation = %v, "Gesture timeout normalized");
            v
        });
        let timeout = self.timeout_mut(kind);
        timeout.secs = normalized as i64;
        timeout.disable_confirmed = false;
        TimeoutChange::Applied {
            secs: normalized,
            violation,
        }
    }

    pub fn confirm_timeout_disable(&mut self, pending: PendingTimeoutDisable) {
        let timeout = self.timeout_mut(pending.kind);
        timeout.secs = 0;
        timeout.disable_confirmed = true;
        warn!(gesture = %pending.kind, "Gesture self-disarm timeout disabled");
    }

    /// Normalize persisted values; returns every replacement made
    pub fn normalize(&mut self) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if !self.shake.threshold.is_finite() || self.shake.threshold <= 0.0 {
            violations.push(PolicyViolation::new(
                "gestures.shake.threshold",
                self.shake.threshold,
                DEFAULT_SHAKE_THRESHOLD,
            ));
            self.shake.threshold = DEFAULT_SHAKE_THRESHOLD;
        }

        let raw = self.wave.threshold_percent;
        let percent = self.wave.threshold_percent();
        if i64::from(percent) != raw {
            violations.push(PolicyViolation::new(
                "gestures.wave.threshold_percent",
                raw,
                percent,
            ));
            self.wave.threshold_percent = i64::from(percent);
        }

        if let Some(d) = self.wave.calibrated_max_distance {
            if !d.is_finite() || d <= 0.0 {
                violations.push(PolicyViolation::new(
                    "gestures.wave.calibrated_max_distance",
                    d,
                    "uncalibrated",
                ));
                self.wave.calibrated_max_distance = None;
            }
        }
        if self.wave.enabled && !self.wave.is_calibrated() {
            warn!("Wave gesture enabled without calibration, disabling until calibrated");
            violations.push(PolicyViolation::new("gestures.wave.enabled", true, false));
            self.wave.enabled = false;
        }

        for kind in GestureKind::ALL {
            let field = format!("gestures.{kind}.timeout");
            violations.extend(self.timeout_mut(kind).normalize(&field));
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timeout_secs() {
        assert_eq!(normalize_timeout_secs(0), 0);
        assert_eq!(normalize_timeout_secs(5), 5);
        assert_eq!(normalize_timeout_secs(300), 300);
        for bad in [1, 2, 3, 4, 301, 1000, u64::MAX] {
            assert_eq!(normalize_timeout_secs(bad), 30, "value {bad}");
        }
    }

    #[test]
    fn test_normalize_wave_percent() {
        assert_eq!(normalize_wave_percent(30), 30);
        assert_eq!(normalize_wave_percent(90), 90);
        for bad in [0, 29, 91, 255] {
            assert_eq!(normalize_wave_percent(bad), 60, "value {bad}");
        }
    }

    #[test]
    fn test_request_timeout_zero_needs_confirmation() {
        let mut settings = GestureSettings::default();

        let change = settings.request_timeout(GestureKind::Shake, 0);
        let pending = match change {
            TimeoutChange::NeedsConfirmation(p) => p,
            other => panic!("expected confirmation request, got {other:?}"),
        };
        // not applied yet
        assert_eq!(settings.timeout(GestureKind::Shake).secs(), 30);

        settings.confirm_timeout_disable(pending);
        assert_eq!(settings.timeout(GestureKind::Shake).secs(), 0);
        assert_eq!(settings.timeout(GestureKind::Shake).duration(), None);
    }

    #[test]
    fn test_request_timeout_out_of_range_normalizes() {
        let mut settings = GestureSettings::default();
        match settings.request_timeout(GestureKind::Press, 3) {
            TimeoutChange::Applied { secs, violation } => {
                assert_eq!(secs, 30);
                assert!(violation.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        match settings.request_timeout(GestureKind::Press, 120) {
            TimeoutChange::Applied { secs, violation } => {
                assert_eq!(secs, 120);
                assert!(violation.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_persisted_unconfirmed_zero_becomes_default() {
        let mut settings: GestureSettings =
            serde_json::from_str(r#"{"shake": {"enabled": true, "timeout": {"secs": 0}}}"#).unwrap();
        let violations = settings.normalize();
        assert_eq!(settings.shake.timeout.secs(), 30);
        assert_eq!(violations.len(), 1);

        let mut confirmed: GestureSettings = serde_json::from_str(
            r#"{"shake": {"timeout": {"secs": 0, "disable_confirmed": true}}}"#,
        )
        .unwrap();
        assert!(confirmed.normalize().is_empty());
        assert_eq!(confirmed.shake.timeout.secs(), 0);
    }

    #[test]
    fn test_persisted_timeout_between_zero_and_five() {
        let mut settings: GestureSettings =
            serde_json::from_str(r#"{"wave": {"timeout": {"secs": 4}}}"#).unwrap();
        settings.normalize();
        assert_eq!(settings.wave.timeout.secs(), 30);
    }

    #[test]
    fn test_persisted_values_outside_integer_range_still_load() {
        // Given values no narrow unsigned field could hold
        let mut settings: GestureSettings = serde_json::from_str(
            r#"{
                "shake": {"timeout": {"secs": -1}},
                "wave": {"threshold_percent": 300},
                "press": {"timeout": {"secs": 99999999999}}
            }"#,
        )
        .unwrap();

        // When normalized
        let violations = settings.normalize();

        // Then each one falls back to its default and is reported
        assert_eq!(settings.shake.timeout.secs(), 30);
        assert_eq!(settings.wave.threshold_percent(), 60);
        assert_eq!(settings.press.timeout.secs(), 30);
        let wave = violations
            .iter()
            .find(|v| v.field == "gestures.wave.threshold_percent")
            .unwrap();
        assert_eq!(wave.rejected, "300");
        assert!(violations.iter().any(|v| v.field == "gestures.shake.timeout" && v.rejected == "-1"));
    }

    #[test]
    fn test_wave_enable_requires_calibration() {
        let mut wave = WaveConfig::default();
        assert!(matches!(
            wave.enable(),
            Err(ReadoutError::CalibrationMissing(GestureKind::Wave))
        ));
        assert!(wave.calibrate(0.0).is_err());
        wave.calibrate(5.0).unwrap();
        wave.enable().unwrap();
        assert!(wave.enabled);
        assert_eq!(wave.trigger_distance(), Some(3.0));
    }

    #[test]
    fn test_wave_threshold_percent_normalized() {
        let mut wave = WaveConfig::default();
        assert!(wave.set_threshold_percent(95).is_some());
        assert_eq!(wave.threshold_percent(), 60);
        assert!(wave.set_threshold_percent(45).is_none());
        assert_eq!(wave.threshold_percent(), 45);
    }

    #[test]
    fn test_wave_enabled_without_calibration_is_disabled_on_load() {
        let mut settings: GestureSettings =
            serde_json::from_str(r#"{"wave": {"enabled": true}}"#).unwrap();
        let violations = settings.normalize();
        assert!(!settings.wave.enabled);
        assert!(violations.iter().any(|v| v.field == "gestures.wave.enabled"));
    }

    #[test]
    fn test_press_requires_capability() {
        let mut settings = GestureSettings::default();
        settings.press.enabled = true;
        assert!(!settings.is_active(GestureKind::Press));
        settings.press.capability_available = true;
        assert!(settings.is_active(GestureKind::Press));
    }
}
