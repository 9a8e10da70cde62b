//! 朗读策略 - 每次设置修订对应一个不可变值对象
//!
//! 从 `~/.config/notification-readout/config.json` (或指定路径) 加载，
//! 规范化一次后以 `Arc<PolicyConfig>` 共享。修改设置即构造新值，
//! 并通过 [`ConfigStore`](super::ConfigStore) 替换。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::gesture::{normalize_persisted_secs, normalize_timeout_secs, GestureSettings};
use crate::error::{PolicyViolation, ReadoutError};

pub const DEFAULT_TEMPLATE: &str = "{app} notified you: {content}";
pub const VARIED_SENTINEL: &str = "Varied";
pub const MAX_DELAY_SECS: i64 = 3;
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 30;
pub const DEFAULT_DISMISSAL_TIMEOUT_SECS: i64 = 300;

/// What to do with a notification that arrives while something is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    Interrupt,
    Queue,
    Skip,
    #[default]
    Smart,
}

impl fmt::Display for BehaviorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BehaviorMode::Interrupt => "interrupt",
            BehaviorMode::Queue => "queue",
            BehaviorMode::Skip => "skip",
            BehaviorMode::Smart => "smart",
        };
        f.write_str(s)
    }
}

/// Limit applied to the rendered utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "limit", rename_all = "snake_case")]
pub enum ContentCap {
    #[default]
    Disabled,
    Words(u32),
    Sentences(u32),
    /// Seconds of estimated speech
    TimeLimit(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuckFallback {
    /// Lower the media stream volume directly
    #[default]
    Manual,
    Pause,
}

/// Effect on background media while an utterance plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaBehavior {
    #[default]
    Ignore,
    Pause,
    Duck {
        volume_percent: i64,
        #[serde(default)]
        fallback: DuckFallback,
    },
    Silence,
}

/// Which device states suppress readout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HonourFlags {
    pub do_not_disturb: bool,
    pub silent_mode: bool,
    pub vibrate_mode: bool,
    pub phone_calls: bool,
}

impl Default for HonourFlags {
    fn default() -> Self {
        Self {
            do_not_disturb: true,
            silent_mode: true,
            vibrate_mode: true,
            phone_calls: true,
        }
    }
}

/// On-disk shape of [`HonourFlags`], including the legacy `audio_mode` switch
/// that predates the separate silent/vibrate flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HonourFile {
    pub do_not_disturb: Option<bool>,
    pub silent_mode: Option<bool>,
    pub vibrate_mode: Option<bool>,
    pub phone_calls: Option<bool>,
    pub audio_mode: Option<bool>,
}

impl From<HonourFile> for HonourFlags {
    fn from(file: HonourFile) -> Self {
        migrate_legacy_audio_mode(&file)
    }
}

impl<'de> Deserialize<'de> for HonourFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        HonourFile::deserialize(deserializer).map(HonourFlags::from)
    }
}

/// Seed silent/vibrate from the legacy audio-mode flag.
///
/// Skipped when both new flags are already present, so running it on an
/// already migrated file changes nothing.
pub fn migrate_legacy_audio_mode(file: &HonourFile) -> HonourFlags {
    let defaults = HonourFlags::default();
    let (silent_mode, vibrate_mode) = match (file.silent_mode, file.vibrate_mode, file.audio_mode) {
        (Some(silent), Some(vibrate), _) => (silent, vibrate),
        (_, _, Some(legacy)) => {
            info!(audio_mode = legacy, "Migrating legacy audio-mode flag to silent/vibrate");
            (legacy, legacy)
        }
        (silent, vibrate, None) => (
            silent.unwrap_or(defaults.silent_mode),
            vibrate.unwrap_or(defaults.vibrate_mode),
        ),
    };

    HonourFlags {
        do_not_disturb: file.do_not_disturb.unwrap_or(defaults.do_not_disturb),
        silent_mode,
        vibrate_mode,
        phone_calls: file.phone_calls.unwrap_or(defaults.phone_calls),
    }
}

/// Speech template, or the marker asking for a random phrasing per readout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpeechTemplate {
    Fixed(String),
    Varied,
}

impl Default for SpeechTemplate {
    fn default() -> Self {
        SpeechTemplate::Fixed(DEFAULT_TEMPLATE.to_string())
    }
}

impl From<String> for SpeechTemplate {
    fn from(s: String) -> Self {
        if s == VARIED_SENTINEL {
            SpeechTemplate::Varied
        } else {
            SpeechTemplate::Fixed(s)
        }
    }
}

impl From<&str> for SpeechTemplate {
    fn from(s: &str) -> Self {
        SpeechTemplate::from(s.to_string())
    }
}

impl From<SpeechTemplate> for String {
    fn from(t: SpeechTemplate) -> Self {
        match t {
            SpeechTemplate::Fixed(s) => s,
            SpeechTemplate::Varied => VARIED_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub behavior_mode: BehaviorMode,
    pub priority_apps: BTreeSet<String>,
    /// app id -> cooldown seconds (0 = none)
    pub cooldowns: BTreeMap<String, i64>,
    pub dedup_enabled: bool,
    pub dedup_window_secs: i64,
    pub dismissal_memory_enabled: bool,
    pub dismissal_memory_timeout_secs: i64,
    pub content_cap: ContentCap,
    pub delay_before_readout_secs: i64,
    pub media_behavior: MediaBehavior,
    pub honour: HonourFlags,
    pub gestures: GestureSettings,
    pub template: SpeechTemplate,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            behavior_mode: BehaviorMode::default(),
            priority_apps: BTreeSet::new(),
            cooldowns: BTreeMap::new(),
            dedup_enabled: true,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            dismissal_memory_enabled: false,
            dismissal_memory_timeout_secs: DEFAULT_DISMISSAL_TIMEOUT_SECS,
            content_cap: ContentCap::default(),
            delay_before_readout_secs: 0,
            media_behavior: MediaBehavior::default(),
            honour: HonourFlags::default(),
            gestures: GestureSettings::default(),
            template: SpeechTemplate::default(),
        }
    }
}

impl PolicyConfig {
    /// Default config location: `~/.config/notification-readout/config.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notification-readout")
            .join("config.json")
    }

    /// Load and normalize, falling back to defaults on any problem.
    pub fn load(path: Option<&Path>) -> (Self, Vec<PolicyViolation>) {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return (Self::default(), Vec::new());
        }
        match Self::load_strict(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Config unusable, using defaults");
                (Self::default(), Vec::new())
            }
        }
    }

    /// Load and normalize, reporting read/parse failures
    pub fn load_strict(path: &Path) -> Result<(Self, Vec<PolicyViolation>), ReadoutError> {
        let content = fs::read_to_string(path).map_err(|source| ReadoutError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ReadoutError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded readout config");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<(Self, Vec<PolicyViolation>), serde_json::Error> {
        let mut config: PolicyConfig = serde_json::from_str(content)?;
        let violations = config.normalize();
        Ok((config, violations))
    }

    /// Replace out-of-range values with safe defaults.
    ///
    /// Returns one entry per replacement; each is also logged.
    pub fn normalize(&mut self) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        for (app, secs) in self.cooldowns.iter_mut() {
            let normalized = normalize_persisted_secs(*secs);
            if u64::try_from(*secs).ok() != Some(normalized) {
                violations.push(PolicyViolation::new(
                    format!("cooldowns.{app}"),
                    *secs,
                    normalized,
                ));
                *secs = normalized as i64;
            }
        }

        let delay = self.delay_before_readout_secs.clamp(0, MAX_DELAY_SECS);
        if delay != self.delay_before_readout_secs {
            violations.push(PolicyViolation::new(
                "delay_before_readout_secs",
                self.delay_before_readout_secs,
                delay,
            ));
            self.delay_before_readout_secs = delay;
        }

        if let MediaBehavior::Duck { volume_percent, .. } = &mut self.media_behavior {
            let clamped = (*volume_percent).clamp(0, 100);
            if clamped != *volume_percent {
                violations.push(PolicyViolation::new(
                    "media_behavior.volume_percent",
                    *volume_percent,
                    clamped,
                ));
                *volume_percent = clamped;
            }
        }

        if self.dedup_window_secs <= 0 {
            violations.push(PolicyViolation::new(
                "dedup_window_secs",
                self.dedup_window_secs,
                DEFAULT_DEDUP_WINDOW_SECS,
            ));
            self.dedup_window_secs = DEFAULT_DEDUP_WINDOW_SECS;
        }

        if self.dismissal_memory_timeout_secs <= 0 {
            violations.push(PolicyViolation::new(
                "dismissal_memory_timeout_secs",
                self.dismissal_memory_timeout_secs,
                DEFAULT_DISMISSAL_TIMEOUT_SECS,
            ));
            self.dismissal_memory_timeout_secs = DEFAULT_DISMISSAL_TIMEOUT_SECS;
        }

        violations.extend(self.gestures.normalize());

        for v in &violations {
            warn!(violation = %v, "Policy value normalized");
        }
        debug!(count = violations.len(), "Policy normalization finished");
        violations
    }

    pub fn is_priority(&self, app_id: &str) -> bool {
        self.priority_apps.contains(app_id)
    }

    /// `None` for apps without a cooldown
    pub fn cooldown_for(&self, app_id: &str) -> Option<Duration> {
        self.cooldowns
            .get(app_id)
            .and_then(|secs| u64::try_from(*secs).ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn dedup_window(&self) -> Option<Duration> {
        self.dedup_enabled
            .then(|| window(self.dedup_window_secs, DEFAULT_DEDUP_WINDOW_SECS))
    }

    pub fn dismissal_window(&self) -> Option<Duration> {
        self.dismissal_memory_enabled.then(|| {
            window(
                self.dismissal_memory_timeout_secs,
                DEFAULT_DISMISSAL_TIMEOUT_SECS,
            )
        })
    }

    pub fn readout_delay(&self) -> Option<Duration> {
        u64::try_from(self.delay_before_readout_secs.min(MAX_DELAY_SECS))
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Set a per-app cooldown, normalizing out-of-range values
    pub fn set_cooldown(&mut self, app_id: impl Into<String>, secs: u64) -> Option<PolicyViolation> {
        let app_id = app_id.into();
        let normalized = normalize_timeout_secs(secs);
        let violation = (normalized != secs)
            .then(|| PolicyViolation::new(format!("cooldowns.{app_id}"), secs, normalized));
        self.cooldowns.insert(app_id, normalized as i64);
        violation
    }
}

/// Window length, using `default` for a value that was never normalized
fn window(secs: i64, default: i64) -> Duration {
    let secs = if secs > 0 { secs } else { default };
    Duration::from_secs(secs.unsigned_abs())
}
