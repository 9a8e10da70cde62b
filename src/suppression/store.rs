//! 冷却、去重与关闭记忆的记录
//!
//! 检查本身不写入。只有真正开始朗读 (`record_spoken`) 或用户关闭通知
//! (`record_dismissed`) 时才记录时间戳，被丢弃的事件不会延长任何窗口。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use super::SuppressionReason;
use crate::config::gesture::MAX_TIMEOUT_SECS;
use crate::config::PolicyConfig;
use crate::notification::Fingerprint;

/// 抑制检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Suppress(SuppressionReason),
}

#[derive(Debug, Default)]
pub struct SuppressionStore {
    /// 应用 ID -> 该应用最近一次开始朗读的时间
    last_spoken: HashMap<String, Instant>,
    /// 指纹 -> 最近一次开始朗读的时间
    spoken: HashMap<Fingerprint, Instant>,
    /// 指纹 -> 用户关闭该通知的时间
    dismissed: HashMap<Fingerprint, Instant>,
}

impl SuppressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次检查冷却、去重、关闭记忆
    pub fn check(
        &mut self,
        app_id: &str,
        fingerprint: Fingerprint,
        config: &PolicyConfig,
        now: Instant,
    ) -> Verdict {
        self.prune(config, now);

        if let (Some(cooldown), Some(last)) = (config.cooldown_for(app_id), self.last_spoken.get(app_id)) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < cooldown {
                debug!(
                    app_id = %app_id,
                    elapsed_secs = elapsed.as_secs_f32(),
                    cooldown_secs = cooldown.as_secs(),
                    "App is cooling down"
                );
                return Verdict::Suppress(SuppressionReason::Cooldown {
                    remaining: cooldown - elapsed,
                });
            }
        }

        if let (Some(window), Some(at)) = (config.dedup_window(), self.spoken.get(&fingerprint)) {
            if now.saturating_duration_since(*at) < window {
                debug!(app_id = %app_id, fingerprint = %fingerprint, "Duplicate content within window");
                return Verdict::Suppress(SuppressionReason::Duplicate);
            }
        }

        if let (Some(window), Some(at)) = (config.dismissal_window(), self.dismissed.get(&fingerprint)) {
            if now.saturating_duration_since(*at) < window {
                debug!(app_id = %app_id, fingerprint = %fingerprint, "Content was dismissed recently");
                return Verdict::Suppress(SuppressionReason::Dismissed);
            }
        }

        Verdict::Allow
    }

    pub fn record_spoken(&mut self, app_id: &str, fingerprint: Fingerprint, now: Instant) {
        self.last_spoken.insert(app_id.to_string(), now);
        self.spoken.insert(fingerprint, now);
    }

    pub fn record_dismissed(&mut self, fingerprint: Fingerprint, now: Instant) {
        self.dismissed.insert(fingerprint, now);
    }

    /// 清理已超出所有窗口的记录
    pub fn prune(&mut self, config: &PolicyConfig, now: Instant) {
        let cooldown_horizon = Duration::from_secs(MAX_TIMEOUT_SECS);
        self.last_spoken
            .retain(|_, at| now.saturating_duration_since(*at) < cooldown_horizon);

        let dedup = config.dedup_window().unwrap_or(Duration::ZERO);
        self.spoken
            .retain(|_, at| now.saturating_duration_since(*at) < dedup);

        let dismissal = config.dismissal_window().unwrap_or(Duration::ZERO);
        self.dismissed
            .retain(|_, at| now.saturating_duration_since(*at) < dismissal);
    }

    pub fn clear(&mut self) {
        self.last_spoken.clear();
        self.spoken.clear();
        self.dismissed.clear();
    }
}
