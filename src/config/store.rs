//! 配置快照分发
//!
//! 设置层发布完整的 `PolicyConfig`，读取方持有 `Arc` 快照，
//! 不会看到更新到一半的策略。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::policy::PolicyConfig;

/// Publishes policy snapshots to the engine
#[derive(Clone)]
pub struct ConfigStore {
    tx: Arc<watch::Sender<Arc<PolicyConfig>>>,
}

impl ConfigStore {
    pub fn new(initial: PolicyConfig) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot
    pub fn current(&self) -> Arc<PolicyConfig> {
        self.tx.borrow().clone()
    }

    /// Swap in a new policy; subscribers see it on their next `changed()`
    pub fn replace(&self, config: PolicyConfig) {
        info!(mode = %config.behavior_mode, "Publishing new readout policy");
        self.tx.send_replace(Arc::new(config));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PolicyConfig>> {
        self.tx.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
