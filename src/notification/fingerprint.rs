//! 内容指纹 - 用于去重和关闭记忆
//!
//! 指纹是来源应用 ID 与规范化后 `{content}` 文本的哈希。
//! 连续空白和大小写会被折叠，仅有外观差异的重发通知映射到同一个键。

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(app_id: &str, content: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        app_id.hash(&mut hasher);
        normalize_content(content).hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    pub fn from_raw(raw: u64) -> Self {
        Fingerprint(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 折叠空白并转为小写
pub fn normalize_content(content: &str) -> String {
    content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
