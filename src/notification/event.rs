//! 通知事件
//!
//! 每条发出的通知对应一个 `NotificationEvent`。事件不可变，由引擎消费一次；
//! 只有派生状态 (冷却时间戳、指纹) 会比事件存活得更久。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;

/// Notification priority as reported by the platform (-2..=2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Max,
}

impl Priority {
    /// Map a raw platform level; out-of-range levels saturate
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=-2 => Priority::Min,
            -1 => Priority::Low,
            0 => Priority::Default,
            1 => Priority::High,
            _ => Priority::Max,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Max => "max",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A posted notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Source package id
    pub app_id: String,
    /// Human readable app name
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub big_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub channel_id: String,
}

impl NotificationEvent {
    pub fn new(app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            app_name: app_id.clone(),
            app_id,
            title: String::new(),
            text: String::new(),
            big_text: String::new(),
            summary: String::new(),
            info: String::new(),
            ticker: String::new(),
            timestamp: Utc::now(),
            priority: Priority::Default,
            category: String::new(),
            channel_id: String::new(),
        }
    }

    /// Title and text joined when both are present, otherwise whichever is
    pub fn content(&self) -> String {
        let title = self.title.trim();
        let text = self.text.trim();
        match (title.is_empty(), text.is_empty()) {
            (false, false) => format!("{title}. {text}"),
            (false, true) => title.to_string(),
            (true, false) => text.to_string(),
            (true, true) => String::new(),
        }
    }

    /// Display name, falling back to the package id
    pub fn display_name(&self) -> &str {
        if self.app_name.trim().is_empty() {
            &self.app_id
        } else {
            &self.app_name
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.app_id, &self.content())
    }

    pub fn builder(app_id: impl Into<String>) -> NotificationEventBuilder {
        NotificationEventBuilder::new(app_id)
    }
}

/// Builder for events, mostly used by sources and tests
#[derive(Debug)]
pub struct NotificationEventBuilder {
    event: NotificationEvent,
}

impl NotificationEventBuilder {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            event: NotificationEvent::new(app_id),
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.event.app_name = name.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.event.title = title.into();
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.event.text = text.into();
        self
    }

    pub fn big_text(mut self, big_text: impl Into<String>) -> Self {
        self.event.big_text = big_text.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.event.summary = summary.into();
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.event.info = info.into();
        self
    }

    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.event.ticker = ticker.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.event.priority = priority;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.event.category = category.into();
        self
    }

    pub fn channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.event.channel_id = channel_id.into();
        self
    }

    pub fn build(self) -> NotificationEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_combines_title_and_text() {
        let event = NotificationEvent::builder("com.chat")
            .title("Alice")
            .text("Lunch at noon?")
            .build();
        assert_eq!(event.content(), "Alice. Lunch at noon?");
    }

    #[test]
    fn test_content_single_field() {
        let title_only = NotificationEvent::builder("com.chat").title("Alice").build();
        assert_eq!(title_only.content(), "Alice");

        let text_only = NotificationEvent::builder("com.chat").text("  hi  ").build();
        assert_eq!(text_only.content(), "hi");

        assert_eq!(NotificationEvent::new("com.chat").content(), "");
    }

    #[test]
    fn test_display_name_fallback() {
        let event = NotificationEvent::builder("com.chat").app_name("").build();
        assert_eq!(event.display_name(), "com.chat");

        let named = NotificationEvent::builder("com.chat").app_name("Chat").build();
        assert_eq!(named.display_name(), "Chat");
    }

    #[test]
    fn test_priority_from_level() {
        assert_eq!(Priority::from_level(-5), Priority::Min);
        assert_eq!(Priority::from_level(-1), Priority::Low);
        assert_eq!(Priority::from_level(0), Priority::Default);
        assert_eq!(Priority::from_level(1), Priority::High);
        assert_eq!(Priority::from_level(7), Priority::Max);
        assert_eq!(Priority::High.to_string(), "high");
    }

    #[test]
    fn test_event_from_minimal_json() {
        let event: NotificationEvent =
            serde_json::from_str(r#"{"app_id": "com.mail", "title": "New mail"}"#).unwrap();
        assert_eq!(event.app_id, "com.mail");
        assert_eq!(event.priority, Priority::Default);
        assert_eq!(event.content(), "New mail");
    }

    #[test]
    fn test_fingerprint_ignores_non_content_fields() {
        let a = NotificationEvent::builder("com.chat")
            .title("Alice")
            .text("hi")
            .category("msg")
            .build();
        let b = NotificationEvent::builder("com.chat")
            .title("Alice")
            .text("hi")
            .ticker("different")
            .build();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
