//! 模板渲染: 通知事件 + 模板 -> 朗读文本
//!
//! 支持的占位符:
//! `{app} {package} {content} {title} {text} {bigtext} {summary} {info}
//! {ticker} {time} {date} {timestamp} {priority} {category} {channel}`.
//!
//! 替换为单次从左到右扫描，来自通知的文本不会再被当作占位符解析。
//! 未知占位符原样保留。

use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::Local;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};

use crate::config::SpeechTemplate;
use crate::notification::NotificationEvent;

/// Phrasings picked from when the template is `Varied`
pub const VARIED_TEMPLATES: [&str; 8] = [
    "{app} notified you: {content}",
    "{app} says: {content}",
    "Notification from {app}: {content}",
    "New from {app}. {content}",
    "You have a notification from {app}: {content}",
    "{app} reports: {content}",
    "Message from {app}: {content}",
    "Update from {app}: {content}",
];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z]+)\}").expect("placeholder regex is valid"))
}

/// Value for a placeholder name, `None` if the name is not a placeholder
fn placeholder_value<'a>(event: &'a NotificationEvent, name: &str) -> Option<Cow<'a, str>> {
    let local = event.timestamp.with_timezone(&Local);
    let value = match name {
        "app" => Cow::Borrowed(event.display_name()),
        "package" => Cow::Borrowed(event.app_id.as_str()),
        "content" => Cow::Owned(event.content()),
        "title" => Cow::Borrowed(event.title.as_str()),
        "text" => Cow::Borrowed(event.text.as_str()),
        "bigtext" => Cow::Borrowed(event.big_text.as_str()),
        "summary" => Cow::Borrowed(event.summary.as_str()),
        "info" => Cow::Borrowed(event.info.as_str()),
        "ticker" => Cow::Borrowed(event.ticker.as_str()),
        "time" => Cow::Owned(local.format("%H:%M").to_string()),
        "date" => Cow::Owned(local.format("%Y-%m-%d").to_string()),
        "timestamp" => Cow::Owned(local.format("%Y-%m-%d %H:%M:%S").to_string()),
        "priority" => Cow::Borrowed(event.priority.as_str()),
        "category" => Cow::Borrowed(event.category.as_str()),
        "channel" => Cow::Borrowed(event.channel_id.as_str()),
        _ => return None,
    };
    Some(value)
}

/// Substitute placeholders in a literal template string
pub fn render_template(event: &NotificationEvent, template: &str) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            match placeholder_value(event, &caps[1]) {
                Some(value) => value.into_owned(),
                None => caps[0].to_string(),
            }
        })
        .trim()
        .to_string()
}

/// Render with the thread RNG for `Varied` templates
pub fn render(event: &NotificationEvent, template: &SpeechTemplate) -> String {
    render_with_rng(event, template, &mut rand::thread_rng())
}

/// Render, drawing a fresh phrasing from `rng` on every `Varied` call
pub fn render_with_rng<R: Rng + ?Sized>(
    event: &NotificationEvent,
    template: &SpeechTemplate,
    rng: &mut R,
) -> String {
    match template {
        SpeechTemplate::Fixed(t) => render_template(event, t),
        SpeechTemplate::Varied => {
            let chosen = VARIED_TEMPLATES
                .choose(rng)
                .copied()
                .unwrap_or(VARIED_TEMPLATES[0]);
            render_template(event, chosen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn sample_event() -> NotificationEvent {
        NotificationEvent::builder("com.chat")
            .app_name("Chat")
            .title("Alice")
            .text("Lunch at noon?")
            .big_text("Lunch at noon? The usual place.")
            .summary("1 new message")
            .info("work")
            .ticker("Alice: Lunch")
            .priority(Priority::High)
            .category("msg")
            .channel_id("direct")
            .timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
            .build()
    }

    #[test]
    fn test_all_text_placeholders() {
        let event = sample_event();
        let out = render_template(
            &event,
            "{app}|{package}|{title}|{text}|{bigtext}|{summary}|{info}|{ticker}|{priority}|{category}|{channel}",
        );
        assert_eq!(
            out,
            "Chat|com.chat|Alice|Lunch at noon?|Lunch at noon? The usual place.|1 new message|work|Alice: Lunch|high|msg|direct"
        );
    }

    #[test]
    fn test_content_placeholder() {
        let event = sample_event();
        assert_eq!(
            render_template(&event, "{app}: {content}"),
            "Chat: Alice. Lunch at noon?"
        );
    }

    #[test]
    fn test_time_placeholders_are_substituted() {
        let event = sample_event();
        let out = render_template(&event, "{time} {date} {timestamp}");
        assert!(!out.contains('{'));
        let expected_date = event.timestamp.with_timezone(&Local).format("%Y-%m-%d").to_string();
        assert!(out.contains(&expected_date));
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let event = NotificationEvent::builder("com.chat")
            .title("{text}")
            .text("secret")
            .build();
        assert_eq!(render_template(&event, "{title}"), "{text}");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let event = sample_event();
        assert_eq!(render_template(&event, "{app} {nope}"), "Chat {nope}");
    }

    #[test]
    fn test_fixed_render_is_idempotent() {
        let event = sample_event();
        let template = SpeechTemplate::Fixed("{app} at {time}: {content}".into());
        assert_eq!(render(&event, &template), render(&event, &template));
    }

    #[test]
    fn test_varied_covers_whole_catalog() {
        let event = sample_event();
        let mut rng = StdRng::seed_from_u64(7);
        let expected: HashSet<String> = VARIED_TEMPLATES
            .iter()
            .map(|t| render_template(&event, t))
            .collect();

        let seen: HashSet<String> = (0..1000)
            .map(|_| render_with_rng(&event, &SpeechTemplate::Varied, &mut rng))
            .collect();

        assert_eq!(seen, expected);
    }

    #[test]
    fn test_varied_with_thread_rng_stays_in_catalog() {
        let event = sample_event();
        let expected: HashSet<String> = VARIED_TEMPLATES
            .iter()
            .map(|t| render_template(&event, t))
            .collect();
        for _ in 0..50 {
            assert!(expected.contains(&render(&event, &SpeechTemplate::Varied)));
        }
    }
}
