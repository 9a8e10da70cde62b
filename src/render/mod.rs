//! 朗读文本渲染
//!
//! - `template`: 占位符替换与多样化措辞
//! - `cap`: 按词数 / 句数 / 时长截断结果

pub mod cap;
pub mod template;

pub use cap::{apply_cap, split_sentences, time_limit_words, WORDS_PER_SECOND};
pub use template::{render, render_template, render_with_rng, VARIED_TEMPLATES};

use crate::config::PolicyConfig;
use crate::notification::NotificationEvent;

/// Render `event` with the policy's template, then cap the result
pub fn render_utterance(event: &NotificationEvent, config: &PolicyConfig) -> String {
    apply_cap(&render(event, &config.template), config.content_cap)
}
