//! `readout render`: render one event with a template and optional cap

use anyhow::{anyhow, Context, Result};
use clap::Args;

use crate::config::policy::DEFAULT_TEMPLATE;
use crate::config::{ContentCap, SpeechTemplate};
use crate::notification::NotificationEvent;
use crate::render::{apply_cap, render};

#[derive(Args)]
pub struct RenderArgs {
    /// Template with {placeholders}, or "Varied"
    #[arg(long, short, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Notification event as JSON
    #[arg(long, short)]
    pub event: String,

    /// words:N, sentences:N, seconds:N or disabled
    #[arg(long, value_parser = parse_cap, default_value = "disabled")]
    pub cap: ContentCap,
}

pub fn parse_cap(value: &str) -> Result<ContentCap> {
    if value == "disabled" {
        return Ok(ContentCap::Disabled);
    }
    let (mode, limit) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("expected MODE:N, got {value}"))?;
    let limit: u32 = limit
        .parse()
        .with_context(|| format!("invalid cap limit {limit}"))?;
    match mode {
        "words" => Ok(ContentCap::Words(limit)),
        "sentences" => Ok(ContentCap::Sentences(limit)),
        "seconds" => Ok(ContentCap::TimeLimit(limit)),
        other => Err(anyhow!("unknown cap mode {other}")),
    }
}

pub fn handle_render(args: RenderArgs) -> Result<()> {
    let event: NotificationEvent =
        serde_json::from_str(&args.event).context("invalid event JSON")?;
    let template = SpeechTemplate::from(args.template);
    println!("{}", apply_cap(&render(&event, &template), args.cap));
    Ok(())
}
