//! `readout run`: replay a script against a live engine

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use super::script::{parse_script, ScriptStep};
use super::speaker::{LoggingSpeech, PlaybackEvent};
use crate::config::{ConfigStore, PolicyConfig};
use crate::engine::{Collaborators, Engine, EngineHandle, Phase};

/// Snapshot polling interval while waiting for speech to drain
const DRAIN_POLL: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct RunArgs {
    /// Config file (default: ~/.config/notification-readout/config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// JSON-lines script, "-" for stdin
    #[arg(long, short, default_value = "-")]
    pub events: String,
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    let (config, violations) = match &args.config {
        Some(path) => PolicyConfig::load_strict(path)?,
        None => PolicyConfig::load(None),
    };
    if !violations.is_empty() {
        warn!(count = violations.len(), "Config values were normalized");
    }

    let steps = if args.events == "-" {
        parse_script(io::stdin().lock())?
    } else {
        let file = File::open(&args.events)
            .with_context(|| format!("failed to open script {}", args.events))?;
        parse_script(BufReader::new(file))?
    };
    info!(steps = steps.len(), "Replaying script");

    let store = ConfigStore::new(config);
    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
    let speech = Arc::new(LoggingSpeech::new(playback_tx));
    let (engine, task) = Engine::spawn(&store, Collaborators::new(speech));

    let mut outcomes = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => println!("{outcome}"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Outcome printer lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let forwarder = {
        let engine = engine.clone();
        tokio::spawn(async move {
            while let Some(event) = playback_rx.recv().await {
                let sent = match event {
                    PlaybackEvent::Finished(handle) => engine.playback_finished(handle).await,
                    PlaybackEvent::Stopped(handle) => engine.playback_stopped(handle).await,
                };
                if sent.is_err() {
                    break;
                }
            }
        })
    };

    for step in steps {
        apply_step(&engine, step).await?;
    }
    wait_until_drained(&engine).await?;

    engine.shutdown();
    task.await.context("engine task failed")?;
    forwarder.abort();
    let _ = forwarder.await;
    drop(engine);
    let _ = printer.await;
    Ok(())
}

async fn apply_step(engine: &EngineHandle, step: ScriptStep) -> Result<()> {
    match step {
        ScriptStep::Notify(event) => engine.notify(event).await?,
        ScriptStep::Dismiss {
            app_id,
            title,
            text,
        } => {
            let fingerprint = ScriptStep::dismissed_fingerprint(&app_id, &title, &text);
            engine.dismissed(fingerprint).await?
        }
        ScriptStep::Sensor { sample } => engine.sensor(sample).await?,
        ScriptStep::Device(state) => engine.set_device_state(state).await?,
        ScriptStep::Wait { ms } => tokio::time::sleep(ScriptStep::wait_duration(ms)).await,
        ScriptStep::GestureTest { gesture } => {
            if let Err(e) = engine.start_gesture_test(gesture).await {
                warn!(gesture = %gesture, error = %e, "Gesture test refused");
            }
        }
        ScriptStep::Cancel => engine.cancel_all().await?,
        ScriptStep::Snapshot => {
            let snapshot = engine.snapshot().await?;
            println!(
                "snapshot  {} speaking={} queue={:?} pending={}",
                snapshot.phase,
                snapshot.speaking_app().unwrap_or("-"),
                snapshot.queued_apps(),
                snapshot
                    .pending
                    .as_ref()
                    .map(|item| item.app_id.as_str())
                    .unwrap_or("-"),
            );
        }
    }
    Ok(())
}

async fn wait_until_drained(engine: &EngineHandle) -> Result<()> {
    loop {
        let snapshot = engine.snapshot().await?;
        if snapshot.phase == Phase::Idle && snapshot.queue.is_empty() && snapshot.pending.is_none() {
            return Ok(());
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
