//! Notification Readout CLI
//!
//! 回放通知脚本、渲染模板、校验策略文件

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use notification_readout::cli::{
    handle_check_config, handle_render, handle_run, CheckConfigArgs, RenderArgs, RunArgs,
};

#[derive(Parser)]
#[command(name = "readout")]
#[command(about = "Notification readout arbitration engine")]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines script of notifications, gestures and waits
    Run(RunArgs),
    /// Render one notification with a template
    Render(RenderArgs),
    /// Load a policy file and show the normalized result
    CheckConfig(CheckConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins, e.g. RUST_LOG=debug readout run
    let default_filter = if cli.verbose {
        "notification_readout=debug,readout=debug"
    } else {
        "notification_readout=info,readout=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run(args) => handle_run(args).await?,
        Commands::Render(args) => handle_render(args)?,
        Commands::CheckConfig(args) => handle_check_config(args)?,
    }
    Ok(())
}
