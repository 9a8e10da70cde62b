//! `readout check-config`: load, normalize and print a policy file

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::output::{format_json, format_violations};
use crate::config::PolicyConfig;

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Config file (default: ~/.config/notification-readout/config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

pub fn handle_check_config(args: CheckConfigArgs) -> Result<()> {
    let path = args.config.unwrap_or_else(PolicyConfig::default_path);
    let (config, violations) = if path.exists() {
        PolicyConfig::load_strict(&path)?
    } else {
        println!("{} does not exist, showing defaults", path.display());
        (PolicyConfig::default(), Vec::new())
    };

    println!("{}", format_json(&config));
    println!("{}", format_violations(&violations));
    Ok(())
}
