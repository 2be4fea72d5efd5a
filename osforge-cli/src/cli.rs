//! Top-level command definition and dispatch.

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "osforge",
    version,
    about = "Disk layout and OS image provisioning for virtualization hosts"
)]
pub struct Cli {
    /// Log filter directive, e.g. "debug" or "osforge=trace" (RUST_LOG wins)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a disk layout and preview the result without touching hardware
    Plan(commands::plan::PlanArgs),
    /// Partition, format and install an OS onto real block devices
    Provision(commands::provision::ProvisionArgs),
    /// Show the orchestrator environment as this process sees it
    Env(commands::env::EnvArgs),
}

impl Cli {
    /// Default log directive: `--log-level` if given, else `debug`
    /// when the orchestrator set `DEBUG_LEVEL` to 1 or higher.
    pub fn log_directive(&self) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match std::env::var("DEBUG_LEVEL")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            Some(level) if level >= 1 => "debug".to_string(),
            _ => "info".to_string(),
        }
    }

    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Plan(args) => commands::plan::execute(args),
            Command::Provision(args) => commands::provision::execute(args),
            Command::Env(args) => commands::env::execute(args),
        }
    }
}
