//! StackNN experiment runner
//!
//! ```text
//! stacknn ReverseTask
//! stacknn CopyTask --config copy_config --controller LSTMController
//! stacknn ReverseTask --config reverse_reg_config --savepath reverse --trace
//! ```

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use stacknn_tasks::Registry;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = Registry::builtin();
    let (constructor, config) = cli.resolve(&registry)?;
    tracing::debug!(config = %config, "resolved configuration");

    let task = constructor(config)?;
    let report = task
        .run_experiment()
        .with_context(|| format!("{} failed", task.name()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
