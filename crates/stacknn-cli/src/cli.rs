//! Command-line argument parsing for the experiment runner.

use clap::Parser;
use stacknn_core::Result;
use stacknn_tasks::{Registry, TaskConfig, TaskConstructor};

/// Train a controller with a neural data structure on a registered task.
#[derive(Parser, Debug)]
#[command(name = "stacknn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Registered task name, e.g. ReverseTask
    pub task: String,

    /// Registered configuration name or path to a JSON configuration
    #[arg(long)]
    pub config: Option<String>,

    /// Checkpoint to load before training
    #[arg(long)]
    pub loadpath: Option<String>,

    /// Where to save the trained network
    #[arg(long)]
    pub savepath: Option<String>,

    /// Registered controller name overriding the configuration
    #[arg(long)]
    pub controller: Option<String>,

    /// Log the instructions of one sample after training
    #[arg(long)]
    pub trace: bool,
}

impl Cli {
    /// Look up every name and fold the overrides into the configuration.
    pub fn resolve(&self, registry: &Registry) -> Result<(TaskConstructor, TaskConfig)> {
        let constructor = registry.task(&self.task)?;
        let mut config = registry.resolve_config(self.config.as_deref())?;

        if let Some(name) = &self.controller {
            config.network_type = registry.controller(name)?;
        }
        if let Some(path) = &self.loadpath {
            config.load_path = Some(path.clone());
        }
        if let Some(path) = &self.savepath {
            config.save_path = Some(path.clone());
        }
        if self.trace {
            config.trace = true;
        }

        Ok((constructor, config))
    }
}
