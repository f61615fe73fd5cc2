//! Tasks and experiments for neural data structure controllers
//!
//! A [`Task`] produces batches of token sequences with masked targets and
//! knows how to run a full experiment on them. The trainer unrolls a
//! controller over every batch, adds the structure's regularization loss to
//! the task loss, and updates the network with Adam.
//!
//! # Architecture
//!
//! ```text
//! Registry ─→ TaskConfig ─→ Task::sample_batch ─→ Batch
//!                                                   ↓
//!                        Controller::run_sequence (Autodiff<NdArray>)
//!                                                   ↓
//!                      cross-entropy + reg loss ─→ Adam ─→ ExperimentReport
//! ```

use rand::rngs::StdRng;
use stacknn_core::Result;

mod batch;
mod config;
mod registry;
mod report;
mod sequence;
mod trainer;

pub use batch::Batch;
pub use config::{SequenceKind, TaskConfig};
pub use registry::{copy_config, reverse_config, reverse_reg_config, Registry, TaskConstructor};
pub use report::{EpochRecord, ExperimentReport};
pub use sequence::SequenceTask;
pub use trainer::{run_experiment, TrainBackend, Trainer};

/// A source of training data with its own experiment entry point
pub trait Task {
    /// Registered name, e.g. `ReverseTask`
    fn name(&self) -> &str;

    fn config(&self) -> &TaskConfig;

    /// Width of one input vector fed to the controller
    fn input_size(&self) -> usize;

    /// Number of output classes
    fn output_size(&self) -> usize;

    /// Draw a fresh batch.
    fn sample_batch(&self, rng: &mut StdRng) -> Batch;

    /// Sample, train and report according to the task's configuration.
    fn run_experiment(&self) -> Result<ExperimentReport> {
        run_experiment(self)
    }
}
