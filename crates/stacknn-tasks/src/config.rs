//! Experiment configuration

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use stacknn_core::{Error, NetworkType, StructType};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which transformation a sequence task asks the controller to learn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequenceKind {
    /// Emit the input in reverse order (stack-friendly)
    #[default]
    Reverse,
    /// Emit the input in the same order (queue-friendly)
    Copy,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 2] = [SequenceKind::Reverse, SequenceKind::Copy];

    pub fn name(&self) -> &'static str {
        match self {
            SequenceKind::Reverse => "reverse",
            SequenceKind::Copy => "copy",
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SequenceKind {
    type Err = Error;

    fn from_str(s: &str) -> stacknn_core::Result<Self> {
        SequenceKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Unregistered {
                kind: "sequence task",
                name: s.to_string(),
            })
    }
}

/// Hyper-parameters of one experiment
#[derive(Config, Debug)]
pub struct TaskConfig {
    #[config(default = "SequenceKind::Reverse")]
    pub kind: SequenceKind,
    /// Number of distinct symbols in a sequence
    #[config(default = 2)]
    pub alphabet_size: usize,
    #[config(default = 1)]
    pub min_length: usize,
    #[config(default = 12)]
    pub max_length: usize,
    #[config(default = 10)]
    pub batch_size: usize,
    #[config(default = 30)]
    pub epochs: usize,
    #[config(default = 20)]
    pub batches_per_epoch: usize,
    /// Batches scored after every epoch
    #[config(default = 5)]
    pub validation_batches: usize,
    #[config(default = 0.01)]
    pub learning_rate: f64,
    #[config(default = 2)]
    pub read_size: usize,
    #[config(default = 10)]
    pub hidden_size: usize,
    #[config(default = "StructType::Stack")]
    pub struct_type: StructType,
    #[config(default = "NetworkType::Linear")]
    pub network_type: NetworkType,
    #[config(default = 0.0)]
    pub push_reg_weight: f32,
    #[config(default = 0.0)]
    pub pop_reg_weight: f32,
    #[config(default = 42)]
    pub seed: u64,
    /// Checkpoint to restore before training
    #[config(default = "None")]
    pub load_path: Option<String>,
    /// Where to write the trained network
    #[config(default = "None")]
    pub save_path: Option<String>,
    /// Log per-step instructions of one sample after training
    #[config(default = false)]
    pub trace: bool,
}

impl TaskConfig {
    pub fn validate(&self) -> stacknn_core::Result<()> {
        for (what, size) in [
            ("alphabet size", self.alphabet_size),
            ("minimum length", self.min_length),
            ("batch size", self.batch_size),
            ("read size", self.read_size),
            ("hidden size", self.hidden_size),
        ] {
            if size == 0 {
                return Err(Error::InvalidDimension {
                    what,
                    expected: 1,
                    got: 0,
                });
            }
        }
        if self.max_length < self.min_length {
            return Err(Error::Config(format!(
                "maximum length {} is below minimum length {}",
                self.max_length, self.min_length
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::Config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Read a configuration written with `save` or by hand.
    pub fn from_file(path: impl AsRef<Path>) -> stacknn_core::Result<Self> {
        let path = path.as_ref();
        let config = Self::load(path)
            .map_err(|e| Error::Config(format!("cannot load {}: {e:?}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Width of one-hot input vectors: every symbol plus the blank
    pub fn input_size(&self) -> usize {
        self.alphabet_size + 1
    }

    /// Token fed while the controller is expected to answer
    pub fn blank_token(&self) -> usize {
        self.alphabet_size
    }
}
