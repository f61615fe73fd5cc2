//! String transduction tasks over a small alphabet
//!
//! A sample of length `n` is laid out over `2 * max_length` steps:
//!
//! ```text
//! input   x1 x2 .. xn  _  _ ..  _   _ .. _
//! target   -  - ..  -  y1 y2 .. yn  - .. -
//! ```
//!
//! `_` is the blank token and `-` marks unscored positions. `y` is `x`
//! reversed for [`SequenceKind::Reverse`] and `x` itself for
//! [`SequenceKind::Copy`].

use rand::rngs::StdRng;
use rand::Rng;
use stacknn_core::Result;

use crate::batch::Batch;
use crate::config::{SequenceKind, TaskConfig};
use crate::Task;

/// Reverse or copy a random string
#[derive(Debug, Clone)]
pub struct SequenceTask {
    name: String,
    config: TaskConfig,
}

impl SequenceTask {
    pub fn new(config: TaskConfig) -> Result<Self> {
        config.validate()?;
        let name = match config.kind {
            SequenceKind::Reverse => "ReverseTask",
            SequenceKind::Copy => "CopyTask",
        };
        Ok(Self {
            name: name.to_string(),
            config,
        })
    }

    pub fn kind(&self) -> SequenceKind {
        self.config.kind
    }

    /// Steps per sample, long enough for the longest string and its answer
    pub fn time_steps(&self) -> usize {
        2 * self.config.max_length
    }

    fn sample_row(&self, rng: &mut StdRng, row: usize, batch: &mut Batch) {
        let length = rng.gen_range(self.config.min_length..=self.config.max_length);
        let symbols: Vec<usize> = (0..length)
            .map(|_| rng.gen_range(0..self.config.alphabet_size))
            .collect();
        let answer: Vec<usize> = match self.config.kind {
            SequenceKind::Reverse => symbols.iter().rev().copied().collect(),
            SequenceKind::Copy => symbols.clone(),
        };

        let offset = row * batch.time;
        for (t, &symbol) in symbols.iter().enumerate() {
            batch.inputs[offset + t] = symbol;
        }
        for (t, &symbol) in answer.iter().enumerate() {
            batch.targets[offset + length + t] = symbol;
            batch.mask[offset + length + t] = 1.0;
        }
    }
}

impl Task for SequenceTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &TaskConfig {
        &self.config
    }

    fn input_size(&self) -> usize {
        self.config.input_size()
    }

    fn output_size(&self) -> usize {
        self.config.alphabet_size
    }

    fn sample_batch(&self, rng: &mut StdRng) -> Batch {
        let batch_size = self.config.batch_size;
        let time = self.time_steps();
        let mut batch = Batch {
            batch_size,
            time,
            inputs: vec![self.config.blank_token(); batch_size * time],
            targets: vec![0; batch_size * time],
            mask: vec![0.0; batch_size * time],
        };
        for row in 0..batch_size {
            self.sample_row(rng, row, &mut batch);
        }
        batch
    }
}
