//! Per-batch input and output buffers

use burn::prelude::*;
use stacknn_core::{Error, Result};
use std::collections::VecDeque;

/// Input vectors for one batch, consumed front to back
#[derive(Debug, Clone)]
pub struct InputBuffer<B: Backend> {
    steps: VecDeque<Tensor<B, 2>>,
    batch_size: usize,
    input_size: usize,
}

impl<B: Backend> InputBuffer<B> {
    /// Split a `[batch, time, input_size]` tensor into per-step vectors.
    pub fn from_sequence(xs: Tensor<B, 3>) -> Self {
        let [batch_size, time, input_size] = xs.dims();
        let steps = (0..time)
            .map(|t| {
                xs.clone()
                    .slice([0..batch_size, t..t + 1, 0..input_size])
                    .reshape([batch_size, input_size])
            })
            .collect();

        Self {
            steps,
            batch_size,
            input_size,
        }
    }

    /// Empty buffer, for runs driven purely by generation
    pub fn empty(batch_size: usize, input_size: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            batch_size,
            input_size,
        }
    }

    /// Next input vector, `[batch, input_size]`
    pub fn pop_front(&mut self) -> Option<Tensor<B, 2>> {
        self.steps.pop_front()
    }

    /// Number of steps left
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

/// Output vectors produced so far, in time order
#[derive(Debug, Clone)]
pub struct OutputBuffer<B: Backend> {
    outputs: Vec<Tensor<B, 2>>,
}

impl<B: Backend> Default for OutputBuffer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> OutputBuffer<B> {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
        }
    }

    pub fn push(&mut self, output: Tensor<B, 2>) {
        self.outputs.push(output);
    }

    pub fn last(&self) -> Option<&Tensor<B, 2>> {
        self.outputs.last()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn as_slice(&self) -> &[Tensor<B, 2>] {
        &self.outputs
    }

    /// All outputs as one `[batch, time, output_size]` tensor
    pub fn stacked(&self) -> Result<Tensor<B, 3>> {
        if self.outputs.is_empty() {
            return Err(Error::Config(
                "cannot stack an empty output buffer".to_string(),
            ));
        }
        Ok(Tensor::stack(self.outputs.clone(), 1))
    }
}
