//! Backend-independent training batches

use burn::prelude::*;
use burn::tensor::TensorData;

/// One batch of token sequences, flattened row-major over `(batch, time)`
///
/// Positions with a zero mask take no part in the loss or accuracy; their
/// target is a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_size: usize,
    pub time: usize,
    pub inputs: Vec<usize>,
    pub targets: Vec<usize>,
    pub mask: Vec<f32>,
}

impl Batch {
    /// Number of scored positions
    pub fn scored(&self) -> usize {
        self.mask.iter().filter(|&&m| m > 0.0).count()
    }

    /// One-hot inputs, `[batch, time, vocab_size]`
    pub fn input_tensor<B: Backend>(&self, vocab_size: usize, device: &B::Device) -> Tensor<B, 3> {
        let mut one_hot = vec![0.0f32; self.inputs.len() * vocab_size];
        for (position, &token) in self.inputs.iter().enumerate() {
            one_hot[position * vocab_size + token] = 1.0;
        }
        Tensor::from_data(
            TensorData::new(one_hot, [self.batch_size, self.time, vocab_size]),
            device,
        )
    }

    /// Target symbols, `[batch * time]`
    pub fn target_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1, Int> {
        let targets: Vec<i64> = self.targets.iter().map(|&t| t as i64).collect();
        Tensor::from_data(TensorData::new(targets, [self.targets.len()]), device)
    }

    /// Loss mask, `[batch * time]`
    pub fn mask_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::from_data(TensorData::new(self.mask.clone(), [self.mask.len()]), device)
    }
}
