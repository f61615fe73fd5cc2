//! Weighted vector list shared by the stack and the queue

use burn::prelude::*;
use burn::tensor::activation::relu;
use stacknn_core::{Error, Result};

/// Which end pops and reads touch first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum End {
    /// Most recent entry first
    Newest,
    /// Oldest entry first
    Oldest,
}

/// Batched list of `(vector, strength)` entries
///
/// Entry `i` holds a `[batch, read_size]` value and a `[batch, 1]` strength.
/// Entries are never removed, a pop only drains strength, so the graph
/// keeps every value that may still contribute to a read.
#[derive(Debug, Clone)]
pub(crate) struct WeightedStore<B: Backend> {
    values: Vec<Tensor<B, 2>>,
    strengths: Vec<Tensor<B, 2>>,
    batch_size: usize,
    read_size: usize,
    device: B::Device,
}

impl<B: Backend> WeightedStore<B> {
    pub fn new(batch_size: usize, read_size: usize, device: &B::Device) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidDimension {
                what: "batch size",
                expected: 1,
                got: 0,
            });
        }
        if read_size == 0 {
            return Err(Error::InvalidDimension {
                what: "read size",
                expected: 1,
                got: 0,
            });
        }

        Ok(Self {
            values: Vec::new(),
            strengths: Vec::new(),
            batch_size,
            read_size,
            device: device.clone(),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn read_size(&self) -> usize {
        self.read_size
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    fn indices(&self, end: End) -> Box<dyn Iterator<Item = usize>> {
        match end {
            End::Newest => Box::new((0..self.values.len()).rev()),
            End::Oldest => Box::new(0..self.values.len()),
        }
    }

    /// Append an entry at the newest end.
    pub fn push(&mut self, value: Tensor<B, 2>, strength: Tensor<B, 2>) {
        self.values.push(value);
        self.strengths.push(strength);
    }

    /// Drain up to `strength` of weight, starting at `end`.
    ///
    /// `s_i <- relu(s_i - r)`, `r <- relu(r - s_i)` with `r` starting at
    /// the pop strength.
    pub fn pop(&mut self, strength: Tensor<B, 2>, end: End) {
        let mut remaining = strength;
        for i in self.indices(end) {
            let old = self.strengths[i].clone();
            self.strengths[i] = relu(old.clone() - remaining.clone());
            remaining = relu(remaining - old);
        }
    }

    /// Unit-strength summary of the entries nearest `end`.
    ///
    /// Each entry contributes `min(s_i, relu(1 - used))` of its vector,
    /// where `used` is the strength of the entries read before it.
    pub fn read(&self, end: End) -> Tensor<B, 2> {
        let mut summary = Tensor::zeros([self.batch_size, self.read_size], &self.device);
        let mut used = Tensor::<B, 2>::zeros([self.batch_size, 1], &self.device);

        for i in self.indices(end) {
            let strength = self.strengths[i].clone();
            let available = relu(used.clone().neg().add_scalar(1.0));
            let weight = soft_min(strength.clone(), available);
            summary = summary + self.values[i].clone() * weight;
            used = used + strength;
        }

        summary
    }

    /// Per-entry strengths, oldest first
    #[cfg(test)]
    pub fn strengths(&self) -> &[Tensor<B, 2>] {
        &self.strengths
    }
}

/// `min(a, b)` written with relu so it stays in the autodiff graph
fn soft_min<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
    a.clone() - relu(a - b)
}
