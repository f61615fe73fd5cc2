//! Differentiable neural data structures
//!
//! A neural data structure holds a batch of weighted vector lists. Push and
//! pop are continuous: each carries a strength in `[0, 1]`, and a pop only
//! removes as much weight as its strength allows. Every operation is built
//! from tensor arithmetic on the backend, so gradients flow from a read back
//! to every push that contributed to it.
//!
//! # Architecture
//!
//! ```text
//! ControlSignals (push, pop, value)
//!            ↓
//!      Struct::apply  ──→ RegTracker (penalty per operation)
//!            ↓
//!      Struct::read   ──→ read vector for the next step
//! ```
//!
//! Both [`Stack`] and [`Queue`] keep their entries in a shared weighted
//! store and differ only in which end they pop and read from, plus the
//! penalty they report to the [`RegTracker`].

use burn::prelude::*;
use stacknn_core::{Error, Operation, Result, StructType};
use tracing::trace;

mod queue;
mod regularization;
mod stack;
mod store;

pub use queue::Queue;
pub use regularization::{RegBinding, RegTracker};
pub use stack::Stack;

/// Instructions emitted by a controller network for one time step
#[derive(Debug, Clone)]
pub struct ControlSignals<B: Backend> {
    /// Push strength, `[batch, 1]`
    pub push: Tensor<B, 2>,
    /// Pop strength, `[batch, 1]`
    pub pop: Tensor<B, 2>,
    /// Candidate vector to push, `[batch, read_size]`
    pub value: Tensor<B, 2>,
}

impl<B: Backend> ControlSignals<B> {
    pub fn new(push: Tensor<B, 2>, pop: Tensor<B, 2>, value: Tensor<B, 2>) -> Self {
        Self { push, pop, value }
    }

    /// Same push and pop strength for every batch element
    pub fn uniform(push: f32, pop: f32, value: Tensor<B, 2>) -> Self {
        let [batch_size, _] = value.dims();
        let device = value.device();
        Self {
            push: Tensor::full([batch_size, 1], push, &device),
            pop: Tensor::full([batch_size, 1], pop, &device),
            value,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.value.dims()[0]
    }

    /// Reject signals that do not fit a `[batch_size, read_size]` structure.
    pub fn check(&self, batch_size: usize, read_size: usize) -> Result<()> {
        let value = self.value.dims();
        if value != [batch_size, read_size] {
            return Err(Error::shape("push value", &[batch_size, read_size], &value));
        }
        let push = self.push.dims();
        if push != [batch_size, 1] {
            return Err(Error::shape("push strength", &[batch_size, 1], &push));
        }
        let pop = self.pop.dims();
        if pop != [batch_size, 1] {
            return Err(Error::shape("pop strength", &[batch_size, 1], &pop));
        }
        Ok(())
    }
}

/// Capability set shared by every neural data structure
pub trait Struct<B: Backend> {
    /// Which variant this is
    fn struct_type(&self) -> StructType;

    fn batch_size(&self) -> usize;

    /// Dimensionality of every stored vector
    fn read_size(&self) -> usize;

    /// Number of entries pushed so far, including fully popped ones
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach the tracker that receives regularization penalties.
    fn set_reg_tracker(&mut self, tracker: RegTracker<B>);

    /// Set the coefficient applied to one operation's penalty.
    fn set_reg_weight(&mut self, operation: Operation, weight: f32) -> Result<()>;

    fn reg_weight(&self, operation: Operation) -> f32;

    /// Pop, then push, according to `signals`, and charge the tracker.
    fn apply(&mut self, signals: &ControlSignals<B>) -> Result<()>;

    /// Strength-weighted summary of the visible end, `[batch, read_size]`
    fn read(&self) -> Tensor<B, 2>;
}

/// Build an empty structure of the requested variant.
pub fn new_struct<B: Backend>(
    struct_type: StructType,
    batch_size: usize,
    read_size: usize,
    device: &B::Device,
) -> Result<Box<dyn Struct<B>>> {
    trace!(structure = %struct_type, batch_size, read_size, "allocating structure");
    Ok(match struct_type {
        StructType::Stack => Box::new(Stack::new(batch_size, read_size, device)?),
        StructType::Queue => Box::new(Queue::new(batch_size, read_size, device)?),
    })
}
