//! Neural queue (FIFO)

use burn::prelude::*;
use stacknn_core::{Operation, Result, StructType};

use crate::regularization::{RegBinding, RegTracker};
use crate::store::{End, WeightedStore};
use crate::{ControlSignals, Struct};

/// Continuous queue over batched vectors
///
/// Pushes go to the back, pops and reads start from the front.
///
/// # Regularization
/// Each operation is charged for indecision: push pays
/// `mean(push * (1 - push))` and pop pays `mean(pop * (1 - pop))`.
#[derive(Debug, Clone)]
pub struct Queue<B: Backend> {
    store: WeightedStore<B>,
    reg: RegBinding<B>,
}

impl<B: Backend> Queue<B> {
    pub fn new(batch_size: usize, read_size: usize, device: &B::Device) -> Result<Self> {
        Ok(Self {
            store: WeightedStore::new(batch_size, read_size, device)?,
            reg: RegBinding::default(),
        })
    }
}

/// `mean(s * (1 - s))`, zero for strengths of exactly 0 or 1
fn indecision<B: Backend>(strength: &Tensor<B, 2>) -> Tensor<B, 1> {
    let complement = strength.clone().neg().add_scalar(1.0);
    (strength.clone() * complement).mean()
}

impl<B: Backend> Struct<B> for Queue<B> {
    fn struct_type(&self) -> StructType {
        StructType::Queue
    }

    fn batch_size(&self) -> usize {
        self.store.batch_size()
    }

    fn read_size(&self) -> usize {
        self.store.read_size()
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn set_reg_tracker(&mut self, tracker: RegTracker<B>) {
        self.reg.set_tracker(tracker);
    }

    fn set_reg_weight(&mut self, operation: Operation, weight: f32) -> Result<()> {
        self.reg.set_weight(operation, weight)
    }

    fn reg_weight(&self, operation: Operation) -> f32 {
        self.reg.weight(operation)
    }

    fn apply(&mut self, signals: &ControlSignals<B>) -> Result<()> {
        self.reg.ensure_attached()?;
        signals.check(self.batch_size(), self.read_size())?;

        self.reg.charge(Operation::Push, || indecision(&signals.push))?;
        self.reg.charge(Operation::Pop, || indecision(&signals.pop))?;

        self.store.pop(signals.pop.clone(), End::Oldest);
        self.store.push(signals.value.clone(), signals.push.clone());
        Ok(())
    }

    fn read(&self) -> Tensor<B, 2> {
        self.store.read(End::Oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn attached() -> (Queue<TestBackend>, RegTracker<TestBackend>) {
        let device = Default::default();
        let mut queue = Queue::new(1, 2, &device).unwrap();
        let tracker = RegTracker::new(&device);
        queue.set_reg_tracker(tracker.clone());
        (queue, tracker)
    }

    fn signals(v: [f32; 2], push: f32, pop: f32) -> ControlSignals<TestBackend> {
        ControlSignals::uniform(push, pop, Tensor::from_floats([v], &Default::default()))
    }

    #[test]
    fn test_read_after_init_is_zero() {
        let (queue, _) = attached();
        assert_eq!(values(queue.read()), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fifo_order() {
        let (mut queue, _) = attached();
        queue.apply(&signals([1.0, 0.0], 1.0, 0.0)).unwrap();
        queue.apply(&signals([0.0, 1.0], 1.0, 0.0)).unwrap();
        assert_eq!(values(queue.read()), vec![1.0, 0.0]);

        queue.apply(&signals([0.0, 0.0], 0.0, 1.0)).unwrap();
        assert_eq!(values(queue.read()), vec![0.0, 1.0]);
    }

    #[test]
    fn test_noop_signals_leave_read_unchanged() {
        let (mut queue, _) = attached();
        queue.apply(&signals([0.5, 0.5], 1.0, 0.0)).unwrap();
        queue.apply(&signals([9.0, 9.0], 0.0, 0.0)).unwrap();
        assert_eq!(values(queue.read()), vec![0.5, 0.5]);
    }

    #[test]
    fn test_regularization_penalty() {
        let (mut queue, tracker) = attached();
        queue.set_reg_weight(Operation::Push, 1.0).unwrap();
        queue.set_reg_weight(Operation::Pop, 1.0).unwrap();

        queue.apply(&signals([1.0, 0.0], 0.5, 0.5)).unwrap();
        assert_abs_diff_eq!(tracker.total_value(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_decisive_strengths_are_free() {
        let (mut queue, tracker) = attached();
        queue.set_reg_weight(Operation::Push, 3.0).unwrap();
        queue.set_reg_weight(Operation::Pop, 3.0).unwrap();

        queue.apply(&signals([1.0, 0.0], 1.0, 0.0)).unwrap();
        queue.apply(&signals([0.0, 1.0], 1.0, 1.0)).unwrap();
        assert_abs_diff_eq!(tracker.total_value(), 0.0, epsilon = 1e-6);
        assert_eq!(tracker.updates(), 4);
    }
}
