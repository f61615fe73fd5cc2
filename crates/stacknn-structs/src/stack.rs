//! Neural stack (LIFO)

use burn::prelude::*;
use stacknn_core::{Operation, Result, StructType};

use crate::regularization::{RegBinding, RegTracker};
use crate::store::{End, WeightedStore};
use crate::{ControlSignals, Struct};

/// Continuous stack over batched vectors
///
/// Pops and reads start from the most recently pushed entry.
///
/// # Regularization
/// Both push and pop are charged `mean(push * pop)` over the batch, so a
/// controller that pushes and pops in the same step pays for it twice
/// when both weights are set.
#[derive(Debug, Clone)]
pub struct Stack<B: Backend> {
    store: WeightedStore<B>,
    reg: RegBinding<B>,
}

impl<B: Backend> Stack<B> {
    /// Create an empty stack for `batch_size` independent instances.
    pub fn new(batch_size: usize, read_size: usize, device: &B::Device) -> Result<Self> {
        Ok(Self {
            store: WeightedStore::new(batch_size, read_size, device)?,
            reg: RegBinding::default(),
        })
    }

    /// Penalty magnitude for simultaneous push and pop
    fn oscillation(signals: &ControlSignals<B>) -> Tensor<B, 1> {
        (signals.push.clone() * signals.pop.clone()).mean()
    }
}

impl<B: Backend> Struct<B> for Stack<B> {
    fn struct_type(&self) -> StructType {
        StructType::Stack
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

        self.reg.charge(Operation::Push, || Self::oscillation(signals))?;
        self.reg.charge(Operation::Pop, || Self::oscillation(signals))?;

        self.store.pop(signals.pop.clone(), End::Newest);
        self.store.push(signals.value.clone(), signals.push.clone());
        Ok(())
    }

    fn read(&self) -> Tensor<B, 2> {
        self.store.read(End::Newest)
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

    fn attached(
        batch_size: usize,
        read_size: usize,
    ) -> (Stack<TestBackend>, RegTracker<TestBackend>) {
        let device = Default::default();
        let mut stack = Stack::new(batch_size, read_size, &device).unwrap();
        let tracker = RegTracker::new(&device);
        stack.set_reg_tracker(tracker.clone());
        (stack, tracker)
    }

    fn push(v: [f32; 2], strength: f32, pop: f32) -> ControlSignals<TestBackend> {
        let value = Tensor::from_floats([v], &Default::default());
        ControlSignals::uniform(strength, pop, value)
    }

    #[test]
    fn test_read_after_init_is_zero() {
        for (batch_size, read_size) in [(1, 1), (3, 2), (8, 5)] {
            let (stack, _) = attached(batch_size, read_size);
            let read = stack.read();
            assert_eq!(read.dims(), [batch_size, read_size]);
            assert!(values(read).iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_push_then_pop_restores_previous_read() {
        let (mut stack, _) = attached(1, 2);
        let before = values(stack.read());

        stack.apply(&push([1.0, 0.0], 1.0, 0.0)).unwrap();
        assert_eq!(values(stack.read()), vec![1.0, 0.0]);

        stack.apply(&push([0.0, 0.0], 0.0, 1.0)).unwrap();
        assert_eq!(values(stack.read()), before);
    }

    #[test]
    fn test_lifo_order() {
        let (mut stack, _) = attached(1, 2);
        stack.apply(&push([1.0, 0.0], 1.0, 0.0)).unwrap();
        stack.apply(&push([0.0, 1.0], 1.0, 0.0)).unwrap();
        assert_eq!(values(stack.read()), vec![0.0, 1.0]);

        stack.apply(&push([0.0, 0.0], 0.0, 1.0)).unwrap();
        assert_eq!(values(stack.read()), vec![1.0, 0.0]);
    }

    #[test]
    fn test_noop_signals_leave_read_unchanged() {
        let (mut stack, _) = attached(1, 2);
        stack.apply(&push([0.3, 0.7], 0.8, 0.0)).unwrap();
        let before = values(stack.read());

        for _ in 0..4 {
            stack.apply(&push([5.0, -5.0], 0.0, 0.0)).unwrap();
        }
        let after = values(stack.read());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_regularization_penalty() {
        let (mut stack, tracker) = attached(1, 2);
        stack.set_reg_weight(Operation::Push, 1.0).unwrap();
        stack.set_reg_weight(Operation::Pop, 1.0).unwrap();

        stack.apply(&push([1.0, 0.0], 0.5, 0.5)).unwrap();
        // 1.0 * 0.25 for push plus 1.0 * 0.25 for pop
        assert_abs_diff_eq!(tracker.total_value(), 0.5, epsilon = 1e-6);
        assert_eq!(tracker.updates(), 2);
    }

    #[test]
    fn test_zero_weights_add_nothing() {
        let (mut stack, tracker) = attached(1, 2);
        stack.apply(&push([1.0, 0.0], 0.5, 0.5)).unwrap();
        assert_eq!(tracker.total_value(), 0.0);
        assert_eq!(tracker.updates(), 0);
    }

    #[test]
    fn test_apply_requires_tracker() {
        let mut stack = Stack::<TestBackend>::new(1, 2, &Default::default()).unwrap();
        let err = stack.apply(&push([1.0, 0.0], 1.0, 0.0)).unwrap_err();
        assert!(err.is_config());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_apply_rejects_wrong_read_size() {
        let (mut stack, _) = attached(1, 3);
        assert!(stack.apply(&push([1.0, 0.0], 1.0, 0.0)).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_batch_elements_are_independent() {
        let device = Default::default();
        let (mut stack, _) = attached(2, 2);
        let value = Tensor::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);
        let push = Tensor::from_floats([[1.0], [0.0]], &device);
        let pop = Tensor::zeros([2, 1], &device);
        stack.apply(&ControlSignals::new(push, pop, value)).unwrap();

        assert_eq!(values(stack.read()), vec![1.0, 0.0, 0.0, 0.0]);
    }
}
