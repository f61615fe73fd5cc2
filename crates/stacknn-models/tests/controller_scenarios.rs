//! End-to-end behavior of structures and controllers over whole sequences

use approx::assert_abs_diff_eq;
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use stacknn_core::{Error, Operation, StructType};
use stacknn_models::{
    Controller, ControllerConfig, LinearNetwork, LstmNetwork, Network, NetworkConfig,
};
use stacknn_structs::{new_struct, ControlSignals, RegTracker, Struct};

type TestBackend = NdArray;

fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
    t.into_data().to_vec::<f32>().unwrap()
}

fn vector(v: [f32; 2]) -> Tensor<TestBackend, 2> {
    Tensor::from_floats([v], &Default::default())
}

fn attached(
    struct_type: StructType,
    batch_size: usize,
) -> (Box<dyn Struct<TestBackend>>, RegTracker<TestBackend>) {
    let device = Default::default();
    let mut structure = new_struct::<TestBackend>(struct_type, batch_size, 2, &device).unwrap();
    let tracker = RegTracker::new(&device);
    structure.set_reg_tracker(tracker.clone());
    (structure, tracker)
}

fn linear_controller(
    struct_type: StructType,
    reg_weight: f32,
) -> Controller<TestBackend, LinearNetwork<TestBackend>> {
    let device = Default::default();
    let network = LinearNetwork::from_config(&NetworkConfig::new(4, 2, 4), &device).unwrap();
    let config = ControllerConfig::new(2)
        .with_struct_type(struct_type)
        .with_push_reg_weight(reg_weight)
        .with_pop_reg_weight(reg_weight);
    Controller::new(config, network, device).unwrap()
}

fn one_hot_sequence(batch_size: usize, time: usize) -> Tensor<TestBackend, 3> {
    let device = Default::default();
    let steps: Vec<Tensor<TestBackend, 2>> = (0..time)
        .map(|t| {
            let symbol = t % 4;
            Tensor::<TestBackend, 2>::zeros([batch_size, 4], &device).slice_assign(
                [0..batch_size, symbol..symbol + 1],
                Tensor::ones([batch_size, 1], &device),
            )
        })
        .collect();
    Tensor::stack(steps, 1)
}

#[test]
fn stack_push_then_pop_restores_previous_read() {
    let (mut stack, _) = attached(StructType::Stack, 1);
    let before = values(stack.read());

    stack
        .apply(&ControlSignals::uniform(1.0, 0.0, vector([1.0, 0.0])))
        .unwrap();
    assert_eq!(values(stack.read()), vec![1.0, 0.0]);

    stack
        .apply(&ControlSignals::uniform(0.0, 1.0, vector([0.0, 0.0])))
        .unwrap();
    assert_eq!(values(stack.read()), before);
}

#[test]
fn queue_pops_first_pushed_vector() {
    let (mut queue, _) = attached(StructType::Queue, 1);
    queue
        .apply(&ControlSignals::uniform(1.0, 0.0, vector([1.0, 0.0])))
        .unwrap();
    queue
        .apply(&ControlSignals::uniform(1.0, 0.0, vector([0.0, 1.0])))
        .unwrap();
    assert_eq!(values(queue.read()), vec![1.0, 0.0]);

    queue
        .apply(&ControlSignals::uniform(0.0, 1.0, vector([0.0, 0.0])))
        .unwrap();
    assert_eq!(values(queue.read()), vec![0.0, 1.0]);
}

#[test]
fn half_strength_operations_are_penalized() {
    for struct_type in StructType::ALL {
        let (mut structure, tracker) = attached(struct_type, 1);
        structure.set_reg_weight(Operation::Push, 1.0).unwrap();
        structure.set_reg_weight(Operation::Pop, 1.0).unwrap();

        structure
            .apply(&ControlSignals::uniform(0.5, 0.5, vector([1.0, 1.0])))
            .unwrap();
        assert_abs_diff_eq!(tracker.total_value(), 0.5, epsilon = 1e-6);

        tracker.reset();
        assert_eq!(tracker.total_value(), 0.0);
    }
}

#[test]
fn reads_are_differentiable_in_pushed_values() {
    type AutodiffBackend = Autodiff<NdArray>;
    let device = Default::default();

    let mut stack = new_struct::<AutodiffBackend>(StructType::Stack, 1, 2, &device).unwrap();
    stack.set_reg_tracker(RegTracker::new(&device));

    let value = Tensor::<AutodiffBackend, 2>::from_floats([[0.3, -0.2]], &device).require_grad();
    let push = Tensor::<AutodiffBackend, 2>::from_floats([[0.8]], &device).require_grad();
    let pop = Tensor::<AutodiffBackend, 2>::zeros([1, 1], &device);
    stack
        .apply(&ControlSignals::new(push.clone(), pop, value.clone()))
        .unwrap();

    let grads = stack.read().sum().backward();
    let value_grad = value.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
    let push_grad: f32 = push.grad(&grads).unwrap().into_scalar().elem();

    // read = 0.8 * value, so d(sum)/d(value) = 0.8 and d(sum)/d(push) = 0.1
    assert_abs_diff_eq!(value_grad[0], 0.8, epsilon = 1e-6);
    assert_abs_diff_eq!(value_grad[1], 0.8, epsilon = 1e-6);
    assert_abs_diff_eq!(push_grad, 0.1, epsilon = 1e-6);
}

#[test]
fn run_sequence_yields_one_output_per_input() {
    for struct_type in StructType::ALL {
        let controller = linear_controller(struct_type, 0.0);
        let state = controller.init(3, one_hot_sequence(3, 7)).unwrap();
        let (state, outputs) = controller.run_sequence(state).unwrap();

        assert_eq!(outputs.len(), 7);
        assert_eq!(state.time(), 7);
        assert_eq!(state.outputs().stacked().unwrap().dims(), [3, 7, 4]);
    }
}

#[test]
fn controller_read_starts_at_zero() {
    let controller = linear_controller(StructType::Queue, 0.0);
    let state = controller.init(5, one_hot_sequence(5, 2)).unwrap();
    assert_eq!(values(state.read().clone()), vec![0.0; 10]);
}

#[test]
fn reinit_never_reflects_previous_batch() {
    let controller = linear_controller(StructType::Stack, 0.0);
    let state = controller.init(2, one_hot_sequence(2, 5)).unwrap();
    let (state, _) = controller.run_sequence(state).unwrap();
    assert!(values(state.read().clone()).iter().any(|&x| x != 0.0));

    let state = controller.init(2, one_hot_sequence(2, 5)).unwrap();
    assert!(state.structure().is_empty());
    assert_eq!(values(state.read().clone()), vec![0.0; 4]);
}

#[test]
fn regularization_loss_accumulates_and_resets() {
    let controller = linear_controller(StructType::Stack, 1.0);
    let state = controller.init(2, one_hot_sequence(2, 4)).unwrap();
    let (state, _) = controller.run_sequence(state).unwrap();

    let loss: f32 = state.get_and_reset_reg_loss().into_scalar().elem();
    assert!(loss > 0.0);
    assert_eq!(state.reg_tracker().updates(), 0);
    let after: f32 = state.get_and_reset_reg_loss().into_scalar().elem();
    assert_eq!(after, 0.0);
}

#[test]
fn regularization_disabled_by_default() {
    let controller = linear_controller(StructType::Queue, 0.0);
    let state = controller.init(2, one_hot_sequence(2, 4)).unwrap();
    let (state, _) = controller.run_sequence(state).unwrap();
    assert_eq!(state.reg_tracker().updates(), 0);
    assert_eq!(state.reg_tracker().total_value(), 0.0);
}

#[test]
fn network_width_mismatch_is_rejected_at_setup() {
    let device = Default::default();
    let network =
        LstmNetwork::<TestBackend>::from_config(&NetworkConfig::new(4, 3, 4), &device).unwrap();
    let result = Controller::new(ControllerConfig::new(2), network, device);
    assert!(matches!(result, Err(ref e) if e.is_config()));
}

#[test]
fn wrong_input_width_is_rejected_at_init() {
    let controller = linear_controller(StructType::Stack, 0.0);
    let xs = Tensor::<TestBackend, 3>::zeros([2, 3, 5], &Default::default());
    assert!(matches!(
        controller.init(2, xs),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn structure_rejects_wrong_value_width() {
    let (mut stack, _) = attached(StructType::Stack, 1);
    let wide = Tensor::<TestBackend, 2>::zeros([1, 3], &Default::default());
    let result = stack.apply(&ControlSignals::uniform(1.0, 0.0, wide));
    assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    assert!(stack.is_empty());
}
