//! Controller: binds a network to a neural data structure over a sequence
//!
//! The controller itself only holds configuration and the network
//! parameters. Everything that lives for one batch (the structure, the read
//! vector, the recurrent state, the buffers and the regularization tracker)
//! sits in a [`ControllerState`] that [`Controller::init`] creates and every
//! step consumes and returns.
//!
//! # Per-step contract
//!
//! ```text
//! input_t (buffer, or output_{t-1} when generating)
//!     ↓
//! Network::step(input_t, read_{t-1}, hidden_{t-1})
//!     ↓                       ↓
//! Struct::apply(signals)   output_t → OutputBuffer
//!     ↓
//! read_t = Struct::read()
//! ```

use burn::prelude::*;
use stacknn_core::{Error, NetworkType, Operation, StructType};
use stacknn_structs::{new_struct, RegTracker, Struct};
use tracing::{debug, info};

use crate::buffer::{InputBuffer, OutputBuffer};
use crate::network::{Network, NetworkState, NetworkStep};
use crate::trace::StepTrace;

/// Controller construction options
#[derive(Config, Debug)]
pub struct ControllerConfig {
    /// Width of the vectors placed on the structure
    pub read_size: usize,
    /// Which structure the controller operates
    #[config(default = "StructType::Stack")]
    pub struct_type: StructType,
    /// Regularization weight for pushing
    #[config(default = 0.0)]
    pub push_reg_weight: f32,
    /// Regularization weight for popping
    #[config(default = 0.0)]
    pub pop_reg_weight: f32,
}

impl ControllerConfig {
    pub fn validate(&self) -> stacknn_core::Result<()> {
        if self.read_size == 0 {
            return Err(Error::InvalidDimension {
                what: "read size",
                expected: 1,
                got: 0,
            });
        }
        for (operation, weight) in [
            (Operation::Push, self.push_reg_weight),
            (Operation::Pop, self.pop_reg_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "{operation} regularization weight must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// State of one batch while it is being unrolled
pub struct ControllerState<B: Backend> {
    structure: Box<dyn Struct<B>>,
    reg_tracker: RegTracker<B>,
    read: Tensor<B, 2>,
    network_state: NetworkState<B>,
    input: InputBuffer<B>,
    output: OutputBuffer<B>,
    time: usize,
    trace: Option<Vec<StepTrace>>,
}

impl<B: Backend> ControllerState<B> {
    /// Number of steps taken since `init`
    pub fn time(&self) -> usize {
        self.time
    }

    pub fn batch_size(&self) -> usize {
        self.structure.batch_size()
    }

    /// Most recent read vector, `[batch, read_size]`
    pub fn read(&self) -> &Tensor<B, 2> {
        &self.read
    }

    pub fn structure(&self) -> &dyn Struct<B> {
        self.structure.as_ref()
    }

    pub fn network_state(&self) -> &NetworkState<B> {
        &self.network_state
    }

    pub fn outputs(&self) -> &OutputBuffer<B> {
        &self.output
    }

    /// Input steps not consumed yet
    pub fn remaining_inputs(&self) -> usize {
        self.input.len()
    }

    pub fn reg_tracker(&self) -> &RegTracker<B> {
        &self.reg_tracker
    }

    /// Regularization loss accumulated since the last call, then reset.
    pub fn get_and_reset_reg_loss(&self) -> Tensor<B, 1> {
        self.reg_tracker.take_total()
    }

    /// Record push/pop strengths and reads of the first batch element.
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn trace(&self) -> Option<&[StepTrace]> {
        self.trace.as_deref()
    }
}

/// A network bound to a structure type and its regularization weights
#[derive(Debug, Clone)]
pub struct Controller<B: Backend, N: Network<B>> {
    config: ControllerConfig,
    network: N,
    device: B::Device,
}

impl<B: Backend, N: Network<B>> Controller<B, N> {
    /// Create a controller, checking that the network fits the structure.
    pub fn new(
        config: ControllerConfig,
        network: N,
        device: B::Device,
    ) -> stacknn_core::Result<Self> {
        config.validate()?;
        if network.read_size() != config.read_size {
            return Err(Error::InvalidDimension {
                what: "network read size",
                expected: config.read_size,
                got: network.read_size(),
            });
        }

        Ok(Self {
            config,
            network,
            device,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn read_size(&self) -> usize {
        self.config.read_size
    }

    pub fn struct_type(&self) -> StructType {
        self.config.struct_type
    }

    pub fn network_type(&self) -> NetworkType {
        self.network.network_type()
    }

    /// Replace the network, e.g. after an optimizer step.
    pub fn map_network<F>(self, f: F) -> Self
    where
        F: FnOnce(N) -> N,
    {
        Self {
            network: f(self.network),
            ..self
        }
    }

    /// Log model, network and structure types.
    pub fn log_experiment_start(&self) {
        info!(
            model = "Controller",
            network = %self.network_type(),
            structure = %self.struct_type(),
            read_size = self.config.read_size,
            push_reg_weight = self.config.push_reg_weight,
            pop_reg_weight = self.config.pop_reg_weight,
            "experiment start"
        );
    }

    /// Reset everything for a new batch.
    ///
    /// `xs` is `[batch_size, time, input_size]`. The structure is built
    /// first and receives its tracker and weights, then the buffers are
    /// filled, then the network state is reset.
    pub fn init(
        &self,
        batch_size: usize,
        xs: Tensor<B, 3>,
    ) -> stacknn_core::Result<ControllerState<B>> {
        let [batch, _, input_size] = xs.dims();
        if batch != batch_size {
            return Err(Error::InvalidDimension {
                what: "input batch size",
                expected: batch_size,
                got: batch,
            });
        }
        if input_size != self.network.input_size() {
            return Err(Error::shape(
                "input sequence",
                &[batch_size, xs.dims()[1], self.network.input_size()],
                &xs.dims(),
            ));
        }
        self.init_with(batch_size, || InputBuffer::from_sequence(xs))
    }

    /// Reset for a batch with no input sequence, to be driven by
    /// [`Controller::generate`]. The first step sees a zero input.
    pub fn init_generation(
        &self,
        batch_size: usize,
    ) -> stacknn_core::Result<ControllerState<B>> {
        let input_size = self.network.input_size();
        self.init_with(batch_size, || InputBuffer::empty(batch_size, input_size))
    }

    fn init_with<F>(
        &self,
        batch_size: usize,
        fill: F,
    ) -> stacknn_core::Result<ControllerState<B>>
    where
        F: FnOnce() -> InputBuffer<B>,
    {
        self.config.validate()?;

        let mut structure = new_struct::<B>(
            self.config.struct_type,
            batch_size,
            self.config.read_size,
            &self.device,
        )?;
        let reg_tracker = RegTracker::new(&self.device);
        structure.set_reg_tracker(reg_tracker.clone());
        structure.set_reg_weight(Operation::Push, self.config.push_reg_weight)?;
        structure.set_reg_weight(Operation::Pop, self.config.pop_reg_weight)?;

        let input = fill();
        let steps = input.len();
        let state = ControllerState {
            read: Tensor::zeros([batch_size, self.config.read_size], &self.device),
            structure,
            reg_tracker,
            network_state: self.network.init_state(batch_size, &self.device),
            input,
            output: OutputBuffer::new(),
            time: 0,
            trace: None,
        };

        debug!(
            batch_size,
            steps,
            structure = %self.config.struct_type,
            push_reg_weight = state.structure.reg_weight(Operation::Push),
            pop_reg_weight = state.structure.reg_weight(Operation::Pop),
            "controller initialized"
        );
        Ok(state)
    }

    /// Run one time step and return the new state with this step's output.
    ///
    /// The input comes from the buffer. Once it is empty, the previous
    /// output is fed back, which requires `output_size == input_size`.
    /// A step with neither input nor previous output sees zeros.
    pub fn step(
        &self,
        mut state: ControllerState<B>,
    ) -> stacknn_core::Result<(ControllerState<B>, Tensor<B, 2>)> {
        let input = match state.input.pop_front() {
            Some(input) => input,
            None => self.feedback(&state)?,
        };

        let network_state = std::mem::replace(&mut state.network_state, NetworkState::Stateless);
        let NetworkStep {
            signals,
            output,
            state: network_state,
        } = self.network.step(input, state.read.clone(), network_state)?;

        state.structure.apply(&signals)?;
        state.read = state.structure.read();
        state.network_state = network_state;

        if let Some(trace) = state.trace.as_mut() {
            trace.push(StepTrace::record(state.time, &signals, &state.read)?);
        }

        state.output.push(output.clone());
        state.time += 1;
        Ok((state, output))
    }

    fn feedback(&self, state: &ControllerState<B>) -> stacknn_core::Result<Tensor<B, 2>> {
        let expected = [state.batch_size(), self.network.input_size()];
        let Some(previous) = state.output.last() else {
            return Ok(Tensor::zeros(expected, &self.device));
        };
        if previous.dims() != expected {
            return Err(Error::shape("fed-back output", &expected, &previous.dims()));
        }
        Ok(previous.clone())
    }

    /// Step through every remaining input and return all outputs so far.
    pub fn run_sequence(
        &self,
        state: ControllerState<B>,
    ) -> stacknn_core::Result<(ControllerState<B>, Vec<Tensor<B, 2>>)> {
        let steps = state.input.len();
        self.run_steps(state, steps)
    }

    /// Run exactly `steps` steps, feeding outputs back once the input
    /// buffer runs dry.
    pub fn generate(
        &self,
        state: ControllerState<B>,
        steps: usize,
    ) -> stacknn_core::Result<(ControllerState<B>, Vec<Tensor<B, 2>>)> {
        self.run_steps(state, steps)
    }

    fn run_steps(
        &self,
        mut state: ControllerState<B>,
        steps: usize,
    ) -> stacknn_core::Result<(ControllerState<B>, Vec<Tensor<B, 2>>)> {
        for _ in 0..steps {
            let (next, _) = self.step(state)?;
            state = next;
        }
        let outputs = state.output.as_slice().to_vec();
        Ok((state, outputs))
    }
}
