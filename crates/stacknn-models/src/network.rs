//! Controller networks
//!
//! A network is a parametrized step function. From the current input, the
//! previous read vector and its own recurrent state it produces structure
//! control signals, an output vector and the next state. It never touches
//! the structure itself.
//!
//! Every network ends in the same head layout:
//!
//! ```text
//! [ output (output_size) | push (1) | pop (1) | value (read_size) ]
//!        logits            sigmoid    sigmoid       tanh
//! ```

use burn::nn;
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use stacknn_core::{Error, NetworkType};
use stacknn_structs::ControlSignals;

/// Sizes shared by every network variant
#[derive(Config, Debug)]
pub struct NetworkConfig {
    /// Width of one input vector
    pub input_size: usize,
    /// Width of the structure's vectors
    pub read_size: usize,
    /// Width of one output vector
    pub output_size: usize,
    /// Recurrent state width (ignored by stateless networks)
    #[config(default = 32)]
    pub hidden_size: usize,
}

impl NetworkConfig {
    pub fn validate(&self) -> stacknn_core::Result<()> {
        for (what, size) in [
            ("input size", self.input_size),
            ("read size", self.read_size),
            ("output size", self.output_size),
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
        Ok(())
    }

    /// Width of the raw head before it is split
    pub fn head_size(&self) -> usize {
        self.output_size + 2 + self.read_size
    }
}

/// Recurrent state carried between steps
#[derive(Debug, Clone)]
pub enum NetworkState<B: Backend> {
    Stateless,
    Lstm {
        hidden: Tensor<B, 2>,
        cell: Tensor<B, 2>,
    },
}

/// Everything one network step produces
#[derive(Debug, Clone)]
pub struct NetworkStep<B: Backend> {
    pub signals: ControlSignals<B>,
    pub output: Tensor<B, 2>,
    pub state: NetworkState<B>,
}

/// Capability set of a controller network
pub trait Network<B: Backend>: Module<B> {
    /// Build a freshly initialized network.
    fn from_config(config: &NetworkConfig, device: &B::Device) -> stacknn_core::Result<Self>
    where
        Self: Sized;

    fn network_type(&self) -> NetworkType;

    fn input_size(&self) -> usize;

    fn read_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// Recurrent state for the start of a batch
    fn init_state(&self, batch_size: usize, device: &B::Device) -> NetworkState<B>;

    /// One time step. `input` is `[batch, input_size]`, `read` is
    /// `[batch, read_size]`.
    fn step(
        &self,
        input: Tensor<B, 2>,
        read: Tensor<B, 2>,
        state: NetworkState<B>,
    ) -> stacknn_core::Result<NetworkStep<B>>;
}

fn check_step_inputs<B: Backend>(
    input: &Tensor<B, 2>,
    read: &Tensor<B, 2>,
    input_size: usize,
    read_size: usize,
) -> stacknn_core::Result<usize> {
    let [batch_size, width] = input.dims();
    if width != input_size {
        return Err(Error::shape(
            "network input",
            &[batch_size, input_size],
            &input.dims(),
        ));
    }
    if read.dims() != [batch_size, read_size] {
        return Err(Error::shape(
            "network read vector",
            &[batch_size, read_size],
            &read.dims(),
        ));
    }
    Ok(batch_size)
}

/// Split a raw head into control signals and the output vector.
fn split_head<B: Backend>(
    raw: Tensor<B, 2>,
    output_size: usize,
) -> (ControlSignals<B>, Tensor<B, 2>) {
    let [batch_size, width] = raw.dims();
    let output = raw.clone().slice([0..batch_size, 0..output_size]);
    let push = sigmoid(
        raw.clone()
            .slice([0..batch_size, output_size..output_size + 1]),
    );
    let pop = sigmoid(
        raw.clone()
            .slice([0..batch_size, output_size + 1..output_size + 2]),
    );
    let value = raw.slice([0..batch_size, output_size + 2..width]).tanh();

    (ControlSignals::new(push, pop, value), output)
}

/// Feedforward controller: one affine map from `[input; read]` to the head
#[derive(Module, Debug)]
pub struct LinearNetwork<B: Backend> {
    linear: nn::Linear<B>,
    input_size: usize,
    read_size: usize,
    output_size: usize,
}

impl<B: Backend> Network<B> for LinearNetwork<B> {
    fn from_config(config: &NetworkConfig, device: &B::Device) -> stacknn_core::Result<Self> {
        config.validate()?;
        let linear =
            nn::LinearConfig::new(config.input_size + config.read_size, config.head_size())
                .init(device);

        Ok(Self {
            linear,
            input_size: config.input_size,
            read_size: config.read_size,
            output_size: config.output_size,
        })
    }

    fn network_type(&self) -> NetworkType {
        NetworkType::Linear
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn read_size(&self) -> usize {
        self.read_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn init_state(&self, _batch_size: usize, _device: &B::Device) -> NetworkState<B> {
        NetworkState::Stateless
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        read: Tensor<B, 2>,
        state: NetworkState<B>,
    ) -> stacknn_core::Result<NetworkStep<B>> {
        check_step_inputs(&input, &read, self.input_size, self.read_size)?;

        let raw = self.linear.forward(Tensor::cat(vec![input, read], 1));
        let (signals, output) = split_head(raw, self.output_size);

        Ok(NetworkStep {
            signals,
            output,
            state,
        })
    }
}

/// Recurrent controller: LSTM cell over `[input; read]` with an affine head
#[derive(Module, Debug)]
pub struct LstmNetwork<B: Backend> {
    /// `[input; read]` to the four stacked gates
    input_gates: nn::Linear<B>,
    /// Previous hidden state to the four stacked gates
    hidden_gates: nn::Linear<B>,
    head: nn::Linear<B>,
    input_size: usize,
    read_size: usize,
    output_size: usize,
    hidden_size: usize,
}

impl<B: Backend> LstmNetwork<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl<B: Backend> Network<B> for LstmNetwork<B> {
    fn from_config(config: &NetworkConfig, device: &B::Device) -> stacknn_core::Result<Self> {
        config.validate()?;
        let gates = 4 * config.hidden_size;

        Ok(Self {
            input_gates: nn::LinearConfig::new(config.input_size + config.read_size, gates)
                .init(device),
            hidden_gates: nn::LinearConfig::new(config.hidden_size, gates)
                .with_bias(false)
                .init(device),
            head: nn::LinearConfig::new(config.hidden_size, config.head_size()).init(device),
            input_size: config.input_size,
            read_size: config.read_size,
            output_size: config.output_size,
            hidden_size: config.hidden_size,
        })
    }

    fn network_type(&self) -> NetworkType {
        NetworkType::Lstm
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn read_size(&self) -> usize {
        self.read_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn init_state(&self, batch_size: usize, device: &B::Device) -> NetworkState<B> {
        NetworkState::Lstm {
            hidden: Tensor::zeros([batch_size, self.hidden_size], device),
            cell: Tensor::zeros([batch_size, self.hidden_size], device),
        }
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        read: Tensor<B, 2>,
        state: NetworkState<B>,
    ) -> stacknn_core::Result<NetworkStep<B>> {
        let batch_size = check_step_inputs(&input, &read, self.input_size, self.read_size)?;

        let (hidden, cell) = match state {
            NetworkState::Lstm { hidden, cell } => (hidden, cell),
            NetworkState::Stateless => {
                return Err(Error::Config(
                    "LSTM network stepped without recurrent state".to_string(),
                ))
            }
        };
        if hidden.dims() != [batch_size, self.hidden_size] {
            return Err(Error::shape(
                "LSTM hidden state",
                &[batch_size, self.hidden_size],
                &hidden.dims(),
            ));
        }

        let gates = self.input_gates.forward(Tensor::cat(vec![input, read], 1))
            + self.hidden_gates.forward(hidden);
        let [i, f, g, o]: [Tensor<B, 2>; 4] = gates
            .chunk(4, 1)
            .try_into()
            .map_err(|chunks: Vec<Tensor<B, 2>>| {
                Error::shape("LSTM gates", &[4], &[chunks.len()])
            })?;

        let cell = sigmoid(f) * cell + sigmoid(i) * g.tanh();
        let hidden = sigmoid(o) * cell.clone().tanh();

        let (signals, output) = split_head(self.head.forward(hidden.clone()), self.output_size);

        Ok(NetworkStep {
            signals,
            output,
            state: NetworkState::Lstm { hidden, cell },
        })
    }
}
