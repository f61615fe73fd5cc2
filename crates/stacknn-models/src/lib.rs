//! Controllers for neural data structures
//!
//! A controller couples a trainable [`Network`] with a neural data structure
//! from `stacknn-structs` and unrolls both over an input sequence. At every
//! step the network reads the input and the previous read vector, emits an
//! output together with push/pop/value instructions, and the structure
//! executes those instructions to produce the next read vector.
//!
//! # Key Concepts
//!
//! - **Network**: parametrized step function, linear or LSTM
//! - **Controller**: configuration plus network parameters, no batch state
//! - **ControllerState**: structure, buffers and recurrent state of one batch
//!
//! # Architecture
//!
//! ```text
//! Tensor [batch, time, input] → InputBuffer
//!                                   ↓
//!                 ┌──────── Controller::step ────────┐
//!                 │  Network  →  ControlSignals      │
//!                 │     ↑             ↓              │
//!                 │   read  ←  Struct (Stack/Queue)  │
//!                 └──────────────────────────────────┘
//!                                   ↓
//!                             OutputBuffer
//! ```

mod buffer;
mod controller;
mod network;
mod trace;

pub use buffer::{InputBuffer, OutputBuffer};
pub use controller::{Controller, ControllerConfig, ControllerState};
pub use network::{LinearNetwork, LstmNetwork, Network, NetworkConfig, NetworkState, NetworkStep};
pub use trace::{format_trace, StepTrace};
