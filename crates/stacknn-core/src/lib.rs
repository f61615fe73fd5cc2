//! Shared types for the StackNN workspace
//!
//! Every crate in the workspace reports failures through [`Error`] and
//! agrees on the vocabulary in [`types`]: which operations a neural data
//! structure exposes, which structure variants exist and which controller
//! networks can drive them.

mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{NetworkType, Operation, StructType};
