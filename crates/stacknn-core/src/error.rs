//! Error type shared by all StackNN crates

use thiserror::Error;

/// Errors raised while configuring or unrolling a controller.
///
/// None of these are transient. A configuration error aborts before any
/// computation and a shape error aborts the sequence being unrolled.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Name lookup miss in a registration table
    #[error("unknown {kind} `{name}`")]
    Unregistered { kind: &'static str, name: String },

    /// A size that must be positive or must match another size
    #[error("invalid {what}: expected {expected}, got {got}")]
    InvalidDimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Tensor shape disagreement
    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("tensor data error: {0}")]
    TensorData(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::ShapeMismatch`] built from tensor dims.
    pub fn shape(context: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Error::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// True for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Unregistered { .. } | Error::InvalidDimension { .. }
        )
    }
}
