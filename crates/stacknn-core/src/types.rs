//! Core type definitions shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Operation kinds a neural data structure can be regularized on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Push,
    Pop,
}

impl Operation {
    /// All operation kinds, in accumulation order
    pub const ALL: [Operation; 2] = [Operation::Push, Operation::Pop];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Push => write!(f, "push"),
            Operation::Pop => write!(f, "pop"),
        }
    }
}

/// Neural data structure variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StructType {
    /// Last in, first out
    #[default]
    Stack,
    /// First in, first out
    Queue,
}

impl StructType {
    pub const ALL: [StructType; 2] = [StructType::Stack, StructType::Queue];

    /// Name used in configuration files and logs
    pub fn name(&self) -> &'static str {
        match self {
            StructType::Stack => "Stack",
            StructType::Queue => "Queue",
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StructType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StructType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Unregistered {
                kind: "struct type",
                name: s.to_string(),
            })
    }
}

/// Controller network variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
    /// Single affine map, no recurrent state
    #[default]
    Linear,
    /// LSTM cell with an affine output head
    Lstm,
}

impl NetworkType {
    pub const ALL: [NetworkType; 2] = [NetworkType::Linear, NetworkType::Lstm];

    pub fn name(&self) -> &'static str {
        match self {
            NetworkType::Linear => "Linear",
            NetworkType::Lstm => "LSTM",
        }
    }

    /// Whether the network carries hidden state between steps
    pub fn is_recurrent(&self) -> bool {
        matches!(self, NetworkType::Lstm)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetworkType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Unregistered {
                kind: "network type",
                name: s.to_string(),
            })
    }
}
