//! Per-step instruction records for inspecting a trained controller

use burn::prelude::*;
use burn::tensor::ElementConversion;
use serde::Serialize;
use stacknn_core::{Error, Result};
use stacknn_structs::ControlSignals;
use std::fmt::Write;

/// Instructions and read vector of the first batch element at one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTrace {
    pub step: usize,
    pub push: f32,
    pub pop: f32,
    pub read: Vec<f32>,
}

impl StepTrace {
    pub(crate) fn record<B: Backend>(
        step: usize,
        signals: &ControlSignals<B>,
        read: &Tensor<B, 2>,
    ) -> Result<Self> {
        let [_, read_size] = read.dims();
        let first = |t: &Tensor<B, 2>| -> f32 {
            t.clone().slice([0..1, 0..1]).into_scalar().elem::<f32>()
        };
        let read = read
            .clone()
            .slice([0..1, 0..read_size])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::TensorData(format!("{e:?}")))?;

        Ok(Self {
            step,
            push: first(&signals.push),
            pop: first(&signals.pop),
            read,
        })
    }
}

/// Render traces as a fixed-width table.
pub fn format_trace(trace: &[StepTrace]) -> String {
    let mut out = String::from(" step   push    pop  read\n");
    for record in trace {
        let read: Vec<String> = record.read.iter().map(|x| format!("{x:+.2}")).collect();
        let _ = writeln!(
            out,
            "{:>5} {:>6.3} {:>6.3}  [{}]",
            record.step,
            record.push,
            record.pop,
            read.join(", ")
        );
    }
    out
}
