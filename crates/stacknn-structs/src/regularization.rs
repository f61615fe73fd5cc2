//! Regularization accounting for structure operations
//!
//! A [`RegTracker`] is a shared handle: the controller keeps one clone to
//! read and reset the loss once per batch, the structure keeps another and
//! adds a penalty on every `apply`. Penalties stay tensors so the auxiliary
//! loss backpropagates like the task loss.

use burn::prelude::*;
use burn::tensor::ElementConversion;
use parking_lot::RwLock;
use stacknn_core::{Error, Operation, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct RegLosses<B: Backend> {
    terms: BTreeMap<Operation, Tensor<B, 1>>,
    updates: usize,
}

impl<B: Backend> Default for RegLosses<B> {
    fn default() -> Self {
        Self {
            terms: BTreeMap::new(),
            updates: 0,
        }
    }
}

/// Running penalty sums keyed by operation kind
#[derive(Debug, Clone)]
pub struct RegTracker<B: Backend> {
    losses: Arc<RwLock<RegLosses<B>>>,
    device: B::Device,
}

impl<B: Backend> RegTracker<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            losses: Arc::new(RwLock::new(RegLosses::default())),
            device: device.clone(),
        }
    }

    /// Drop every accumulated term.
    pub fn reset(&self) {
        let mut losses = self.losses.write();
        losses.terms.clear();
        losses.updates = 0;
    }

    /// Add an already weighted contribution for `operation`.
    ///
    /// `value` must hold a single element.
    pub fn add(&self, operation: Operation, value: Tensor<B, 1>) {
        let mut losses = self.losses.write();
        let term = match losses.terms.remove(&operation) {
            Some(acc) => acc + value,
            None => value,
        };
        losses.terms.insert(operation, term);
        losses.updates += 1;
    }

    /// Accumulated contribution of one operation kind
    pub fn term(&self, operation: Operation) -> Option<Tensor<B, 1>> {
        self.losses.read().terms.get(&operation).cloned()
    }

    /// Sum of all contributions since the last reset, shape `[1]`
    pub fn total(&self) -> Tensor<B, 1> {
        let losses = self.losses.read();
        losses
            .terms
            .values()
            .cloned()
            .fold(Tensor::zeros([1], &self.device), |acc, term| acc + term)
    }

    /// Total as a plain number, detached from the graph
    pub fn total_value(&self) -> f32 {
        self.total().into_scalar().elem::<f32>()
    }

    /// Number of `add` calls since the last reset
    pub fn updates(&self) -> usize {
        self.losses.read().updates
    }

    /// Read the total, then reset.
    pub fn take_total(&self) -> Tensor<B, 1> {
        let total = self.total();
        self.reset();
        total
    }
}

/// A structure's view of regularization: its tracker and per-kind weights
#[derive(Debug, Clone)]
pub struct RegBinding<B: Backend> {
    tracker: Option<RegTracker<B>>,
    weights: BTreeMap<Operation, f32>,
}

impl<B: Backend> Default for RegBinding<B> {
    fn default() -> Self {
        Self {
            tracker: None,
            weights: BTreeMap::new(),
        }
    }
}

impl<B: Backend> RegBinding<B> {
    pub fn set_tracker(&mut self, tracker: RegTracker<B>) {
        self.tracker = Some(tracker);
    }

    pub fn set_weight(&mut self, operation: Operation, weight: f32) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::Config(format!(
                "{operation} regularization weight must be a non-negative number, got {weight}"
            )));
        }
        self.weights.insert(operation, weight);
        Ok(())
    }

    pub fn weight(&self, operation: Operation) -> f32 {
        self.weights.get(&operation).copied().unwrap_or(0.0)
    }

    /// Fails unless a tracker has been attached.
    pub fn ensure_attached(&self) -> Result<()> {
        match self.tracker {
            Some(_) => Ok(()),
            None => Err(Error::Config(
                "regularization tracker must be attached before apply".to_string(),
            )),
        }
    }

    /// Charge `weight(operation) * magnitude` to the tracker.
    ///
    /// The magnitude is only computed when the weight is non-zero, which
    /// keeps disabled regularization out of the autodiff graph.
    pub fn charge<F>(&self, operation: Operation, magnitude: F) -> Result<()>
    where
        F: FnOnce() -> Tensor<B, 1>,
    {
        let weight = self.weight(operation);
        if weight == 0.0 {
            return Ok(());
        }
        let tracker = self.tracker.as_ref().ok_or_else(|| {
            Error::Config("regularization tracker must be attached before apply".to_string())
        })?;
        tracker.add(operation, magnitude() * weight);
        Ok(())
    }
}
