//! Training loop shared by every task
//!
//! Each update samples a batch, unrolls the controller over it, and
//! minimizes masked cross-entropy plus the structure's regularization loss
//! with Adam. After every epoch a few fresh batches are scored without
//! updating.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stacknn_core::{Error, NetworkType, Result};
use stacknn_models::{
    format_trace, Controller, ControllerConfig, LinearNetwork, LstmNetwork, Network,
    NetworkConfig, StepTrace,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch::Batch;
use crate::report::{EpochRecord, ExperimentReport};
use crate::Task;

/// Backend experiments run on
pub type TrainBackend = Autodiff<NdArray>;

/// Train the network type named in the task's configuration.
pub fn run_experiment<T: Task + ?Sized>(task: &T) -> Result<ExperimentReport> {
    let device = Default::default();
    match task.config().network_type {
        NetworkType::Linear => {
            Trainer::<TrainBackend, LinearNetwork<TrainBackend>, T>::new(task, device)?.run()
        }
        NetworkType::Lstm => {
            Trainer::<TrainBackend, LstmNetwork<TrainBackend>, T>::new(task, device)?.run()
        }
    }
}

/// Loss and scores of one unrolled batch
struct BatchOutcome<B: Backend> {
    /// Task loss plus regularization, still attached to the graph
    loss: Tensor<B, 1>,
    task_loss: f32,
    reg_loss: f32,
    correct: f32,
    scored: usize,
}

impl<B: Backend> BatchOutcome<B> {
    fn total(&self) -> f32 {
        self.task_loss + self.reg_loss
    }
}

/// Unroll `controller` over `batch` and score its outputs.
fn evaluate<B: Backend, N: Network<B>>(
    controller: &Controller<B, N>,
    batch: &Batch,
    input_size: usize,
    device: &B::Device,
) -> Result<BatchOutcome<B>> {
    let xs = batch.input_tensor::<B>(input_size, device);
    let state = controller.init(batch.batch_size, xs)?;
    let (state, _) = controller.run_sequence(state)?;

    let logits = state.outputs().stacked()?;
    let [batch_size, time, vocab] = logits.dims();
    let positions = batch_size * time;
    let logits = logits.reshape([positions, vocab]);
    let targets = batch.target_tensor::<B>(device);
    let mask = batch.mask_tensor::<B>(device);
    let scored = batch.scored();

    let picked = log_softmax(logits.clone(), 1)
        .gather(1, targets.clone().reshape([positions, 1]))
        .reshape([positions]);
    let task_loss = (picked * mask.clone())
        .sum()
        .neg()
        .div_scalar(scored.max(1) as f32);
    let reg_loss = state.get_and_reset_reg_loss();

    let correct = logits
        .argmax(1)
        .reshape([positions])
        .equal(targets)
        .float()
        * mask;

    Ok(BatchOutcome {
        task_loss: task_loss.clone().into_scalar().elem::<f32>(),
        reg_loss: reg_loss.clone().into_scalar().elem::<f32>(),
        correct: correct.sum().into_scalar().elem::<f32>(),
        loss: task_loss + reg_loss,
        scored,
    })
}

fn mean(sum: f32, count: usize) -> f32 {
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// One experiment: a task, a controller and the sampling state
pub struct Trainer<'a, B, N, T>
where
    B: AutodiffBackend,
    N: Network<B> + AutodiffModule<B>,
    T: Task + ?Sized,
{
    task: &'a T,
    controller: Controller<B, N>,
    rng: StdRng,
    device: B::Device,
}

impl<'a, B, N, T> Trainer<'a, B, N, T>
where
    B: AutodiffBackend,
    N: Network<B> + AutodiffModule<B>,
    T: Task + ?Sized,
{
    /// Build the network, restore a checkpoint if one is configured, and
    /// bind it to the configured structure.
    pub fn new(task: &'a T, device: B::Device) -> Result<Self> {
        let config = task.config();
        config.validate()?;

        let network_config =
            NetworkConfig::new(task.input_size(), config.read_size, task.output_size())
                .with_hidden_size(config.hidden_size);
        let mut network = N::from_config(&network_config, &device)?;
        if let Some(path) = &config.load_path {
            network = network
                .load_file(path.as_str(), &CompactRecorder::new(), &device)
                .map_err(|e| Error::Checkpoint(format!("cannot load {path}: {e:?}")))?;
            info!(path = %path, "checkpoint loaded");
        }

        let controller_config = ControllerConfig::new(config.read_size)
            .with_struct_type(config.struct_type)
            .with_push_reg_weight(config.push_reg_weight)
            .with_pop_reg_weight(config.pop_reg_weight);
        let controller = Controller::new(controller_config, network, device.clone())?;

        Ok(Self {
            task,
            controller,
            rng: StdRng::seed_from_u64(config.seed),
            device,
        })
    }

    pub fn controller(&self) -> &Controller<B, N> {
        &self.controller
    }

    /// Fraction of scored positions predicted correctly over fresh batches
    fn validate(
        task: &T,
        controller: &Controller<B, N>,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Result<f32> {
        let mut correct = 0.0;
        let mut scored = 0;
        for _ in 0..task.config().validation_batches {
            let batch = task.sample_batch(rng);
            let outcome = evaluate(controller, &batch, task.input_size(), device)?;
            correct += outcome.correct;
            scored += outcome.scored;
        }
        Ok(mean(correct, scored))
    }

    fn record_trace(
        task: &T,
        controller: &Controller<B, N>,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Result<Vec<StepTrace>> {
        let batch = task.sample_batch(rng);
        let xs = batch.input_tensor::<B>(task.input_size(), device);
        let mut state = controller.init(batch.batch_size, xs)?;
        state.enable_trace();
        let (state, _) = controller.run_sequence(state)?;
        Ok(state.trace().map(<[StepTrace]>::to_vec).unwrap_or_default())
    }

    /// Train for the configured number of epochs.
    pub fn run(self) -> Result<ExperimentReport> {
        let Self {
            task,
            mut controller,
            mut rng,
            device,
        } = self;
        let config = task.config();
        let started_at = Utc::now();
        let mut optimizer = AdamConfig::new().init::<B, N>();

        controller.log_experiment_start();
        info!(
            task = task.name(),
            epochs = config.epochs,
            batch_size = config.batch_size,
            learning_rate = config.learning_rate,
            "training started"
        );

        let mut epochs = Vec::with_capacity(config.epochs);
        for epoch in 0..config.epochs {
            let mut train_loss = 0.0;
            let mut reg_loss = 0.0;
            let mut updates = 0;
            let mut skipped_batches = 0;

            for _ in 0..config.batches_per_epoch {
                let batch = task.sample_batch(&mut rng);
                let outcome = evaluate(&controller, &batch, task.input_size(), &device)?;
                if !outcome.total().is_finite() {
                    warn!(epoch, loss = outcome.total(), "non-finite training loss, batch skipped");
                    skipped_batches += 1;
                    continue;
                }
                train_loss += outcome.task_loss;
                reg_loss += outcome.reg_loss;
                updates += 1;

                let grads = outcome.loss.backward();
                let grads = GradientsParams::from_grads(grads, controller.network());
                controller = controller.map_network(|network| {
                    optimizer.step(config.learning_rate, network, grads)
                });
            }

            let record = EpochRecord {
                epoch,
                train_loss: mean(train_loss, updates),
                reg_loss: mean(reg_loss, updates),
                validation_accuracy: Self::validate(task, &controller, &mut rng, &device)?,
                skipped_batches,
            };
            info!(
                epoch,
                train_loss = record.train_loss,
                reg_loss = record.reg_loss,
                accuracy = record.validation_accuracy,
                "epoch finished"
            );
            epochs.push(record);
        }

        let final_accuracy = Self::validate(task, &controller, &mut rng, &device)?;
        info!(accuracy = final_accuracy, "training finished");

        let checkpoint = match &config.save_path {
            Some(path) => {
                controller
                    .network()
                    .clone()
                    .save_file(path.as_str(), &CompactRecorder::new())
                    .map_err(|e| Error::Checkpoint(format!("cannot save {path}: {e:?}")))?;
                info!(path = %path, "checkpoint saved");
                Some(path.clone())
            }
            None => None,
        };

        let trace = if config.trace {
            let steps = Self::record_trace(task, &controller, &mut rng, &device)?;
            info!("instruction trace of sample 0\n{}", format_trace(&steps));
            Some(steps)
        } else {
            None
        };

        let report = ExperimentReport {
            id: Uuid::new_v4(),
            task: task.name().to_string(),
            network: controller.network_type(),
            structure: controller.struct_type(),
            started_at,
            finished_at: Utc::now(),
            epochs,
            final_accuracy,
            checkpoint,
            trace,
        };
        debug!(id = %report.id, "experiment report ready");
        Ok(report)
    }
}
