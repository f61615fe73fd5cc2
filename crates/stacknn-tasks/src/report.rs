//! Experiment results

use chrono::{DateTime, Utc};
use serde::Serialize;
use stacknn_core::{NetworkType, StructType};
use stacknn_models::StepTrace;
use uuid::Uuid;

/// Averages over one epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// Masked cross-entropy, averaged over updates
    pub train_loss: f32,
    /// Regularization loss, averaged over updates
    pub reg_loss: f32,
    /// Fraction of scored positions predicted correctly on fresh batches
    pub validation_accuracy: f32,
    /// Batches dropped because their loss was not finite
    pub skipped_batches: usize,
}

/// Summary of one `run_experiment` call
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub id: Uuid,
    pub task: String,
    pub network: NetworkType,
    pub structure: StructType,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub epochs: Vec<EpochRecord>,
    pub final_accuracy: f32,
    pub checkpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<StepTrace>>,
}

impl ExperimentReport {
    pub fn best_accuracy(&self) -> Option<f32> {
        self.epochs
            .iter()
            .map(|e| e.validation_accuracy)
            .fold(None, |best, acc| match best {
                Some(b) if b >= acc => Some(b),
                _ => Some(acc),
            })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, accuracy: f32) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0,
            reg_loss: 0.0,
            validation_accuracy: accuracy,
            skipped_batches: 0,
        }
    }

    fn report(epochs: Vec<EpochRecord>) -> ExperimentReport {
        let now = Utc::now();
        ExperimentReport {
            id: Uuid::new_v4(),
            task: "ReverseTask".to_string(),
            network: NetworkType::Linear,
            structure: StructType::Stack,
            started_at: now,
            finished_at: now,
            epochs,
            final_accuracy: 0.5,
            checkpoint: None,
            trace: None,
        }
    }

    #[test]
    fn test_best_accuracy() {
        assert_eq!(report(vec![]).best_accuracy(), None);
        let r = report(vec![record(0, 0.4), record(1, 0.9), record(2, 0.7)]);
        assert_eq!(r.best_accuracy(), Some(0.9));
        assert_eq!(r.duration(), chrono::Duration::zero());
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(report(vec![record(0, 0.25)])).unwrap();
        assert_eq!(json["task"], "ReverseTask");
        assert_eq!(json["structure"], "Stack");
        assert_eq!(json["epochs"][0]["validation_accuracy"], 0.25);
        assert!(json.get("trace").is_none());
    }
}
