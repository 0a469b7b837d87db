// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The loop controller never touches Burn. It talks to:
//
//   TrainSession   → something that can run a training epoch,
//                    score itself on the validation split, and
//                    hand back / accept its parameter state
//   CheckpointSink → somewhere that parameter state is persisted
//
// BurnSession (ml layer) and CheckpointStore (infra layer) are
// the production implementations; the controller tests use
// in-memory fakes of both.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::metric::SegmentationMetric;

// ─── StepReport ───────────────────────────────────────────────────────────────
/// What a session reports after each optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Zero-based batch index within the current epoch
    pub batch: usize,
    /// Scalar training loss for this batch
    pub loss:  f64,
    /// Learning rate used for this step
    pub lr:    f64,
}

// ─── TrainSession ─────────────────────────────────────────────────────────────
/// A model + optimizer + data pair the controller can drive.
pub trait TrainSession {
    /// Number of training batches in one epoch
    fn batches_per_epoch(&self) -> usize;

    /// Run one full pass over the training split in training mode.
    /// `on_step` is called once per optimizer step, in order.
    fn train_epoch(&mut self, epoch: usize, on_step: &mut dyn FnMut(StepReport)) -> Result<()>;

    /// Run the model in evaluation mode over the validation split,
    /// feeding argmax predictions into `metric`.
    /// The caller resets the metric beforehand.
    fn validate(&mut self, epoch: usize, metric: &mut SegmentationMetric) -> Result<()>;

    /// Serialized parameter state
    fn snapshot(&self) -> Result<Vec<u8>>;

    /// Replace parameter state with a previously serialized one
    fn restore(&mut self, state: Vec<u8>) -> Result<()>;
}

// ─── CheckpointSink ───────────────────────────────────────────────────────────
/// Any component that can persist serialized parameter state.
pub trait CheckpointSink {
    /// Persist `state` as the latest checkpoint, and additionally as
    /// the best checkpoint when `is_best` is true.
    fn save(&self, state: &[u8], is_best: bool) -> Result<()>;
}
