// ============================================================
// Layer 2: Training Loop Controller
// ============================================================
// Owns the epoch / iteration cadence of a run:
//
//   Idle ─► Resuming? ─► Training(e) ─► Validating(e) | skip
//                            ▲                 │
//                            └─ Checkpointing(e) ◄┘
//                                      │
//                                      ▼ after the last epoch
//                          final unconditional save ─► Done
//
// The controller holds the only mutable run state: the best
// validation score, the iteration counter, and the start time
// for the progress line. It never sees a tensor; the heavy work
// happens behind the TrainSession trait.
//
// Reference: Rust Book §10 (Generic Types, Traits)

use anyhow::{Context, Result};
use std::time::Instant;

use crate::application::train_use_case::TrainConfig;
use crate::domain::{
    metric::SegmentationMetric,
    score::{BestScore, ValidationScore},
    traits::{CheckpointSink, StepReport, TrainSession},
};
use crate::infra::{
    checkpoint::read_checkpoint,
    metrics::{EpochMetrics, MetricsLogger},
};

/// A progress line is logged every this many optimizer steps
pub const LOG_EVERY: usize = 10;

/// What a finished run looked like
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub epochs_run: usize,
    pub iterations: usize,
    pub saves:      usize,
    pub best_score: f64,
}

pub struct TrainingLoop<'a, K: CheckpointSink> {
    start_epoch: usize,
    epochs:      usize,
    validate:    bool,
    sink:        &'a K,
    metric:      SegmentationMetric,
    best:        BestScore,
    iterations:  usize,
    saves:       usize,
    started:     Instant,
    metrics_log: Option<MetricsLogger>,
}

impl<'a, K: CheckpointSink> TrainingLoop<'a, K> {
    pub fn new(cfg: &TrainConfig, num_classes: usize, sink: &'a K) -> Self {
        Self {
            start_epoch: cfg.start_epoch,
            epochs:      cfg.epochs,
            validate:    !cfg.no_val,
            sink,
            metric:      SegmentationMetric::new(num_classes),
            best:        BestScore::default(),
            iterations:  0,
            saves:       0,
            started:     Instant::now(),
            metrics_log: None,
        }
    }

    /// Also append a CSV row per epoch
    pub fn with_metrics_log(mut self, logger: MetricsLogger) -> Self {
        self.metrics_log = Some(logger);
        self
    }

    /// Load `--resume` weights into the session before training starts.
    pub fn resume<S: TrainSession>(&mut self, session: &mut S, path: &str) -> Result<()> {
        tracing::info!("Resuming training, loading {}...", path);
        let state = read_checkpoint(path)?;
        session
            .restore(state)
            .with_context(|| format!("Cannot load model state from '{path}'"))
    }

    /// Train epochs `[start_epoch, epochs)`, then write one final checkpoint.
    pub fn run<S: TrainSession>(&mut self, session: &mut S) -> Result<RunSummary> {
        self.started = Instant::now();
        let mut epochs_run = 0;

        for epoch in self.start_epoch..self.epochs {
            let (train_loss, lr) = self.train_epoch(session, epoch)?;

            let validation = if self.validate {
                let score = self.validation(session, epoch)?;
                let is_best = self.best.offer(score.combined());
                self.save(session, is_best)?;
                Some(score)
            } else {
                self.save(session, false)?;
                None
            };

            if let Some(logger) = &self.metrics_log {
                logger.log(&EpochMetrics {
                    epoch,
                    train_loss,
                    lr,
                    validation,
                    best_score: self.best.value(),
                })?;
            }
            epochs_run += 1;
        }

        // Written even when the last epoch already saved
        self.save(session, false)?;

        Ok(RunSummary {
            epochs_run,
            iterations: self.iterations,
            saves:      self.saves,
            best_score: self.best.value(),
        })
    }

    /// One validation pass over the whole split. Does not touch the
    /// best score and writes nothing.
    pub fn validation<S: TrainSession>(
        &mut self,
        session: &mut S,
        epoch:   usize,
    ) -> Result<ValidationScore> {
        self.metric.reset();
        session.validate(epoch, &mut self.metric)?;
        let (pix_acc, miou) = self.metric.get();

        tracing::info!(
            "Epoch {}, validation pixAcc: {:.3}%, mIoU: {:.3}%",
            epoch,
            pix_acc * 100.0,
            miou * 100.0,
        );
        Ok(ValidationScore::new(pix_acc, miou))
    }

    /// Returns the mean loss over the epoch and the last learning rate
    fn train_epoch<S: TrainSession>(&mut self, session: &mut S, epoch: usize) -> Result<(f64, f64)> {
        let batches = session.batches_per_epoch();
        let epochs = self.epochs;
        let started = self.started;
        let iterations = &mut self.iterations;

        let mut loss_sum = 0.0;
        let mut steps = 0usize;
        let mut last_lr = 0.0;

        session.train_epoch(epoch, &mut |report: StepReport| {
            *iterations += 1;
            loss_sum += report.loss;
            steps += 1;
            last_lr = report.lr;

            if *iterations % LOG_EVERY == 0 {
                tracing::info!(
                    "Epoch: [{:2}/{:2}] Iter [{:4}/{:4}] || Time: {:.4} sec || lr: {:.8} || Loss: {:.4}",
                    epoch,
                    epochs,
                    report.batch + 1,
                    batches,
                    started.elapsed().as_secs_f64(),
                    report.lr,
                    report.loss,
                );
            }
        })?;

        let mean_loss = if steps > 0 { loss_sum / steps as f64 } else { f64::NAN };
        Ok((mean_loss, last_lr))
    }

    fn save<S: TrainSession>(&mut self, session: &S, is_best: bool) -> Result<()> {
        let state = session.snapshot()?;
        self.sink.save(&state, is_best)?;
        self.saves += 1;
        Ok(())
    }
}
