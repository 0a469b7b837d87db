// ============================================================
// Layer 5: Burn Training Session
// ============================================================
// The production TrainSession: a Fast-SCNN on an autodiff
// backend, its SGD optimiser, and the data loaders.
//
// One call to train_epoch is one pass over the shuffled split:
//
//   batch ─► forward ─► loss (+ aux) ─► backward ─► SGD step
//                                                     │
//                         lr from the poly schedule ◄─┘
//
// Why count batches?
//   Burn's loader ends iteration at the first sample the dataset
//   cannot produce. Without the count a single unreadable file
//   would quietly shorten the epoch, and pixAcc / mIoU (and the
//   best-model choice) would come from part of the split.
//
// Key Burn insight:
//   - Training runs on B (Autodiff<_>) so loss.backward() works
//   - model.valid() returns the model on B::InnerBackend with
//     dropout off, so the validation batcher uses InnerBackend too
//   - argmax(1) keeps the class axis as size 1: [N, 1, H, W]
//
// Reference: Burn Book §5, Robbins & Monro (1951) SGD

use std::sync::Arc;

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SegBatch, SegBatcher},
    dataset::SegDataset,
};
use crate::domain::{error::TrainError, metric::SegmentationMetric, traits::{StepReport, TrainSession}};
use crate::ml::{
    loss::segmentation_loss,
    lr::PolyLr,
    model::FastScnn,
};

type CheckpointRecorder = BinBytesRecorder<FullPrecisionSettings>;

// ─── SGD ──────────────────────────────────────────────────────────────────────
// v = μ*v + (g + λ*θ)
// θ = θ - lr * v
pub fn sgd_config(cfg: &TrainConfig) -> SgdConfig {
    SgdConfig::new()
        .with_momentum(Some(
            MomentumConfig::new()
                .with_momentum(cfg.momentum)
                .with_dampening(0.0),
        ))
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
}

struct TrainData<B: Backend> {
    loader:  Arc<dyn DataLoader<SegBatch<B>>>,
    batches: usize,
    lr:      PolyLr,
}

struct ValData<B: Backend> {
    loader:  Arc<dyn DataLoader<SegBatch<B>>>,
    samples: usize,
}

// ─── BurnSession ──────────────────────────────────────────────────────────────
pub struct BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FastScnn<B>, B>,
{
    model:      FastScnn<B>,
    optim:      O,
    device:     B::Device,
    batch_size: usize,
    workers:    usize,
    seed:       u64,
    aux_weight: f64,
    base_lr:    f64,
    epochs:     usize,
    train:      Option<TrainData<B>>,
    val:        Option<ValData<B::InnerBackend>>,
}

impl<B, O> BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FastScnn<B>, B>,
{
    pub fn new(model: FastScnn<B>, optim: O, cfg: &TrainConfig, device: B::Device) -> Self {
        Self {
            model,
            optim,
            device,
            batch_size: cfg.batch_size,
            workers:    cfg.workers,
            seed:       cfg.seed,
            aux_weight: cfg.aux_weight,
            base_lr:    cfg.lr,
            epochs:     cfg.epochs,
            train:      None,
            val:        None,
        }
    }

    /// Attach the training split: shuffled, `batch_size` samples per step.
    pub fn with_train_data(mut self, dataset: SegDataset) -> Self {
        let batches = dataset.sample_count().div_ceil(self.batch_size);
        let loader = DataLoaderBuilder::new(SegBatcher::<B>::new(self.device.clone()))
            .batch_size(self.batch_size)
            .shuffle(self.seed)
            .num_workers(self.workers)
            .build(dataset);
        let lr = PolyLr::new(self.base_lr, self.epochs, batches);
        self.train = Some(TrainData { loader, batches, lr });
        self
    }

    /// Attach the validation split, one sample per batch.
    pub fn with_val_data(mut self, dataset: SegDataset) -> Self {
        let samples = dataset.sample_count();
        let loader = DataLoaderBuilder::new(SegBatcher::<B::InnerBackend>::new(self.device.clone()))
            .batch_size(1)
            .num_workers(self.workers)
            .build(dataset);
        self.val = Some(ValData { loader, samples });
        self
    }
}

impl<B, O> TrainSession for BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FastScnn<B>, B>,
{
    fn batches_per_epoch(&self) -> usize {
        self.train.as_ref().map(|t| t.batches).unwrap_or(0)
    }

    fn train_epoch(&mut self, epoch: usize, on_step: &mut dyn FnMut(StepReport)) -> Result<()> {
        let (loader, batches, schedule) = match &self.train {
            Some(t) => (t.loader.clone(), t.batches, t.lr),
            None    => return Err(anyhow!("no training split attached")),
        };

        let mut seen = 0;
        for (i, batch) in loader.iter().enumerate() {
            let lr = schedule.at(epoch * batches + i);
            seen += 1;

            let output = self.model.forward(batch.images);
            let loss = segmentation_loss(output, batch.targets, self.aux_weight);
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + SGD update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optim.step(lr, self.model.clone(), grads);

            on_step(StepReport { batch: i, loss: loss_val, lr });
        }

        // The loader stops at the first sample it cannot load
        if seen != batches {
            return Err(anyhow!(
                "epoch {epoch} ran {seen} of {batches} training batches; a sample failed to load"
            ));
        }
        Ok(())
    }

    fn validate(&mut self, epoch: usize, metric: &mut SegmentationMetric) -> Result<()> {
        let (loader, samples) = match &self.val {
            Some(v) => (v.loader.clone(), v.samples),
            None    => return Err(anyhow!("no validation split attached")),
        };

        // dropout off, batch norm uses running statistics
        let model = self.model.valid();

        let mut seen = 0;
        for (i, batch) in loader.iter().enumerate() {
            seen += 1;
            let output = model.forward(batch.images);
            let preds: Vec<i64> = output.main.argmax(1).into_data().iter::<i64>().collect();
            let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
            metric.update(&preds, &targets);

            let (pix_acc, miou) = metric.get();
            tracing::debug!(
                "Epoch {}, sample {}, validation pixAcc: {:.3}%, mIoU: {:.3}%",
                epoch, i + 1, pix_acc * 100.0, miou * 100.0,
            );
        }

        if seen != samples {
            return Err(anyhow!(
                "validation scored {seen} of {samples} samples; a sample failed to load"
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        let recorder = CheckpointRecorder::default();
        let bytes = Recorder::<B>::record(&recorder, self.model.clone().into_record(), ())
            .map_err(|e| TrainError::Recorder(e.to_string()))?;
        Ok(bytes)
    }

    fn restore(&mut self, state: Vec<u8>) -> Result<()> {
        let recorder = CheckpointRecorder::default();
        let record: <FastScnn<B> as Module<B>>::Record = Recorder::<B>::load(&recorder, state, &self.device)
            .map_err(|e| TrainError::Recorder(e.to_string()))?;
        self.model = self.model.clone().load_record(record);
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{dataset::tests::write_pair, transform::SegTransform};
    use crate::ml::model::FastScnnConfig;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn session(cfg: &TrainConfig) -> BurnSession<B, impl Optimizer<FastScnn<B>, B>> {
        let device = Default::default();
        let model = FastScnnConfig::new(3).init::<B>(&device);
        let optim = sgd_config(cfg).init::<B, FastScnn<B>>();
        BurnSession::new(model, optim, cfg, device)
    }

    fn tiny_split(split: &str, samples: usize) -> (tempfile::TempDir, SegDataset) {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..samples {
            // label ids 7 and 8 map to train ids 0 and 1
            write_pair(tmp.path(), split, &format!("s{i}"), if i % 2 == 0 { 7 } else { 8 });
        }
        let ds = SegDataset::cityscapes(tmp.path(), split, SegTransform::new(64, 64)).unwrap();
        (tmp, ds)
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let cfg = TrainConfig::default();
        let mut a = session(&cfg);
        let bytes = a.snapshot().unwrap();
        assert!(!bytes.is_empty());

        let mut b = session(&cfg);
        assert_ne!(b.snapshot().unwrap(), bytes);
        b.restore(bytes.clone()).unwrap();
        assert_eq!(b.snapshot().unwrap(), bytes);

        a.restore(bytes.clone()).unwrap();
        assert_eq!(a.snapshot().unwrap(), bytes);
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let mut s = session(&TrainConfig::default());
        let err = s.restore(vec![1, 2, 3]).unwrap_err();
        assert!(err.downcast_ref::<TrainError>().is_some());
    }

    #[test]
    fn test_train_epoch_reports_every_step() {
        let cfg = TrainConfig { batch_size: 2, epochs: 2, ..TrainConfig::default() };
        let (_tmp, ds) = tiny_split("train", 3);
        let mut s = session(&cfg).with_train_data(ds);
        assert_eq!(s.batches_per_epoch(), 2);

        let mut steps = Vec::new();
        s.train_epoch(1, &mut |r| steps.push(r)).unwrap();

        assert_eq!(steps.iter().map(|r| r.batch).collect::<Vec<_>>(), vec![0, 1]);
        assert!(steps.iter().all(|r| r.loss.is_finite()));
        // poly schedule: T = 1*2 + i over N = 4
        assert!((steps[0].lr - 0.01 * 0.5f64.powf(0.9)).abs() < 1e-12);
        assert!(steps[1].lr < steps[0].lr);
    }

    #[test]
    fn test_train_without_data_fails() {
        let mut s = session(&TrainConfig::default());
        assert_eq!(s.batches_per_epoch(), 0);
        assert!(s.train_epoch(0, &mut |_| {}).is_err());
    }

    #[test]
    fn test_validate_feeds_metric() {
        let (_tmp, ds) = tiny_split("val", 2);
        let mut s = session(&TrainConfig::default()).with_val_data(ds);

        let mut metric = SegmentationMetric::new(3);
        s.validate(0, &mut metric).unwrap();

        let (pix_acc, miou) = metric.get();
        assert!((0.0..=1.0).contains(&pix_acc));
        assert!((0.0..=1.0).contains(&miou));
    }

    fn corrupt(tmp: &tempfile::TempDir, split: &str, name: &str) {
        let img = tmp.path().join(format!("leftImg8bit/{split}/city/{name}_leftImg8bit.png"));
        std::fs::write(img, b"junk").unwrap();
    }

    #[test]
    fn test_validate_fails_when_a_sample_goes_missing() {
        let (tmp, ds) = tiny_split("val", 4);
        corrupt(&tmp, "val", "s1");
        let mut s = session(&TrainConfig::default()).with_val_data(ds);

        let mut metric = SegmentationMetric::new(3);
        let err = s.validate(0, &mut metric).unwrap_err();
        assert!(err.to_string().contains("of 4 samples"), "{err}");
    }

    #[test]
    fn test_train_epoch_fails_when_a_sample_goes_missing() {
        let cfg = TrainConfig { batch_size: 1, epochs: 1, ..TrainConfig::default() };
        let (tmp, ds) = tiny_split("train", 3);
        corrupt(&tmp, "train", "s1");
        let mut s = session(&cfg).with_train_data(ds);

        let mut steps = 0;
        let err = s.train_epoch(0, &mut |_| steps += 1).unwrap_err();
        assert!(steps < 3);
        assert!(err.to_string().contains("of 3 training batches"), "{err}");
    }
}
