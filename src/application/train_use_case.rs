// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates a full run in order:
//
//   Step 1: Validate the configuration          (this layer)
//   Step 2: Open the dataset splits             (Layer 4 - data)
//   Step 3: Build model + SGD optimiser         (Layer 5 - ml)
//   Step 4: Locate the checkpoint store         (Layer 6 - infra)
//   Step 5: Resume weights if asked             (Layer 2 - loop)
//   Step 6: Train, or validate once with --eval (Layer 2 - loop)
//           Only a training run writes to the save folder.
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::training_loop::TrainingLoop;
use crate::data::{
    registry::{open_dataset, DatasetInfo, DATASETS},
    transform::MAX_IMAGE_SIZE,
};
use crate::domain::error::TrainError;
use crate::infra::{
    checkpoint::{check_checkpoint_extension, expand_home, CheckpointStore},
    metrics::MetricsLogger,
};
use crate::ml::{
    model::FastScnn,
    registry::{build_model, MODELS},
    trainer::{sgd_config, BurnSession},
    ADBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Built once from the
// command line and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model:        String,
    pub dataset:      String,
    pub data_root:    String,
    pub base_size:    usize,
    pub crop_size:    usize,
    pub train_split:  String,
    pub val_split:    String,
    pub aux:          bool,
    pub aux_weight:   f64,
    pub epochs:       usize,
    pub start_epoch:  usize,
    pub batch_size:   usize,
    pub lr:           f64,
    pub momentum:     f64,
    pub weight_decay: f64,
    pub resume:       Option<String>,
    pub save_folder:  String,
    pub eval:         bool,
    pub no_val:       bool,
    pub workers:      usize,
    pub seed:         u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model:        "fast_scnn".to_string(),
            dataset:      "citys".to_string(),
            data_root:    "./datasets/citys".to_string(),
            base_size:    1024,
            crop_size:    768,
            train_split:  "train".to_string(),
            val_split:    "val".to_string(),
            aux:          false,
            aux_weight:   0.4,
            epochs:       160,
            start_epoch:  0,
            batch_size:   2,
            lr:           1e-2,
            momentum:     0.9,
            weight_decay: 1e-4,
            resume:       None,
            save_folder:  "./weights".to_string(),
            eval:         false,
            no_val:       true,
            workers:      1,
            seed:         42,
        }
    }
}

impl TrainConfig {
    /// Fail fast on anything that would only blow up mid-run.
    pub fn validate(&self) -> Result<(), TrainError> {
        if !MODELS.contains(&self.model.as_str()) {
            return Err(TrainError::UnknownModel(self.model.clone()));
        }
        if !DATASETS.contains(&self.dataset.as_str()) {
            return Err(TrainError::UnknownDataset(self.dataset.clone()));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch size must be at least 1".into()));
        }
        if self.base_size == 0 || self.crop_size == 0 {
            return Err(TrainError::InvalidConfig("image sizes must be positive".into()));
        }
        if self.base_size > MAX_IMAGE_SIZE || self.crop_size > MAX_IMAGE_SIZE {
            return Err(TrainError::InvalidConfig(format!(
                "image sizes must not exceed {MAX_IMAGE_SIZE} (base {}, crop {})",
                self.base_size, self.crop_size,
            )));
        }
        if !(self.lr > 0.0) {
            return Err(TrainError::InvalidConfig(format!("learning rate {} is not positive", self.lr)));
        }
        if let Some(path) = &self.resume {
            check_checkpoint_extension(&expand_home(path))?;
        }
        Ok(())
    }

    /// Whether a validation split is needed for this run
    fn needs_val_split(&self) -> bool {
        self.eval || !self.no_val
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 2: Datasets ──────────────────────────────────────────────────
        let info = DatasetInfo::lookup(&cfg.dataset)?;
        let device = Default::default();

        let train_set = if cfg.eval {
            None
        } else {
            let ds = open_dataset(&cfg.dataset, &cfg.data_root, &cfg.train_split, cfg.base_size, cfg.crop_size)?;
            tracing::info!("Training split '{}': {} samples", cfg.train_split, ds.sample_count());
            Some(ds)
        };
        let val_set = if cfg.needs_val_split() {
            let ds = open_dataset(&cfg.dataset, &cfg.data_root, &cfg.val_split, cfg.base_size, cfg.crop_size)?;
            tracing::info!("Validation split '{}': {} samples", cfg.val_split, ds.sample_count());
            Some(ds)
        } else {
            None
        };

        // ── Step 3: Model + optimiser ─────────────────────────────────────────
        let model = build_model::<ADBackend>(&cfg.model, info.num_classes, cfg.aux, &device)?;
        let optim = sgd_config(cfg).init::<ADBackend, FastScnn<ADBackend>>();
        let mut session = BurnSession::new(model, optim, cfg, device);
        if let Some(ds) = train_set {
            session = session.with_train_data(ds);
        }
        if let Some(ds) = val_set {
            session = session.with_val_data(ds);
        }

        // ── Step 4: Checkpoint store ──────────────────────────────────────────
        let store = CheckpointStore::from_config(cfg);
        let mut training = TrainingLoop::new(cfg, info.num_classes, &store);

        // ── Step 5: Resume ────────────────────────────────────────────────────
        if let Some(path) = &cfg.resume {
            training.resume(&mut session, path)?;
        }

        // ── Step 6: Run ───────────────────────────────────────────────────────
        if cfg.eval {
            tracing::info!("Evaluation model: {}", cfg.resume.as_deref().unwrap_or("<untrained>"));
            let score = training.validation(&mut session, cfg.start_epoch)?;
            println!(
                "pixAcc: {:.3}%, mIoU: {:.3}%",
                score.pix_acc * 100.0,
                score.miou * 100.0,
            );
            return Ok(());
        }

        store.save_config(cfg)?;
        tracing::info!("Starting Epoch: {}, Total Epochs: {}", cfg.start_epoch, cfg.epochs);
        let metrics = MetricsLogger::new(store.dir())?;
        tracing::info!("Epoch metrics: {}", metrics.csv_path().display());
        let mut training = training.with_metrics_log(metrics);
        let summary = training.run(&mut session)?;
        tracing::info!(
            "Training complete: {} epochs, {} iterations, {} checkpoints, best score {:.4}",
            summary.epochs_run,
            summary.iterations,
            summary.saves,
            summary.best_score,
        );
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_validation() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_names_rejected() {
        let cfg = TrainConfig { model: "unet".into(), ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::UnknownModel(_))));

        let cfg = TrainConfig { dataset: "ade20k".into(), ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::UnknownDataset(_))));
    }

    #[test]
    fn test_resume_extension_checked_up_front() {
        let cfg = TrainConfig { resume: Some("model.txt".into()), ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::UnsupportedCheckpointFormat(_))));

        for ok in ["model.pth", "model.pkl"] {
            let cfg = TrainConfig { resume: Some(ok.into()), ..TrainConfig::default() };
            assert!(cfg.validate().is_ok(), "{ok} should be accepted");
        }
    }

    #[test]
    fn test_oversized_images_rejected() {
        let cfg = TrainConfig { crop_size: MAX_IMAGE_SIZE + 1, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::InvalidConfig(_))));

        let cfg = TrainConfig { base_size: usize::MAX, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::InvalidConfig(_))));

        let cfg = TrainConfig { base_size: MAX_IMAGE_SIZE, crop_size: MAX_IMAGE_SIZE, ..TrainConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let cfg = TrainConfig { batch_size: 0, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::InvalidConfig(_))));
    }

    #[test]
    fn test_val_split_needed_only_when_used() {
        assert!(!TrainConfig::default().needs_val_split());
        assert!(TrainConfig { no_val: false, ..TrainConfig::default() }.needs_val_split());
        assert!(TrainConfig { eval: true, ..TrainConfig::default() }.needs_val_split());
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg = TrainConfig { resume: Some("w.pth".into()), aux: true, ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.resume.as_deref(), Some("w.pth"));
        assert!(back.aux);
        assert_eq!(back.crop_size, 768);
    }
}
