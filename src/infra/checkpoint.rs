// ============================================================
// Layer 6: Checkpoint Store
// ============================================================
// Persists serialized model parameters to the save folder.
//
// File naming convention:
//   <save_folder>/
//     <model>_<dataset>.pth              ← latest weights, overwritten each save
//     <model>_<dataset>_best_model.pth   ← byte copy of the latest file
//                                          whenever validation improved
//     <model>_<dataset>_config.json      ← TrainConfig of the run
//
// The store only deals in bytes. Turning a Burn module into bytes
// (and back) is the ML layer's job, see ml::trainer.
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::TrainError;
use crate::domain::traits::CheckpointSink;

/// Extensions accepted by `--resume`
pub const CHECKPOINT_EXTENSIONS: [&str; 2] = ["pth", "pkl"];

pub struct CheckpointStore {
    /// Directory checkpoints are written to (tilde already expanded)
    dir:  PathBuf,
    /// `<model>_<dataset>`
    stem: String,
}

impl CheckpointStore {
    /// Nothing is created on disk until the first save.
    pub fn new(save_folder: &str, model: &str, dataset: &str) -> Self {
        Self {
            dir:  expand_home(save_folder),
            stem: format!("{model}_{dataset}"),
        }
    }

    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self::new(&cfg.save_folder, &cfg.model, &cfg.dataset)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pth", self.stem))
    }

    pub fn best_path(&self) -> PathBuf {
        self.dir.join(format!("{}_best_model.pth", self.stem))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(format!("{}_config.json", self.stem))
    }

    /// Write the run configuration next to the checkpoints so a later
    /// `--eval --resume` can be matched with the hyperparameters used.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json).map_err(|e| TrainError::fs(&path, e))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// create_dir_all is a no-op when the directory already exists
    fn ensure_dir(&self) -> Result<(), TrainError> {
        fs::create_dir_all(&self.dir).map_err(|e| TrainError::fs(&self.dir, e))
    }
}

impl CheckpointSink for CheckpointStore {
    fn save(&self, state: &[u8], is_best: bool) -> Result<()> {
        self.ensure_dir()?;

        let latest = self.latest_path();
        fs::write(&latest, state).map_err(|e| TrainError::fs(&latest, e))?;
        tracing::debug!("Saved checkpoint '{}' ({} bytes)", latest.display(), state.len());

        if is_best {
            let best = self.best_path();
            fs::copy(&latest, &best).map_err(|e| TrainError::fs(&best, e))?;
            tracing::info!("New best model copied to '{}'", best.display());
        }
        Ok(())
    }
}

/// Reject resume paths whose extension is not one of CHECKPOINT_EXTENSIONS.
pub fn check_checkpoint_extension(path: &Path) -> Result<(), TrainError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if CHECKPOINT_EXTENSIONS.contains(&ext) {
        Ok(())
    } else {
        Err(TrainError::UnsupportedCheckpointFormat(path.to_path_buf()))
    }
}

/// Read the raw bytes of a checkpoint given to `--resume`.
pub fn read_checkpoint(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = expand_home(&path.as_ref().to_string_lossy());
    check_checkpoint_extension(&path)?;
    if !path.is_file() {
        return Err(TrainError::MissingCheckpoint(path).into());
    }
    fs::read(&path).with_context(|| format!("Cannot read checkpoint '{}'", path.display()))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
