// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Records one row per epoch to a CSV file in the save folder.
//
// Why a CSV next to the checkpoints?
//   - The .pth files hold weights only; the CSV says which epoch
//     produced the current best model and by how much
//   - Learning curves can be plotted straight from it
//   - A resumed run appends to the same file, so one run's
//     history survives restarts
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (as used by the loop, 0-based)
//   - train_loss: mean pixel cross-entropy over the epoch's batches
//   - lr:         learning rate of the last step in the epoch
//   - pix_acc:    validation pixel accuracy (empty when skipped)
//   - miou:       validation mean IoU       (empty when skipped)
//   - best_score: best (pixAcc + mIoU) / 2 so far
//
// Output file: <save_folder>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,lr,pix_acc,miou,best_score
//   0,1.934210,0.00999438,,,0.000000
//   1,1.512004,0.00998876,0.612000,0.201000,0.406500
//
// How to read the metrics:
//   - train_loss should fall; a flat loss with a tiny lr means
//     the poly schedule is near its end
//   - mIoU trails pix_acc: large classes (road, sky) dominate
//     pixel accuracy, rare ones only show up in mIoU
//   - best_score only ever rises; a row where it moves is an
//     epoch whose weights were copied to _best_model.pth
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::score::ValidationScore;

const HEADER: &str = "epoch,train_loss,lr,pix_acc,miou,best_score";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub lr:         f64,
    /// None when validation was skipped for this epoch
    pub validation: Option<ValidationScore>,
    pub best_score: f64,
}

impl EpochMetrics {
    fn to_csv_row(&self) -> String {
        let (acc, miou) = match self.validation {
            Some(v) => (format!("{:.6}", v.pix_acc), format!("{:.6}", v.miou)),
            None    => (String::new(), String::new()),
        };
        format!(
            "{},{:.6},{:.8},{},{},{:.6}",
            self.epoch, self.train_loss, self.lr, acc, miou, self.best_score,
        )
    }
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger in `dir`.
    /// Writes the CSV header if the file doesn't exist yet, so resumed
    /// runs keep appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;
        writeln!(f, "{}", m.to_csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, best={:.4}",
            m.epoch,
            m.train_loss,
            m.best_score,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
