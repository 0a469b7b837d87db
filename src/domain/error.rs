// ============================================================
// Layer 3: Error Taxonomy
// ============================================================
// Every failure the driver can report on its own, as opposed to
// errors bubbling up unchanged from Burn during a training step.
//
// The application layer wraps these in anyhow::Error with extra
// context, so callers only match on them in tests.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    /// `--model` does not name a registered architecture
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// `--dataset` does not name a registered dataset
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    /// A hyperparameter is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resume path has an extension other than .pth / .pkl
    #[error("unsupported checkpoint format '{}': only .pth and .pkl files are supported", .0.display())]
    UnsupportedCheckpointFormat(PathBuf),

    #[error("checkpoint '{}' does not exist", .0.display())]
    MissingCheckpoint(PathBuf),

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model record error: {0}")]
    Recorder(String),

    #[error("no image/label pairs found under {} for split '{split}'", root.display())]
    EmptyDataset { root: PathBuf, split: String },

    #[error("image {} is {}x{} but its mask is {}x{}", image.display(), image_size.0, image_size.1, mask_size.0, mask_size.1)]
    PairSizeMismatch {
        image:      PathBuf,
        image_size: (u32, u32),
        mask_size:  (u32, u32),
    },

    #[error("image decode error at {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl TrainError {
    /// Shorthand for wrapping an io::Error with the path it happened at
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrainError::Filesystem { path: path.into(), source }
    }
}
