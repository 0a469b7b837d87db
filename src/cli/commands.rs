// ============================================================
// Layer 1: CLI Arguments
// ============================================================
// Every training hyperparameter as a --flag. Model and dataset
// names are checked against the registries while parsing, so a
// typo never reaches the training code.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{builder::PossibleValuesParser, ArgAction, Args};

use crate::application::train_use_case::TrainConfig;
use crate::data::registry::DATASETS;
use crate::ml::registry::MODELS;

/// All arguments for a training (or evaluation) run.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Model architecture
    #[arg(long, default_value = "fast_scnn", value_parser = PossibleValuesParser::new(MODELS))]
    pub model: String,

    /// Dataset name
    #[arg(long, default_value = "citys", value_parser = PossibleValuesParser::new(DATASETS))]
    pub dataset: String,

    /// Dataset root holding leftImg8bit/ and gtFine/
    #[arg(long, default_value = "./datasets/citys")]
    pub data_root: String,

    /// Long side of the resized image
    #[arg(long, default_value_t = 1024)]
    pub base_size: usize,

    /// Side of the square crop fed to the network
    #[arg(long, default_value_t = 768)]
    pub crop_size: usize,

    #[arg(long, default_value = "train")]
    pub train_split: String,

    #[arg(long, default_value = "val")]
    pub val_split: String,

    /// Train the auxiliary head as well
    #[arg(long)]
    pub aux: bool,

    /// Weight of the auxiliary loss
    #[arg(long, default_value_t = 0.4)]
    pub aux_weight: f64,

    /// Number of epochs to train
    #[arg(long, default_value_t = 160)]
    pub epochs: usize,

    /// Epoch to start from (useful with --resume)
    #[arg(long = "start_epoch", default_value_t = 0)]
    pub start_epoch: usize,

    /// Samples per training step
    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    /// Base learning rate, decayed with the poly schedule
    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// Checkpoint to load before training (.pth or .pkl)
    #[arg(long)]
    pub resume: Option<String>,

    /// Directory for checkpoints, config and metrics
    #[arg(long, default_value = "./weights")]
    pub save_folder: String,

    /// Run one validation pass and exit
    #[arg(long)]
    pub eval: bool,

    /// Skip per-epoch validation. `--no-val false` turns it on.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
    )]
    pub no_val: bool,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            model:        a.model,
            dataset:      a.dataset,
            data_root:    a.data_root,
            base_size:    a.base_size,
            crop_size:    a.crop_size,
            train_split:  a.train_split,
            val_split:    a.val_split,
            aux:          a.aux,
            aux_weight:   a.aux_weight,
            epochs:       a.epochs,
            start_epoch:  a.start_epoch,
            batch_size:   a.batch_size,
            lr:           a.lr,
            momentum:     a.momentum,
            weight_decay: a.weight_decay,
            resume:       a.resume,
            save_folder:  a.save_folder,
            eval:         a.eval,
            no_val:       a.no_val,
            workers:      a.workers,
            seed:         a.seed,
        }
    }
}
