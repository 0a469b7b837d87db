// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands a TrainConfig to
// Layer 2. There is a single command: train (or, with --eval,
// evaluate).
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::TrainArgs;

use crate::application::train_use_case::TrainUseCase;

#[derive(Parser, Debug)]
#[command(
    name = "fast-scnn-train",
    version,
    about = "Train or evaluate Fast-SCNN semantic segmentation on Cityscapes."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: TrainArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let eval = self.args.eval;
        TrainUseCase::new(self.args.into()).execute()?;
        if !eval {
            println!("Training complete.");
        }
        Ok(())
    }
}
