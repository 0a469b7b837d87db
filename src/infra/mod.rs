// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Cross-cutting concerns that touch the filesystem:
//
//   checkpoint.rs - Writes serialized model parameters to
//                   <save_folder>/<model>_<dataset>.pth, copies
//                   the best one aside, validates and reads
//                   --resume files, stores the run config.
//
//   metrics.rs    - Appends one CSV row per epoch (loss,
//                   learning rate, pixAcc, mIoU, best score).
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Epoch metrics CSV logger
pub mod metrics;
