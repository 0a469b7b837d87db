// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All Burn model, loss and optimiser code lives here. The
// application layer only sees the TrainSession trait and the
// handful of constructors below.
//
//   model.rs    - Fast-SCNN: learning-to-downsample, global
//                 feature extractor with pyramid pooling,
//                 feature fusion, classifier, optional aux head
//
//   loss.rs     - pixel cross entropy with ignore label,
//                 plus the weighted auxiliary term
//
//   lr.rs       - polynomial learning-rate decay
//
//   registry.rs - `--model` name → constructor
//
//   trainer.rs  - BurnSession: forward, backward, SGD step,
//                 evaluation pass, parameter snapshots
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Poudel et al. (2019) Fast-SCNN

/// Fast-SCNN architecture
pub mod model;

/// Segmentation loss
pub mod loss;

/// Poly learning-rate schedule
pub mod lr;

/// Model name registry
pub mod registry;

/// TrainSession backed by Burn
pub mod trainer;

// ─── Backend ──────────────────────────────────────────────────────────────────
// CPU by default; `--features wgpu` trains on the GPU.
#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::NdArray;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
