// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from a Cityscapes-style directory tree to
// device-ready tensor batches:
//
//   leftImg8bit/ + gtFine/
//       │
//       ▼
//   cityscapes    → finds image/mask pairs, label id → train id
//       │
//       ▼
//   transform     → resize, centre crop, normalise
//       │
//       ▼
//   SegDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   SegBatcher    → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader    → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Cityscapes directory layout and label mapping
pub mod cityscapes;

/// Deterministic resize / crop / normalise
pub mod transform;

/// Implements Burn's Dataset trait for segmentation samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// `--dataset` name → dataset
pub mod registry;
