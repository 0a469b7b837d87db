// ============================================================
// Layer 4: Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<SegItem> into
// device tensors.
//
//   Input:  N SegItems, each a size x size crop
//   Output: SegBatch { images [N, 3, S, S], targets [N, S, S] }
//
// All items share one crop size (the transform guarantees it),
// so stacking is a flatten + reshape with no padding.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SegItem;

// ─── SegBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Normalised images - shape: [batch, 3, size, size]
    pub images: Tensor<B, 4>,

    /// Train ids, -1 for ignored pixels - shape: [batch, size, size]
    pub targets: Tensor<B, 3, Int>,
}

// ─── SegBatcher ───────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct SegBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SegItem, SegBatch<B>> for SegBatcher<B> {
    fn batch(&self, items: Vec<SegItem>) -> SegBatch<B> {
        let batch_size = items.len();
        let size = items.first().map(|i| i.size).unwrap_or(0);

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .flat_map(|s| s.label.iter().copied())
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 3, size, size]),
            &self.device,
        );
        let targets = Tensor::<B, 3, Int>::from_data(
            TensorData::new(labels, [batch_size, size, size]),
            &self.device,
        );

        SegBatch { images, targets }
    }
}
