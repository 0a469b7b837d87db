// ============================================================
// Layer 5: Segmentation Loss
// ============================================================
// Pixel-wise cross entropy that skips ignore-label pixels:
//
//   loss = -(1/|V|) Σ_{p ∈ V} log softmax(logits_p)[target_p]
//
// where V is the set of pixels with a non-negative target.
// Burn's CrossEntropyLoss gathers at the target index before it
// masks, so a -1 target would index out of range; here ignored
// pixels are pointed at class 0 and zero-weighted instead.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::ml::model::SegOutput;

/// logits: [N, C, H, W], targets: [N, H, W] → scalar [1]
pub fn pixel_cross_entropy<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 3, Int>) -> Tensor<B, 1> {
    let [n, c, h, w] = logits.dims();
    let pixels = n * h * w;

    let logits = logits.permute([0, 2, 3, 1]).reshape([pixels, c]);
    let targets = targets.reshape([pixels]);

    let valid = targets.clone().greater_equal_elem(0);
    let safe_targets = targets.mask_fill(valid.clone().bool_not(), 0);

    let picked = log_softmax(logits, 1)
        .gather(1, safe_targets.unsqueeze_dim::<2>(1))
        .reshape([pixels]);

    let weights = valid.float();
    let count = weights.clone().sum().clamp_min(1.0);
    (picked * weights).sum().neg() / count
}

/// Main loss plus `aux_weight` times the auxiliary loss when the model has an aux head.
pub fn segmentation_loss<B: Backend>(
    output:     SegOutput<B>,
    targets:    Tensor<B, 3, Int>,
    aux_weight: f64,
) -> Tensor<B, 1> {
    match output.aux {
        Some(aux) => {
            let main = pixel_cross_entropy(output.main, targets.clone());
            main + pixel_cross_entropy(aux, targets).mul_scalar(aux_weight)
        }
        None => pixel_cross_entropy(output.main, targets),
    }
}
