// ============================================================
// Layer 3: Segmentation Metric
// ============================================================
// Accumulates per-pixel predictions against ground truth over a
// whole validation split and reports:
//
//   pixAcc = correct pixels / labelled pixels
//   mIoU   = mean over classes of  intersection / union
//
// Pixels whose ground truth is outside 0..num_classes (the
// ignore label -1) count for nothing: they are neither labelled
// nor part of any class's prediction area.
//
// Plain Rust on host vectors: the ML layer pulls argmax maps off
// the device before calling update().

/// Matches numpy's `np.spacing(1)` so empty denominators give 0
const EPS: f64 = f64::EPSILON;

#[derive(Debug, Clone)]
pub struct SegmentationMetric {
    num_classes:   usize,
    total_correct: u64,
    total_label:   u64,
    total_inter:   Vec<u64>,
    total_union:   Vec<u64>,
}

impl SegmentationMetric {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            total_correct: 0,
            total_label:   0,
            total_inter:   vec![0; num_classes],
            total_union:   vec![0; num_classes],
        }
    }

    /// Clear all accumulated counts (start of a validation pass)
    pub fn reset(&mut self) {
        self.total_correct = 0;
        self.total_label   = 0;
        self.total_inter.iter_mut().for_each(|v| *v = 0);
        self.total_union.iter_mut().for_each(|v| *v = 0);
    }

    /// Add one batch of predicted class ids and target class ids.
    ///
    /// Both slices are flattened pixel maps of the same length.
    pub fn update(&mut self, preds: &[i64], targets: &[i64]) {
        debug_assert_eq!(preds.len(), targets.len());
        let n = self.num_classes as i64;

        let mut area_pred  = vec![0u64; self.num_classes];
        let mut area_label = vec![0u64; self.num_classes];
        let mut area_inter = vec![0u64; self.num_classes];

        for (&p, &t) in preds.iter().zip(targets) {
            if t < 0 || t >= n {
                continue;
            }
            self.total_label += 1;
            area_label[t as usize] += 1;

            if p >= 0 && p < n {
                area_pred[p as usize] += 1;
                if p == t {
                    self.total_correct += 1;
                    area_inter[p as usize] += 1;
                }
            }
        }

        for c in 0..self.num_classes {
            self.total_inter[c] += area_inter[c];
            self.total_union[c] += area_pred[c] + area_label[c] - area_inter[c];
        }
    }

    /// Returns (pixAcc, mIoU) over everything seen since the last reset.
    pub fn get(&self) -> (f64, f64) {
        let pix_acc = self.total_correct as f64 / (EPS + self.total_label as f64);

        if self.num_classes == 0 {
            return (pix_acc, 0.0);
        }
        let iou_sum: f64 = self
            .total_inter
            .iter()
            .zip(&self.total_union)
            .map(|(&i, &u)| i as f64 / (EPS + u as f64))
            .sum();

        (pix_acc, iou_sum / self.num_classes as f64)
    }
}
