/// Polynomial learning-rate decay over the whole run:
///
///   lr(T) = base_lr * (1 - T / N) ^ power,   N = epochs * iters_per_epoch
///
/// T past N is clamped, so the rate bottoms out at zero.
#[derive(Debug, Clone, Copy)]
pub struct PolyLr {
    base_lr:     f64,
    total_iters: usize,
    power:       f64,
}

impl PolyLr {
    pub const DEFAULT_POWER: f64 = 0.9;

    pub fn new(base_lr: f64, epochs: usize, iters_per_epoch: usize) -> Self {
        Self {
            base_lr,
            total_iters: epochs * iters_per_epoch,
            power: Self::DEFAULT_POWER,
        }
    }

    pub fn at(&self, iter: usize) -> f64 {
        if self.total_iters == 0 {
            return self.base_lr;
        }
        let t = iter.min(self.total_iters) as f64;
        self.base_lr * (1.0 - t / self.total_iters as f64).powf(self.power)
    }
}
