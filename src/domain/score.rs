use serde::{Deserialize, Serialize};

/// Outcome of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationScore {
    pub pix_acc: f64,
    pub miou:    f64,
}

impl ValidationScore {
    pub fn new(pix_acc: f64, miou: f64) -> Self {
        Self { pix_acc, miou }
    }

    /// The single number used to rank checkpoints
    pub fn combined(&self) -> f64 {
        (self.pix_acc + self.miou) / 2.0
    }
}

/// Best combined validation score seen so far in a run.
///
/// Only ever moves up: `offer` replaces the value when the new
/// score is strictly greater and reports whether it did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BestScore(f64);

impl BestScore {
    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn offer(&mut self, score: f64) -> bool {
        if score > self.0 {
            self.0 = score;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_is_mean() {
        let s = ValidationScore::new(0.80, 0.60);
        assert!((s.combined() - 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_best_starts_at_zero() {
        assert_eq!(BestScore::default().value(), 0.0);
    }

    #[test]
    fn test_offer_is_strict_and_monotonic() {
        let mut best = BestScore::default();
        let mut seen = Vec::new();
        for s in [0.3, 0.2, 0.3, 0.5, 0.1, 0.5, 0.6] {
            best.offer(s);
            seen.push(best.value());
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(best.value(), 0.6);

        // equal score is not an improvement
        assert!(!best.offer(0.6));
        assert!(best.offer(0.61));
    }
}
