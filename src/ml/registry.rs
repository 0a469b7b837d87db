// ============================================================
// Layer 5: Model Registry
// ============================================================
// Maps the `--model` name to a constructor. The name list is also
// handed to clap so an unknown name fails at argument parsing.

use burn::prelude::*;

use crate::domain::error::TrainError;
use crate::ml::model::{FastScnn, FastScnnConfig};

/// Names accepted by `--model`
pub const MODELS: [&str; 1] = ["fast_scnn"];

pub fn build_model<B: Backend>(
    name:        &str,
    num_classes: usize,
    aux:         bool,
    device:      &B::Device,
) -> Result<FastScnn<B>, TrainError> {
    match name {
        "fast_scnn" => {
            tracing::info!("Building Fast-SCNN: {} classes, aux head {}", num_classes, aux);
            Ok(FastScnnConfig::new(num_classes).with_aux(aux).init(device))
        }
        other => Err(TrainError::UnknownModel(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_every_listed_model_builds() {
        let device = Default::default();
        for name in MODELS {
            assert!(build_model::<NdArray<f32>>(name, 3, false, &device).is_ok());
        }
    }

    #[test]
    fn test_unknown_model() {
        let device = Default::default();
        let err = build_model::<NdArray<f32>>("bisenet", 3, false, &device).unwrap_err();
        assert!(matches!(err, TrainError::UnknownModel(name) if name == "bisenet"));
    }
}
