// ============================================================
// Layer 4: Dataset Registry
// ============================================================
// Maps the `--dataset` name to the dataset's class count and the
// function that opens one of its splits. The name list is also
// handed to clap so an unknown name fails at argument parsing.

use anyhow::Result;
use std::path::Path;

use crate::data::{cityscapes, dataset::SegDataset, transform::SegTransform};
use crate::domain::error::TrainError;

/// Names accepted by `--dataset`
pub const DATASETS: [&str; 1] = ["citys"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    pub name:        &'static str,
    pub num_classes: usize,
}

impl DatasetInfo {
    pub fn lookup(name: &str) -> Result<Self, TrainError> {
        match name {
            "citys" => Ok(Self { name: "citys", num_classes: cityscapes::NUM_CLASSES }),
            other   => Err(TrainError::UnknownDataset(other.to_string())),
        }
    }
}

/// Open `split` of the dataset called `name` rooted at `root`.
pub fn open_dataset(
    name:      &str,
    root:      &str,
    split:     &str,
    base_size: usize,
    crop_size: usize,
) -> Result<SegDataset> {
    let transform = SegTransform::new(base_size, crop_size);
    match DatasetInfo::lookup(name)?.name {
        "citys" => SegDataset::cityscapes(Path::new(root), split, transform),
        other   => Err(TrainError::UnknownDataset(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_dataset_resolves() {
        for name in DATASETS {
            assert!(DatasetInfo::lookup(name).is_ok(), "{name} is listed but not registered");
        }
        assert_eq!(DatasetInfo::lookup("citys").unwrap().num_classes, 19);
    }

    #[test]
    fn test_unknown_dataset() {
        assert!(matches!(DatasetInfo::lookup("voc"), Err(TrainError::UnknownDataset(_))));
        assert!(open_dataset("voc", ".", "train", 8, 8).is_err());
    }
}
