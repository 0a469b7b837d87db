// ============================================================
// Layer 4: Cityscapes Layout
// ============================================================
// Finds (image, mask) file pairs in a Cityscapes-style tree and
// maps raw label ids onto the 19 training classes.
//
//   <root>/leftImg8bit/<split>/<city>/<name>_leftImg8bit.png
//   <root>/gtFine/<split>/<city>/<name>_gtFine_labelIds.png
//
// The "trainval" split is the union of "train" and "val".
//
// Reference: Cordts et al. (2016) The Cityscapes Dataset

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::TrainError;

pub const NUM_CLASSES: usize = 19;

/// Target value for pixels that take no part in loss or metrics
pub const IGNORE_LABEL: i32 = -1;

/// Raw label ids that are evaluated, in train-id order
const VALID_LABEL_IDS: [u8; NUM_CLASSES] = [
    7, 8, 11, 12, 13, 17, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 31, 32, 33,
];

/// Map a raw `*_labelIds.png` value to a train id in 0..19, or IGNORE_LABEL.
pub fn label_to_train_id(label_id: u8) -> i32 {
    VALID_LABEL_IDS
        .iter()
        .position(|&id| id == label_id)
        .map(|p| p as i32)
        .unwrap_or(IGNORE_LABEL)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image: PathBuf,
    pub mask:  PathBuf,
}

/// All image/mask pairs of `split` under `root`, sorted by image path.
pub fn discover_pairs(root: &Path, split: &str) -> Result<Vec<SamplePair>> {
    let mut pairs = if split == "trainval" {
        let mut all = split_pairs(root, "train")?;
        all.extend(split_pairs(root, "val")?);
        all
    } else {
        split_pairs(root, split)?
    };

    if pairs.is_empty() {
        return Err(TrainError::EmptyDataset { root: root.to_path_buf(), split: split.to_string() }.into());
    }
    pairs.sort_by(|a, b| a.image.cmp(&b.image));
    tracing::info!("Found {} images in {}/leftImg8bit/{}", pairs.len(), root.display(), split);
    Ok(pairs)
}

fn split_pairs(root: &Path, split: &str) -> Result<Vec<SamplePair>> {
    let img_dir  = root.join("leftImg8bit").join(split);
    let mask_dir = root.join("gtFine").join(split);

    if !img_dir.is_dir() {
        tracing::warn!("Image folder '{}' does not exist", img_dir.display());
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    for city in fs::read_dir(&img_dir)
        .with_context(|| format!("Cannot read directory '{}'", img_dir.display()))?
    {
        let city = city?.path();
        if !city.is_dir() {
            continue;
        }
        let city_name = match city.file_name() {
            Some(n) => n.to_owned(),
            None => continue,
        };

        for entry in fs::read_dir(&city)
            .with_context(|| format!("Cannot read directory '{}'", city.display()))?
        {
            let image = entry?.path();
            let Some(file_name) = image.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(".png") {
                continue;
            }

            let mask_name = file_name.replace("leftImg8bit", "gtFine_labelIds");
            let mask = mask_dir.join(&city_name).join(mask_name);
            if mask.is_file() {
                pairs.push(SamplePair { image, mask });
            } else {
                tracing::warn!("Cannot find the mask for image '{}'", image.display());
            }
        }
    }
    Ok(pairs)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(label_to_train_id(7), 0);   // road
        assert_eq!(label_to_train_id(26), 13); // car
        assert_eq!(label_to_train_id(33), 18); // bicycle
        assert_eq!(label_to_train_id(0), IGNORE_LABEL);
        assert_eq!(label_to_train_id(255), IGNORE_LABEL);
        let mapped = (0u8..=255).filter(|&i| label_to_train_id(i) != IGNORE_LABEL).count();
        assert_eq!(mapped, NUM_CLASSES);
    }

    #[test]
    fn test_discover_pairs_skips_unmatched_images() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("leftImg8bit/train/aachen/a_000001_leftImg8bit.png"));
        touch(&root.join("leftImg8bit/train/aachen/a_000002_leftImg8bit.png"));
        touch(&root.join("leftImg8bit/train/bonn/b_000001_leftImg8bit.png"));
        touch(&root.join("gtFine/train/aachen/a_000001_gtFine_labelIds.png"));
        touch(&root.join("gtFine/train/bonn/b_000001_gtFine_labelIds.png"));

        let pairs = discover_pairs(root, "train").unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].image.ends_with("aachen/a_000001_leftImg8bit.png"));
        assert!(pairs[0].mask.ends_with("aachen/a_000001_gtFine_labelIds.png"));
        assert!(pairs[1].image.ends_with("bonn/b_000001_leftImg8bit.png"));
    }

    #[test]
    fn test_trainval_unions_both_splits() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for split in ["train", "val"] {
            touch(&root.join(format!("leftImg8bit/{split}/c/x_leftImg8bit.png")));
            touch(&root.join(format!("gtFine/{split}/c/x_gtFine_labelIds.png")));
        }
        assert_eq!(discover_pairs(root, "trainval").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_split_is_empty_dataset_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_pairs(tmp.path(), "val").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::EmptyDataset { .. })
        ));
    }
}
