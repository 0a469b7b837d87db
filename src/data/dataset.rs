use anyhow::Result;
use burn::data::dataset::Dataset;
use std::path::Path;

use crate::data::cityscapes::{discover_pairs, SamplePair};
use crate::data::transform::SegTransform;
use crate::domain::error::TrainError;

/// One transformed sample: a square crop of `size` x `size` pixels.
#[derive(Debug, Clone)]
pub struct SegItem {
    /// Normalised image, CHW, 3 * size * size
    pub image: Vec<f32>,
    /// Train ids, HW, size * size; IGNORE_LABEL for unlabelled pixels
    pub label: Vec<i32>,
    pub size:  usize,
}

/// Image/mask pairs decoded lazily when the loader asks for them.
#[derive(Debug)]
pub struct SegDataset {
    pairs:     Vec<SamplePair>,
    transform: SegTransform,
}

impl SegDataset {
    pub fn new(pairs: Vec<SamplePair>, transform: SegTransform) -> Self {
        Self { pairs, transform }
    }

    /// Discover `split` under a Cityscapes-style `root` and check every pair.
    ///
    /// Burn's loader ends an epoch at the first sample `get` cannot
    /// produce, so unreadable files must be rejected here, before a
    /// partial epoch can masquerade as a full one.
    pub fn cityscapes(root: &Path, split: &str, transform: SegTransform) -> Result<Self> {
        let pairs = discover_pairs(root, split)?;
        for pair in &pairs {
            check_pair(pair)?;
        }
        Ok(Self::new(pairs, transform))
    }

    pub fn sample_count(&self) -> usize {
        self.pairs.len()
    }

    /// Decode and transform one pair.
    pub fn load_item(&self, index: usize) -> Result<Option<SegItem>, TrainError> {
        let Some(pair) = self.pairs.get(index) else {
            return Ok(None);
        };
        let image = image::open(&pair.image)
            .map_err(|source| TrainError::Image { path: pair.image.clone(), source })?
            .to_rgb8();
        let mask = image::open(&pair.mask)
            .map_err(|source| TrainError::Image { path: pair.mask.clone(), source })?
            .to_luma8();

        let (image, label) = self.transform.apply(&image, &mask);
        Ok(Some(SegItem { image, label, size: self.transform.crop_size() }))
    }
}

/// Reads both headers; image and mask must agree on size.
fn check_pair(pair: &SamplePair) -> Result<(), TrainError> {
    let image = image::image_dimensions(&pair.image)
        .map_err(|source| TrainError::Image { path: pair.image.clone(), source })?;
    let mask = image::image_dimensions(&pair.mask)
        .map_err(|source| TrainError::Image { path: pair.mask.clone(), source })?;
    if image != mask {
        return Err(TrainError::PairSizeMismatch {
            image: pair.image.clone(),
            image_size: image,
            mask_size: mask,
        });
    }
    Ok(())
}

impl Dataset<SegItem> for SegDataset {
    fn get(&self, index: usize) -> Option<SegItem> {
        match self.load_item(index) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!("Cannot load sample {index}: {e}");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::fs;

    /// Writes one 8x4 image/mask pair in Cityscapes layout
    pub(crate) fn write_pair(root: &Path, split: &str, name: &str, label_id: u8) {
        let img_dir = root.join("leftImg8bit").join(split).join("city");
        let mask_dir = root.join("gtFine").join(split).join("city");
        fs::create_dir_all(&img_dir).unwrap();
        fs::create_dir_all(&mask_dir).unwrap();
        RgbImage::from_pixel(8, 4, Rgb([128, 64, 32]))
            .save(img_dir.join(format!("{name}_leftImg8bit.png")))
            .unwrap();
        GrayImage::from_pixel(8, 4, Luma([label_id]))
            .save(mask_dir.join(format!("{name}_gtFine_labelIds.png")))
            .unwrap();
    }

    #[test]
    fn test_get_decodes_and_transforms() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "train", "a", 26);
        write_pair(tmp.path(), "train", "b", 7);

        let ds = SegDataset::cityscapes(tmp.path(), "train", SegTransform::new(8, 4)).unwrap();
        assert_eq!(ds.len(), 2);

        let item = ds.get(0).unwrap();
        assert_eq!(item.size, 4);
        assert_eq!(item.image.len(), 3 * 16);
        assert!(item.label.iter().all(|&l| l == 13));

        let item = ds.get(1).unwrap();
        assert!(item.label.iter().all(|&l| l == 0));

        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_corrupt_image_fails_when_opening_split() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            write_pair(tmp.path(), "val", name, 7);
        }
        let img = tmp.path().join("leftImg8bit/val/city/b_leftImg8bit.png");
        fs::write(&img, b"not a png").unwrap();

        let err = SegDataset::cityscapes(tmp.path(), "val", SegTransform::new(8, 4)).unwrap_err();
        match err.downcast_ref::<TrainError>() {
            Some(TrainError::Image { path, .. }) => assert_eq!(path, &img),
            other => panic!("expected an image error, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_mask_fails_when_opening_split() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "train", "a", 7);
        fs::write(tmp.path().join("gtFine/train/city/a_gtFine_labelIds.png"), b"").unwrap();

        let err = SegDataset::cityscapes(tmp.path(), "train", SegTransform::new(8, 4)).unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Image { .. })));
    }

    #[test]
    fn test_mask_of_other_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "train", "a", 7);
        GrayImage::from_pixel(4, 4, Luma([7]))
            .save(tmp.path().join("gtFine/train/city/a_gtFine_labelIds.png"))
            .unwrap();

        let err = SegDataset::cityscapes(tmp.path(), "train", SegTransform::new(8, 4)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::PairSizeMismatch { image_size: (8, 4), mask_size: (4, 4), .. })
        ));
    }
}
