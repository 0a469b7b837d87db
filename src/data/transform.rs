// ============================================================
// Layer 4: Image / Mask Transform
// ============================================================
// Turns a decoded RGB image and its label-id mask into fixed-size
// training tensors (as flat Vecs):
//
//   1. Resize so the long side equals base_size, keeping aspect
//      (bilinear for the image, nearest for the mask so no new
//      label values are invented)
//   2. Centre crop to crop_size x crop_size, padding with black
//      image pixels and ignore-label mask pixels if too small
//   3. Normalise the image with ImageNet mean/std, CHW layout
//   4. Map raw label ids to train ids
//
// Deterministic: the same pair always yields the same tensors.
//
// Reference: image crate documentation (imageops::resize)

use image::{imageops::FilterType, GrayImage, RgbImage};

use crate::data::cityscapes::{label_to_train_id, IGNORE_LABEL};

pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD:  [f32; 3] = [0.229, 0.224, 0.225];

/// Largest accepted `--base-size` / `--crop-size`, in pixels
pub const MAX_IMAGE_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy)]
pub struct SegTransform {
    base_size: u32,
    crop_size: u32,
}

impl SegTransform {
    pub fn new(base_size: usize, crop_size: usize) -> Self {
        Self {
            base_size: base_size.clamp(1, MAX_IMAGE_SIZE) as u32,
            crop_size: crop_size.clamp(1, MAX_IMAGE_SIZE) as u32,
        }
    }

    pub fn crop_size(&self) -> usize {
        self.crop_size as usize
    }

    /// Returns (image CHW normalised, label train ids HW).
    pub fn apply(&self, image: &RgbImage, mask: &GrayImage) -> (Vec<f32>, Vec<i32>) {
        let (ow, oh) = self.scaled_dims(image.width(), image.height());
        let image = image::imageops::resize(image, ow, oh, FilterType::Triangle);
        let mask  = image::imageops::resize(mask, ow, oh, FilterType::Nearest);

        let crop = self.crop_size;
        // negative offset means the crop is larger than the image: pad
        let x0 = (ow as i64 - crop as i64) / 2;
        let y0 = (oh as i64 - crop as i64) / 2;

        let plane = crop as usize * crop as usize;
        let mut pixels = vec![0f32; 3 * plane];
        let mut labels = vec![IGNORE_LABEL; plane];

        for y in 0..crop {
            for x in 0..crop {
                let sx = x as i64 + x0;
                let sy = y as i64 + y0;
                let idx = (y * crop + x) as usize;

                let inside = sx >= 0 && sy >= 0 && sx < ow as i64 && sy < oh as i64;
                let rgb = if inside {
                    labels[idx] = label_to_train_id(mask.get_pixel(sx as u32, sy as u32).0[0]);
                    image.get_pixel(sx as u32, sy as u32).0
                } else {
                    [0, 0, 0]
                };

                for c in 0..3 {
                    pixels[c * plane + idx] = (rgb[c] as f32 / 255.0 - MEAN[c]) / STD[c];
                }
            }
        }

        (pixels, labels)
    }

    /// Long side → base_size, short side scaled and rounded.
    fn scaled_dims(&self, w: u32, h: u32) -> (u32, u32) {
        let long = self.base_size as f64;
        if w >= h {
            let oh = (h as f64 * long / w.max(1) as f64 + 0.5) as u32;
            (self.base_size, oh.max(1))
        } else {
            let ow = (w as f64 * long / h.max(1) as f64 + 0.5) as u32;
            (ow.max(1), self.base_size)
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_scaled_dims_keep_aspect() {
        let t = SegTransform::new(1024, 768);
        assert_eq!(t.scaled_dims(2048, 1024), (1024, 512));
        assert_eq!(t.scaled_dims(1000, 2000), (512, 1024));
    }

    #[test]
    fn test_output_shapes() {
        let t = SegTransform::new(16, 8);
        let img = RgbImage::from_pixel(32, 16, Rgb([10, 20, 30]));
        let mask = GrayImage::from_pixel(32, 16, Luma([7]));
        let (pixels, labels) = t.apply(&img, &mask);
        assert_eq!(pixels.len(), 3 * 8 * 8);
        assert_eq!(labels.len(), 8 * 8);
        // 16x8 after resize, 8x8 crop fits entirely inside
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_padding_uses_ignore_label() {
        // 8x4 scaled to 8x4, cropped to 8x8 → top two and bottom two rows padded
        let t = SegTransform::new(8, 8);
        let img = RgbImage::from_pixel(8, 4, Rgb([255, 255, 255]));
        let mask = GrayImage::from_pixel(8, 4, Luma([26]));
        let (pixels, labels) = t.apply(&img, &mask);

        assert_eq!(labels[0], IGNORE_LABEL);
        assert_eq!(labels[3 * 8], 13);
        assert_eq!(labels[7 * 8 + 7], IGNORE_LABEL);

        let black_r = (0.0 - MEAN[0]) / STD[0];
        let white_r = (1.0 - MEAN[0]) / STD[0];
        assert!((pixels[0] - black_r).abs() < 1e-5);
        assert!((pixels[3 * 8] - white_r).abs() < 1e-5);
    }

    #[test]
    fn test_mask_resize_invents_no_labels() {
        let t = SegTransform::new(7, 7);
        let img = RgbImage::new(4, 4);
        let mask = GrayImage::from_fn(4, 4, |x, _| if x < 2 { Luma([7]) } else { Luma([8]) });
        let (_, labels) = t.apply(&img, &mask);
        assert!(labels.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_sizes_clamped_to_limit() {
        let t = SegTransform::new(usize::MAX, MAX_IMAGE_SIZE + 1);
        assert_eq!(t.crop_size(), MAX_IMAGE_SIZE);
        assert_eq!(SegTransform::new(0, 0).crop_size(), 1);
    }
}
