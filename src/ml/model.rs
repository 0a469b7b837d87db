// ============================================================
// Layer 5: Fast-SCNN
// ============================================================
// Two-branch real-time segmentation network (Poudel et al. 2019):
//
//   input ─► LearningToDownsample ─┬─────────────────────┐  1/8
//                                  ▼                     │
//                        GlobalFeatureExtractor          │  1/32
//                                  ▼                     ▼
//                               FeatureFusion ◄──────────┘  1/8
//                                  ▼
//                              Classifier ─► upsample to input size
//
// With `aux` set, an extra head on the 1/8 branch produces a
// second logit map used for the auxiliary loss.
//
// Reference: Burn Book §3 (Building Blocks)
//            Poudel et al. (2019) Fast-SCNN

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig,
        Dropout, DropoutConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Bottleneck expansion factor
const EXPANSION: usize = 6;
const PYRAMID_BINS: [usize; 4] = [1, 2, 3, 6];

// ─── Bilinear resize ──────────────────────────────────────────────────────────
// Bilinear interpolation is separable, so a resize of [N, C, H, W]
// to [N, C, H', W'] is two matrix products:
//
//   out = Ry · x · Rxᵀ,   Ry: [H', H],  Rx: [W', W]
//
// Each row of R has at most two non-zero weights (align_corners:
// output ends land exactly on input ends). NdArray has no backward
// pass for bilinear `interpolate`; matmul has one on every backend.

/// Row-major [out, in] interpolation weights along one axis.
fn bilinear_weights(input: usize, output: usize) -> Vec<f32> {
    let mut weights = vec![0.0f32; output * input];
    for o in 0..output {
        let src = if output > 1 {
            o as f64 * (input - 1) as f64 / (output - 1) as f64
        } else {
            0.0
        };
        let i0 = (src.floor() as usize).min(input - 1);
        let i1 = (i0 + 1).min(input - 1);
        let frac = (src - i0 as f64) as f32;
        weights[o * input + i0] += 1.0 - frac;
        weights[o * input + i1] += frac;
    }
    weights
}

fn upsample<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();
    let [oh, ow] = size;
    if [h, w] == size {
        return x;
    }
    let device = x.device();

    let ry = Tensor::<B, 2>::from_data(TensorData::new(bilinear_weights(h, oh), [oh, h]), &device)
        .unsqueeze::<4>()
        .expand([n, c, oh, h]);
    let rx_t = Tensor::<B, 2>::from_data(TensorData::new(bilinear_weights(w, ow), [ow, w]), &device)
        .transpose()
        .unsqueeze::<4>()
        .expand([n, c, w, ow]);

    ry.matmul(x).matmul(rx_t)
}

// ─── Building blocks ──────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    bn:   BatchNorm<B, 2>,
}

impl<B: Backend> ConvBnRelu<B> {
    fn new(
        channels: [usize; 2],
        kernel:   usize,
        stride:   usize,
        padding:  usize,
        groups:   usize,
        device:   &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(channels[1]).init(device);
        Self { conv, bn }
    }

    /// 1x1 pointwise
    fn pointwise(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        Self::new([c_in, c_out], 1, 1, 0, 1, device)
    }

    /// 3x3 depthwise (one filter group per input channel)
    fn depthwise(c_in: usize, c_out: usize, stride: usize, device: &B::Device) -> Self {
        Self::new([c_in, c_out], 3, stride, 1, c_in, device)
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.bn.forward(self.conv.forward(x)))
    }
}

/// Depthwise separable convolution
#[derive(Module, Debug)]
pub struct DsConv<B: Backend> {
    depthwise: ConvBnRelu<B>,
    pointwise: ConvBnRelu<B>,
}

impl<B: Backend> DsConv<B> {
    fn new(c_in: usize, c_out: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            depthwise: ConvBnRelu::depthwise(c_in, c_in, stride, device),
            pointwise: ConvBnRelu::pointwise(c_in, c_out, device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pointwise.forward(self.depthwise.forward(x))
    }
}

/// MobileNetV2 inverted residual: expand, depthwise, linear project.
#[derive(Module, Debug)]
pub struct LinearBottleneck<B: Backend> {
    expand:   ConvBnRelu<B>,
    dw:       ConvBnRelu<B>,
    project:  Conv2d<B>,
    bn:       BatchNorm<B, 2>,
    shortcut: bool,
}

impl<B: Backend> LinearBottleneck<B> {
    fn new(c_in: usize, c_out: usize, stride: usize, device: &B::Device) -> Self {
        let hidden = c_in * EXPANSION;
        Self {
            expand:   ConvBnRelu::pointwise(c_in, hidden, device),
            dw:       ConvBnRelu::depthwise(hidden, hidden, stride, device),
            project:  Conv2dConfig::new([hidden, c_out], [1, 1]).with_bias(false).init(device),
            bn:       BatchNormConfig::new(c_out).init(device),
            shortcut: stride == 1 && c_in == c_out,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.bn.forward(self.project.forward(self.dw.forward(self.expand.forward(x.clone()))));
        if self.shortcut { x + out } else { out }
    }
}

#[derive(Module, Debug)]
pub struct PyramidPooling<B: Backend> {
    pools: Vec<AdaptiveAvgPool2d>,
    convs: Vec<ConvBnRelu<B>>,
    out:   ConvBnRelu<B>,
}

impl<B: Backend> PyramidPooling<B> {
    fn new(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        let inter = c_in / 4;
        Self {
            pools: PYRAMID_BINS.iter().map(|&s| AdaptiveAvgPool2dConfig::new([s, s]).init()).collect(),
            convs: PYRAMID_BINS.iter().map(|_| ConvBnRelu::pointwise(c_in, inter, device)).collect(),
            out:   ConvBnRelu::pointwise(c_in * 2, c_out, device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let mut features = vec![x.clone()];
        for (pool, conv) in self.pools.iter().zip(&self.convs) {
            features.push(upsample(conv.forward(pool.forward(x.clone())), [h, w]));
        }
        self.out.forward(Tensor::cat(features, 1))
    }
}

// ─── Network stages ───────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct LearningToDownsample<B: Backend> {
    conv:   ConvBnRelu<B>,
    dsconv1: DsConv<B>,
    dsconv2: DsConv<B>,
}

impl<B: Backend> LearningToDownsample<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            conv:    ConvBnRelu::new([3, 32], 3, 2, 0, 1, device),
            dsconv1: DsConv::new(32, 48, 2, device),
            dsconv2: DsConv::new(48, 64, 2, device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.dsconv2.forward(self.dsconv1.forward(self.conv.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct GlobalFeatureExtractor<B: Backend> {
    blocks: Vec<LinearBottleneck<B>>,
    ppm:    PyramidPooling<B>,
}

impl<B: Backend> GlobalFeatureExtractor<B> {
    fn new(device: &B::Device) -> Self {
        // (in, out, stride) per stage, three blocks each
        let stages = [(64, 64, 2), (64, 96, 2), (96, 128, 1)];
        let mut blocks = Vec::new();
        for (c_in, c_out, stride) in stages {
            blocks.push(LinearBottleneck::new(c_in, c_out, stride, device));
            for _ in 1..3 {
                blocks.push(LinearBottleneck::new(c_out, c_out, 1, device));
            }
        }
        Self { blocks, ppm: PyramidPooling::new(128, 128, device) }
    }

    fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 4> {
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.ppm.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct FeatureFusion<B: Backend> {
    dwconv:      ConvBnRelu<B>,
    conv_lower:  Conv2d<B>,
    bn_lower:    BatchNorm<B, 2>,
    conv_higher: Conv2d<B>,
    bn_higher:   BatchNorm<B, 2>,
}

impl<B: Backend> FeatureFusion<B> {
    fn new(higher_in: usize, lower_in: usize, c_out: usize, device: &B::Device) -> Self {
        Self {
            dwconv:      ConvBnRelu::depthwise(lower_in, c_out, 1, device),
            conv_lower:  Conv2dConfig::new([c_out, c_out], [1, 1]).init(device),
            bn_lower:    BatchNormConfig::new(c_out).init(device),
            conv_higher: Conv2dConfig::new([higher_in, c_out], [1, 1]).init(device),
            bn_higher:   BatchNormConfig::new(c_out).init(device),
        }
    }

    fn forward(&self, higher: Tensor<B, 4>, lower: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = higher.dims();
        let lower = self.dwconv.forward(upsample(lower, [h, w]));
        let lower = self.bn_lower.forward(self.conv_lower.forward(lower));
        let higher = self.bn_higher.forward(self.conv_higher.forward(higher));
        relu(higher + lower)
    }
}

#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    dsconv1: DsConv<B>,
    dsconv2: DsConv<B>,
    dropout: Dropout,
    conv:    Conv2d<B>,
}

impl<B: Backend> Classifier<B> {
    fn new(channels: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            dsconv1: DsConv::new(channels, channels, 1, device),
            dsconv2: DsConv::new(channels, channels, 1, device),
            dropout: DropoutConfig::new(0.1).init(),
            conv:    Conv2dConfig::new([channels, num_classes], [1, 1]).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.dsconv2.forward(self.dsconv1.forward(x));
        self.conv.forward(self.dropout.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct AuxHead<B: Backend> {
    conv:    ConvBnRelu<B>,
    dropout: Dropout,
    classify: Conv2d<B>,
}

impl<B: Backend> AuxHead<B> {
    fn new(c_in: usize, num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv:     ConvBnRelu::new([c_in, 32], 3, 1, 1, 1, device),
            dropout:  DropoutConfig::new(0.1).init(),
            classify: Conv2dConfig::new([32, num_classes], [1, 1]).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.classify.forward(self.dropout.forward(self.conv.forward(x)))
    }
}

// ─── FastScnn ─────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct FastScnnConfig {
    pub num_classes: usize,
    /// Build the auxiliary head on the high-resolution branch
    #[config(default = false)]
    pub aux: bool,
}

impl FastScnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FastScnn<B> {
        FastScnn {
            downsample: LearningToDownsample::new(device),
            global:     GlobalFeatureExtractor::new(device),
            fusion:     FeatureFusion::new(64, 128, 128, device),
            classifier: Classifier::new(128, self.num_classes, device),
            aux_head:   self.aux.then(|| AuxHead::new(64, self.num_classes, device)),
        }
    }
}

#[derive(Module, Debug)]
pub struct FastScnn<B: Backend> {
    downsample: LearningToDownsample<B>,
    global:     GlobalFeatureExtractor<B>,
    fusion:     FeatureFusion<B>,
    classifier: Classifier<B>,
    aux_head:   Option<AuxHead<B>>,
}

/// Logits at input resolution, [batch, classes, H, W]
pub struct SegOutput<B: Backend> {
    pub main: Tensor<B, 4>,
    pub aux:  Option<Tensor<B, 4>>,
}

impl<B: Backend> FastScnn<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> SegOutput<B> {
        let [_, _, h, w] = images.dims();

        let higher = self.downsample.forward(images);
        let lower = self.global.forward(higher.clone());
        let fused = self.fusion.forward(higher.clone(), lower);
        let main = upsample(self.classifier.forward(fused), [h, w]);

        let aux = self
            .aux_head
            .as_ref()
            .map(|head| upsample(head.forward(higher), [h, w]));

        SegOutput { main, aux }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_output_matches_input_resolution() {
        let device = Default::default();
        let model: FastScnn<B> = FastScnnConfig::new(19).init(&device);
        let x = Tensor::<B, 4>::zeros([1, 3, 64, 64], &device);

        let out = model.forward(x);
        assert_eq!(out.main.dims(), [1, 19, 64, 64]);
        assert!(out.aux.is_none());
    }

    #[test]
    fn test_aux_head_output() {
        let device = Default::default();
        let model: FastScnn<B> = FastScnnConfig::new(5).with_aux(true).init(&device);
        let x = Tensor::<B, 4>::ones([2, 3, 64, 96], &device);

        let out = model.forward(x);
        assert_eq!(out.main.dims(), [2, 5, 64, 96]);
        assert_eq!(out.aux.map(|a| a.dims()), Some([2, 5, 64, 96]));
    }

    #[test]
    fn test_bilinear_weights_rows_sum_to_one() {
        let w = bilinear_weights(3, 5);
        for row in w.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        // ends align, midpoint of 0..2 is input row 1
        assert_eq!(&w[0..3], &[1.0, 0.0, 0.0]);
        assert_eq!(&w[6..9], &[0.0, 1.0, 0.0]);
        assert_eq!(&w[12..15], &[0.0, 0.0, 1.0]);
        assert_eq!(bilinear_weights(1, 4), vec![1.0; 4]);
    }

    #[test]
    fn test_upsample_interpolates_linearly() {
        let device = Default::default();
        let x = Tensor::<B, 4>::from_data(TensorData::new(vec![0.0f32, 2.0], [1, 1, 1, 2]), &device);
        let out: Vec<f32> = upsample(x, [2, 3]).into_data().iter::<f32>().collect();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_backward_through_full_model_on_ndarray() {
        type AD = burn::backend::Autodiff<B>;
        let device = Default::default();
        let model: FastScnn<AD> = FastScnnConfig::new(3).with_aux(true).init(&device);
        let x = Tensor::<AD, 4>::ones([1, 3, 64, 64], &device).require_grad();

        let out = model.forward(x.clone());
        let loss = out.main.sum() + out.aux.map(|a| a.sum()).unwrap();
        let grads = loss.backward();
        assert_eq!(x.grad(&grads).map(|g| g.dims()), Some([1, 3, 64, 64]));
    }

    #[test]
    fn test_bottleneck_shortcut_only_when_shapes_match() {
        let device = Default::default();
        assert!(LinearBottleneck::<B>::new(64, 64, 1, &device).shortcut);
        assert!(!LinearBottleneck::<B>::new(64, 64, 2, &device).shortcut);
        assert!(!LinearBottleneck::<B>::new(64, 96, 1, &device).shortcut);
    }
}
