// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Network architecture descriptors.
//!
//! The network itself runs as an opaque ONNX graph. This module only records what the
//! decoder relies on: which backbone family produced the model, the geometry of the
//! transposed-convolution upsampling stages, and the resulting heatmap stride.

use std::fmt;
use std::str::FromStr;

/// Ratio between network input size and heatmap size.
pub const HEATMAP_STRIDE: usize = 4;

/// Number of input channels the network accepts (RGB).
pub const INPUT_CHANNELS: usize = 3;

/// Default network input size as (height, width).
pub const DEFAULT_INPUT_SIZE: (usize, usize) = (256, 192);

/// Default keypoint count (COCO body keypoints).
pub const DEFAULT_KEYPOINTS: usize = 17;

/// Feature-extraction backbones available for SimplePose models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backbone {
    /// ResNet-18.
    #[default]
    ResNet18,
    /// ResNet-50 with stride in the 3×3 convolution.
    ResNet50b,
    /// ResNet-101 with stride in the 3×3 convolution.
    ResNet101b,
    /// ResNet-152 with stride in the 3×3 convolution.
    ResNet152b,
    /// ResNet(A)-50b with average-pool downsampling.
    ResNetA50b,
    /// ResNet(A)-101b with average-pool downsampling.
    ResNetA101b,
    /// ResNet(A)-152b with average-pool downsampling.
    ResNetA152b,
}

impl Backbone {
    /// All known backbones.
    pub const ALL: [Self; 7] = [
        Self::ResNet18,
        Self::ResNet50b,
        Self::ResNet101b,
        Self::ResNet152b,
        Self::ResNetA50b,
        Self::ResNetA101b,
        Self::ResNetA152b,
    ];

    /// Short name, as stored in model metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet50b => "resnet50b",
            Self::ResNet101b => "resnet101b",
            Self::ResNet152b => "resnet152b",
            Self::ResNetA50b => "resneta50b",
            Self::ResNetA101b => "resneta101b",
            Self::ResNetA152b => "resneta152b",
        }
    }

    /// Channel count of the backbone's final feature map.
    #[must_use]
    pub const fn out_channels(&self) -> usize {
        match self {
            Self::ResNet18 => 512,
            _ => 2048,
        }
    }

    /// Overall stride of the backbone feature map.
    #[must_use]
    pub const fn stride(&self) -> usize {
        32
    }

    /// Canonical model name, e.g. `simplepose_resnet18_coco`.
    #[must_use]
    pub fn model_name(&self) -> String {
        format!("simplepose_{}_coco", self.as_str())
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backbone {
    type Err = BackboneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let short = lower
            .strip_prefix("simplepose_")
            .and_then(|rest| rest.strip_suffix("_coco"))
            .unwrap_or(&lower);
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == short)
            .ok_or_else(|| BackboneParseError(s.to_string()))
    }
}

/// Error returned when parsing an invalid backbone string.
#[derive(Debug, Clone)]
pub struct BackboneParseError(String);

impl fmt::Display for BackboneParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = Backbone::ALL.iter().map(Backbone::as_str).collect();
        write!(
            f,
            "invalid backbone '{}', expected one of: {}",
            self.0,
            known.join(", ")
        )
    }
}

impl std::error::Error for BackboneParseError {}

/// Geometry of the learned upsampling decoder.
///
/// Each stage is a transposed convolution followed by batch norm and ReLU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderGeometry {
    /// Output channels of each stage.
    pub channels: Vec<usize>,
    /// Transposed-convolution kernel size.
    pub kernel: usize,
    /// Transposed-convolution stride.
    pub stride: usize,
    /// Transposed-convolution padding.
    pub padding: usize,
}

impl Default for DecoderGeometry {
    fn default() -> Self {
        Self {
            channels: vec![256, 256, 256],
            kernel: 4,
            stride: 2,
            padding: 1,
        }
    }
}

impl DecoderGeometry {
    /// Spatial output size of one stage for input size `size`.
    #[must_use]
    pub const fn stage_output(&self, size: usize) -> usize {
        (size.saturating_sub(1) * self.stride + self.kernel).saturating_sub(2 * self.padding)
    }

    /// Total upsampling factor across all stages.
    #[must_use]
    pub fn upsampling(&self) -> usize {
        self.stride.pow(u32::try_from(self.channels.len()).unwrap_or(u32::MAX))
    }

    /// Spatial output size after every stage.
    #[must_use]
    pub fn output_size(&self, size: (usize, usize)) -> (usize, usize) {
        self.channels.iter().fold(size, |(h, w), _| {
            (self.stage_output(h), self.stage_output(w))
        })
    }

    /// Channel count fed to the keypoint head.
    #[must_use]
    pub fn out_channels(&self) -> usize {
        self.channels.last().copied().unwrap_or(0)
    }
}

/// Heatmap size produced for a network input of `input_size` (height, width).
#[must_use]
pub const fn heatmap_size(input_size: (usize, usize)) -> (usize, usize) {
    (input_size.0 / HEATMAP_STRIDE, input_size.1 / HEATMAP_STRIDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backbone_from_str() {
        assert_eq!("resnet18".parse::<Backbone>().unwrap(), Backbone::ResNet18);
        assert_eq!("ResNet50b".parse::<Backbone>().unwrap(), Backbone::ResNet50b);
        assert_eq!(
            "simplepose_resneta101b_coco".parse::<Backbone>().unwrap(),
            Backbone::ResNetA101b
        );
        assert!("vgg16".parse::<Backbone>().is_err());
    }

    #[test]
    fn test_backbone_display_roundtrip() {
        for backbone in Backbone::ALL {
            assert_eq!(backbone.to_string().parse::<Backbone>().unwrap(), backbone);
            assert_eq!(backbone.model_name().parse::<Backbone>().unwrap(), backbone);
        }
    }

    #[test]
    fn test_backbone_channels() {
        assert_eq!(Backbone::ResNet18.out_channels(), 512);
        assert_eq!(Backbone::ResNetA152b.out_channels(), 2048);
        assert_eq!(Backbone::default(), Backbone::ResNet18);
    }

    #[test]
    fn test_decoder_geometry() {
        let decoder = DecoderGeometry::default();
        assert_eq!(decoder.stage_output(8), 16);
        assert_eq!(decoder.upsampling(), 8);
        // stride-32 features of a 256x192 input
        assert_eq!(decoder.output_size((8, 6)), (64, 48));
        assert_eq!(decoder.out_channels(), 256);
    }

    #[test]
    fn test_heatmap_size_matches_decoder() {
        let decoder = DecoderGeometry::default();
        let input = DEFAULT_INPUT_SIZE;
        let features = (
            input.0 / Backbone::ResNet18.stride(),
            input.1 / Backbone::ResNet18.stride(),
        );
        assert_eq!(decoder.output_size(features), heatmap_size(input));
        assert_eq!(heatmap_size((384, 288)), (96, 72));
    }
}
