// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX model metadata parsing.
//!
//! Pose models carry their configuration as custom metadata properties on the ONNX
//! graph: one key per field, each value a YAML scalar, list or mapping. Every key is
//! optional; missing keys fall back to the ResNet-18 COCO defaults.

use std::collections::HashMap;

use crate::architecture::{Backbone, DEFAULT_INPUT_SIZE, DEFAULT_KEYPOINTS};
use crate::error::{InferenceError, Result};

/// Metadata keys read from the ONNX custom metadata map.
pub const METADATA_KEYS: [&str; 9] = [
    "description",
    "author",
    "date",
    "version",
    "license",
    "backbone",
    "keypoints",
    "imgsz",
    "names",
];

/// COCO body keypoint names in heatmap channel order.
pub const COCO_KEYPOINT_NAMES: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Metadata extracted from a SimplePose ONNX model.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model description.
    pub description: String,
    /// Model author.
    pub author: String,
    /// Export date.
    pub date: String,
    /// Exporter version.
    pub version: String,
    /// License information.
    pub license: String,
    /// Backbone the network was built on.
    pub backbone: Backbone,
    /// Number of keypoint heatmaps the head produces.
    pub keypoints: usize,
    /// Network input size as (height, width).
    pub imgsz: (usize, usize),
    /// Keypoint index to keypoint name mapping.
    pub names: HashMap<usize, String>,
}

impl ModelMetadata {
    /// Build metadata from per-key ONNX custom metadata properties.
    ///
    /// Each entry of `metadata_map` is one key from [`METADATA_KEYS`] with its raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value is malformed.
    pub fn from_onnx_metadata(metadata_map: &HashMap<String, String>) -> Result<Self> {
        let yaml = METADATA_KEYS
            .iter()
            .filter_map(|key| metadata_map.get(*key).map(|value| format!("{key}: {value}")))
            .collect::<Vec<_>>()
            .join("\n");
        Self::from_yaml_str(&yaml)
    }

    /// Parse metadata from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the backbone is unknown, the keypoint count is not a
    /// positive integer, or the input size is not divisible by the heatmap stride.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self> {
        // Parse YAML manually to avoid serde_yaml dependency complexity
        let mut metadata = Self::default();
        let mut keypoints_set = false;

        for line in yaml_str.lines() {
            // Only top-level keys; nested entries belong to a block parsed below
            if line.starts_with(char::is_whitespace) {
                continue;
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim().trim_matches('\'').trim_matches('"');

                match key {
                    "description" => metadata.description = value.to_string(),
                    "author" => metadata.author = value.to_string(),
                    "date" => metadata.date = value.to_string(),
                    "version" => metadata.version = value.to_string(),
                    "license" => metadata.license = value.to_string(),
                    "backbone" => {
                        metadata.backbone = value.parse().map_err(|e| {
                            InferenceError::MetadataError(format!("Invalid backbone in metadata: {e}"))
                        })?;
                    }
                    "keypoints" => {
                        metadata.keypoints = value
                            .parse()
                            .ok()
                            .filter(|&k: &usize| k > 0)
                            .ok_or_else(|| {
                                InferenceError::MetadataError(format!(
                                    "Invalid keypoints value: {value}"
                                ))
                            })?;
                        keypoints_set = true;
                    }
                    _ => {}
                }
            }
        }

        if let Some(imgsz_line) = yaml_str.lines().find(|l| l.starts_with("imgsz:")) {
            metadata.imgsz = Self::parse_imgsz(yaml_str, imgsz_line)?;
        }

        if yaml_str.lines().any(|l| l.starts_with("names:")) {
            metadata.names = Self::parse_names_block(yaml_str);
            if !keypoints_set && !metadata.names.is_empty() {
                metadata.keypoints = metadata.names.len();
            }
        }

        Ok(metadata)
    }

    /// Parse the imgsz field, either `[h, w]` inline, a YAML list or a single square size.
    fn parse_imgsz(yaml_str: &str, imgsz_line: &str) -> Result<(usize, usize)> {
        let value = imgsz_line.trim_start_matches("imgsz:").trim();

        let mut values: Vec<usize> = Vec::new();
        if let (Some(start), Some(end)) = (value.find('['), value.find(']')) {
            values = value[start + 1..end]
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        } else if let Ok(size) = value.parse::<usize>() {
            values = vec![size, size];
        } else if value.is_empty() {
            // Multi-line YAML list
            for following in yaml_str.lines().skip_while(|l| !l.starts_with("imgsz:")).skip(1) {
                let trimmed = following.trim();
                if let Some(item) = trimmed.strip_prefix('-') {
                    if let Ok(val) = item.trim().parse::<usize>() {
                        values.push(val);
                    }
                } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    break;
                }
            }
        }

        match values.as_slice() {
            [h, w, ..] => validate_imgsz((*h, *w)),
            _ => Err(InferenceError::MetadataError(format!(
                "Invalid imgsz value: {value}"
            ))),
        }
    }

    /// Parse the names block from YAML or Python dict format.
    fn parse_names_block(yaml_str: &str) -> HashMap<usize, String> {
        let mut names = HashMap::new();

        // `names: {0: 'nose', 1: 'left_eye', ...}`
        if let Some(line) = yaml_str.lines().find(|l| l.starts_with("names:")) {
            if let Some(dict) = line.trim_start_matches("names:").trim().strip_prefix('{') {
                if let Some(end) = dict.find('}') {
                    return Self::parse_python_dict(&dict[..end]);
                }
            }
        }

        // YAML block format
        let mut in_names_block = false;
        for line in yaml_str.lines() {
            let trimmed = line.trim();

            if line.starts_with("names:") {
                in_names_block = true;
                continue;
            }

            if in_names_block {
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if !line.starts_with(char::is_whitespace)
                    && !trimmed.chars().next().is_some_and(|c| c.is_ascii_digit())
                {
                    break;
                }
                if let Some((key, value)) = trimmed.split_once(':') {
                    if let Ok(index) = key.trim().parse::<usize>() {
                        let name = value.trim().trim_matches('\'').trim_matches('"');
                        names.insert(index, name.to_string());
                    }
                }
            }
        }

        names
    }

    /// Parse a Python dict string like `0: 'nose', 1: 'left_eye'`.
    fn parse_python_dict(dict_str: &str) -> HashMap<usize, String> {
        dict_str
            .split(',')
            .filter_map(|entry| {
                let (key, value) = entry.trim().split_once(':')?;
                let index = key.trim().parse::<usize>().ok()?;
                let name = value.trim().trim_matches('\'').trim_matches('"');
                Some((index, name.to_string()))
            })
            .collect()
    }

    /// Get a keypoint name by index.
    #[must_use]
    pub fn keypoint_name(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }
}

/// Check that an input size maps onto a whole heatmap.
fn validate_imgsz(imgsz: (usize, usize)) -> Result<(usize, usize)> {
    let stride = crate::architecture::HEATMAP_STRIDE;
    if imgsz.0 < stride || imgsz.1 < stride || imgsz.0 % stride != 0 || imgsz.1 % stride != 0 {
        return Err(InferenceError::MetadataError(format!(
            "imgsz {imgsz:?} must be positive multiples of {stride}"
        )));
    }
    Ok(imgsz)
}

/// Names map for the COCO keypoint set.
#[must_use]
pub fn coco_keypoint_names() -> HashMap<usize, String> {
    COCO_KEYPOINT_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (i, (*name).to_string()))
        .collect()
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            author: String::new(),
            date: String::new(),
            version: String::new(),
            license: String::new(),
            backbone: Backbone::default(),
            keypoints: DEFAULT_KEYPOINTS,
            imgsz: DEFAULT_INPUT_SIZE,
            names: coco_keypoint_names(),
        }
    }
}
