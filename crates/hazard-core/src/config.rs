use serde::Deserialize;
use std::collections::HashMap;

use crate::classes::default_class_names;
use crate::error::{HazardError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub decode: DecodeConfig,
    pub position: PositionConfig,
    pub smoothing: SmoothingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ordered label file, index-aligned with tensor channels 4..4+C.
    pub class_names: Vec<String>,
    pub input_width: u32,
    pub input_height: u32,
    /// Candidate boxes per frame (N).
    pub num_boxes: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            class_names: default_class_names(),
            input_width: 640,
            input_height: 640,
            num_boxes: 8400,
        }
    }
}

impl ModelConfig {
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Expected tensor shape `[1, 4 + C, N]`.
    pub fn tensor_shape(&self) -> [usize; 3] {
        [1, 4 + self.num_classes(), self.num_boxes]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Replaces the built-in blocked list when set.
    pub blocked_classes: Option<Vec<String>>,
    /// Per-class overrides merged over the built-in calibration tables.
    pub multipliers: HashMap<String, f32>,
    pub thresholds: HashMap<String, f32>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            iou_threshold: 0.5,
            max_detections: 100,
            blocked_classes: None,
            multipliers: HashMap::new(),
            thresholds: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Assumed height of the capturing device, held level.
    pub camera_height_m: f32,
    /// When false, positional labels come only from nearby surfaces.
    pub use_vertical_position: bool,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self { camera_height_m: 1.5, use_vertical_position: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enable: bool,
    pub history_length: usize,
    /// Below this many retained frames, hazards pass through unfiltered.
    pub min_frames: usize,
    pub min_appearances: usize,
    /// L1 distance between normalized centers for two hazards to count as the same.
    pub similarity_distance: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            history_length: 3,
            min_frames: 2,
            min_appearances: 2,
            similarity_distance: 0.30,
        }
    }
}

fn check(ok: bool, msg: impl Into<String>) -> Result<()> {
    if ok { Ok(()) } else { Err(HazardError::Config(msg.into())) }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let m = &self.model;
        check(!m.class_names.is_empty(), "model.class_names is empty")?;
        check(m.num_boxes > 0, "model.num_boxes must be > 0")?;
        check(m.input_width > 0 && m.input_height > 0, "model input size must be non-zero")?;

        let d = &self.decode;
        check(d.confidence_threshold > 0.0 && d.confidence_threshold <= 1.0, "decode.confidence_threshold out of (0,1]")?;
        check(d.iou_threshold > 0.0 && d.iou_threshold <= 1.0, "decode.iou_threshold out of (0,1]")?;
        check(d.max_detections > 0, "decode.max_detections must be > 0")?;
        for (name, v) in &d.multipliers {
            check(*v > 0.0, format!("decode.multipliers.{name} must be > 0"))?;
        }
        for (name, v) in &d.thresholds {
            check(*v > 0.0 && *v <= 1.0, format!("decode.thresholds.{name} out of (0,1]"))?;
        }

        let p = &self.position;
        check(p.camera_height_m > 0.0 && p.camera_height_m < 3.0, "position.camera_height_m should be in (0,3)")?;

        let s = &self.smoothing;
        check(s.history_length >= 1, "smoothing.history_length must be >= 1")?;
        check(s.min_frames <= s.history_length, "smoothing.min_frames must be <= history_length")?;
        check(s.min_appearances >= 1 && s.min_appearances <= s.history_length,
            "smoothing.min_appearances must be in 1..=history_length")?;
        check(s.similarity_distance > 0.0, "smoothing.similarity_distance must be > 0")?;
        Ok(())
    }
}
