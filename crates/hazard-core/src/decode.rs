use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::classes::ObjectClass;
use crate::config::{DecodeConfig, ModelConfig};
use crate::error::{HazardError, Result};
use crate::geometry::BoundingBox;

/// Classes with near-zero precision in offline validation. Never surfaced.
pub const BLOCKED_CLASSES: &[ObjectClass] = &[ObjectClass::PlasticBag, ObjectClass::Toy];

/// Per-class confidence multipliers correcting raw model calibration. Default 1.0.
pub const CLASS_MULTIPLIERS: &[(ObjectClass, f32)] = &[
    (ObjectClass::ElectricalOutlet, 1.20),
    (ObjectClass::Scissors, 1.15),
    (ObjectClass::Medicine, 0.85),
    (ObjectClass::Battery, 1.10),
    (ObjectClass::FragileObject, 0.90),
    (ObjectClass::SurfaceEdge, 1.00),
    (ObjectClass::Stairs, 1.00),
    (ObjectClass::Window, 0.95),
    (ObjectClass::PowerCord, 1.10),
];

/// Per-class minimum adjusted confidence. Default is the global threshold.
pub const MIN_THRESHOLDS: &[(ObjectClass, f32)] = &[
    (ObjectClass::ElectricalOutlet, 0.35),
    (ObjectClass::Medicine, 0.40),
    (ObjectClass::Battery, 0.35),
    (ObjectClass::SurfaceEdge, 0.40),
    (ObjectClass::Stairs, 0.45),
    (ObjectClass::Window, 0.45),
    (ObjectClass::PowerCord, 0.35),
];

/// Raw model output, shape `[1, 4 + C, N]`, stored channel-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn zeros(shape: [usize; 3]) -> Self {
        Self { shape: shape.to_vec(), data: vec![0.0; shape.iter().product()] }
    }

    /// Writes one candidate box: `(cx, cy, w, h)` and its class scores.
    pub fn set_box(&mut self, i: usize, cx: f32, cy: f32, w: f32, h: f32, scores: &[(usize, f32)]) {
        let n = self.shape[2];
        for (c, v) in [cx, cy, w, h].into_iter().enumerate() {
            self.data[c * n + i] = v;
        }
        for &(class_idx, score) in scores {
            self.data[(4 + class_idx) * n + i] = score;
        }
    }

    fn value(&self, channel: usize, i: usize) -> f32 {
        self.data[channel * self.shape[2] + i]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_name: String,
    pub class: Option<ObjectClass>,
    pub confidence: f32,
    pub raw_confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        let class_name = class_name.into();
        Self {
            class: ObjectClass::from_label(&class_name),
            class_name,
            confidence,
            raw_confidence: confidence,
            bbox,
        }
    }
}

/// Table-driven confidence correction, keyed by class name.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub blocked: HashSet<String>,
    pub multipliers: HashMap<String, f32>,
    pub thresholds: HashMap<String, f32>,
    pub default_threshold: f32,
}

impl Calibration {
    pub fn builtin(default_threshold: f32) -> Self {
        Self {
            blocked: BLOCKED_CLASSES.iter().map(|c| c.label().to_string()).collect(),
            multipliers: CLASS_MULTIPLIERS.iter().map(|(c, v)| (c.label().to_string(), *v)).collect(),
            thresholds: MIN_THRESHOLDS.iter().map(|(c, v)| (c.label().to_string(), *v)).collect(),
            default_threshold,
        }
    }

    pub fn from_config(cfg: &DecodeConfig) -> Self {
        let mut cal = Self::builtin(cfg.confidence_threshold);
        if let Some(blocked) = &cfg.blocked_classes {
            cal.blocked = blocked.iter().cloned().collect();
        }
        cal.multipliers.extend(cfg.multipliers.iter().map(|(k, v)| (k.clone(), *v)));
        cal.thresholds.extend(cfg.thresholds.iter().map(|(k, v)| (k.clone(), *v)));
        cal
    }

    pub fn is_blocked(&self, class_name: &str) -> bool {
        self.blocked.contains(class_name)
    }

    pub fn multiplier(&self, class_name: &str) -> f32 {
        self.multipliers.get(class_name).copied().unwrap_or(1.0)
    }

    pub fn threshold(&self, class_name: &str) -> f32 {
        self.thresholds.get(class_name).copied().unwrap_or(self.default_threshold)
    }

    pub fn adjust(&self, class_name: &str, raw: f32) -> f32 {
        (raw * self.multiplier(class_name)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Decoder {
    class_names: Vec<String>,
    num_boxes: usize,
    calibration: Calibration,
}

impl Decoder {
    pub fn new(model: &ModelConfig, calibration: Calibration) -> Self {
        Self { class_names: model.class_names.clone(), num_boxes: model.num_boxes, calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn expected_shape(&self) -> [usize; 3] {
        [1, 4 + self.class_names.len(), self.num_boxes]
    }

    fn check_shape(&self, t: &RawTensor) -> Result<()> {
        let expected = self.expected_shape();
        if t.shape.as_slice() != expected.as_slice() {
            return Err(HazardError::TensorShape { expected, actual: t.shape.clone() });
        }
        let len: usize = expected.iter().product();
        if t.data.len() != len {
            return Err(HazardError::TensorData { expected: len, actual: t.data.len() });
        }
        Ok(())
    }

    pub fn decode(&self, t: &RawTensor) -> Result<Vec<Detection>> {
        self.check_shape(t)?;
        let num_classes = self.class_names.len();
        if num_classes == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let (mut blocked, mut below, mut invalid) = (0usize, 0usize, 0usize);

        for i in 0..self.num_boxes {
            // NaN scores never win the comparison
            let mut best_c = 0usize;
            let mut best_p = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let p = t.value(4 + c, i);
                if p > best_p { best_p = p; best_c = c; }
            }
            let coords = [t.value(0, i), t.value(1, i), t.value(2, i), t.value(3, i)];
            if !best_p.is_finite() || coords.iter().any(|v| !v.is_finite()) {
                invalid += 1;
                continue;
            }

            let name = &self.class_names[best_c];
            if self.calibration.is_blocked(name) {
                blocked += 1;
                continue;
            }

            let adjusted = self.calibration.adjust(name, best_p);
            if !(adjusted >= self.calibration.threshold(name)) {
                below += 1;
                continue;
            }

            let [cx, cy, w, h] = coords;
            let bbox = BoundingBox::from_center(cx, cy, w, h);
            let class = ObjectClass::from_label(name);
            if class.is_none() {
                debug!("decode: class {:?} not in canonical table, using defaults", name);
            }
            out.push(Detection {
                class_name: name.clone(),
                class,
                confidence: adjusted,
                raw_confidence: best_p,
                bbox,
            });
        }

        debug!("decode: kept={} blocked={} below_threshold={} invalid={}", out.len(), blocked, below, invalid);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(names: &[&str], n: usize) -> ModelConfig {
        ModelConfig {
            class_names: names.iter().map(|s| s.to_string()).collect(),
            num_boxes: n,
            ..ModelConfig::default()
        }
    }

    fn decoder(names: &[&str], n: usize) -> Decoder {
        Decoder::new(&model(names, n), Calibration::builtin(0.3))
    }

    #[test]
    fn blocked_class_never_emitted_even_at_full_confidence() {
        let d = decoder(&["knife", "toy"], 2);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.5, 0.5, 0.1, 0.1, &[(1, 1.0)]);
        t.set_box(1, 0.2, 0.2, 0.1, 0.1, &[(0, 0.9), (1, 0.2)]);
        let dets = d.decode(&t).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "knife");
    }

    #[test]
    fn multiplier_and_threshold_apply_per_class() {
        // medicine: 0.45 * 0.85 = 0.3825 < 0.40 -> dropped
        // electrical_outlet: 0.30 * 1.2 = 0.36 >= 0.35 -> kept
        let d = decoder(&["medicine", "electrical_outlet"], 2);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.5, 0.5, 0.1, 0.1, &[(0, 0.45)]);
        t.set_box(1, 0.5, 0.5, 0.1, 0.1, &[(1, 0.30)]);
        let dets = d.decode(&t).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "electrical_outlet");
        assert!((dets[0].confidence - 0.36).abs() < 1e-5);
        assert!((dets[0].raw_confidence - 0.30).abs() < 1e-6);
    }

    #[test]
    fn adjusted_confidence_is_clamped() {
        let d = decoder(&["electrical_outlet"], 1);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.5, 0.5, 0.1, 0.1, &[(0, 0.95)]);
        let dets = d.decode(&t).unwrap();
        assert_eq!(dets[0].confidence, 1.0);
    }

    #[test]
    fn unknown_class_uses_defaults() {
        let d = decoder(&["garden_gnome"], 2);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.5, 0.5, 0.1, 0.1, &[(0, 0.31)]);
        t.set_box(1, 0.5, 0.5, 0.1, 0.1, &[(0, 0.29)]);
        let dets = d.decode(&t).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, None);
        assert!((dets[0].confidence - 0.31).abs() < 1e-6);
    }

    #[test]
    fn emitted_boxes_stay_inside_image() {
        let d = decoder(&["knife"], 3);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.98, 0.98, 0.3, 0.3, &[(0, 0.9)]);
        t.set_box(1, 0.01, 0.01, 0.3, 0.3, &[(0, 0.9)]);
        t.set_box(2, 0.5, 0.5, 1.4, 1.4, &[(0, 0.9)]);
        for det in d.decode(&t).unwrap() {
            assert!(det.bbox.is_within_image(), "{:?}", det.bbox);
        }
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let d = decoder(&["knife", "stove"], 4);
        let mut t = RawTensor::zeros(d.expected_shape());
        t.set_box(0, 0.5, 0.5, 0.1, 0.1, &[(0, f32::NAN), (1, 0.1)]);
        t.set_box(1, 0.5, 0.5, 0.1, 0.1, &[(0, f32::NAN), (1, 0.8)]);
        t.set_box(2, f32::NAN, 0.5, 0.1, 0.1, &[(0, 0.9)]);
        t.set_box(3, 0.5, 0.5, f32::INFINITY, 0.1, &[(1, f32::INFINITY)]);
        let dets = d.decode(&t).unwrap();
        // box 0: stove at 0.1 is below threshold; box 1: stove wins over NaN
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "stove");
        assert!((dets[0].confidence - 0.8).abs() < 1e-6);
        for det in &dets {
            assert!(det.confidence.is_finite());
            assert!(det.confidence >= d.calibration().threshold(&det.class_name));
        }
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let d = decoder(&["knife", "stove"], 4);
        let t = RawTensor::zeros([1, 5, 4]);
        assert!(matches!(d.decode(&t), Err(HazardError::TensorShape { .. })));

        let short = RawTensor::new(vec![1, 6, 4], vec![0.0; 10]);
        assert!(matches!(d.decode(&short), Err(HazardError::TensorData { expected: 24, actual: 10 })));
    }

    #[test]
    fn config_overrides_merge_over_builtin_tables() {
        let mut cfg = DecodeConfig::default();
        cfg.multipliers.insert("knife".into(), 2.0);
        cfg.blocked_classes = Some(vec!["stove".into()]);
        let cal = Calibration::from_config(&cfg);
        assert_eq!(cal.multiplier("knife"), 2.0);
        assert_eq!(cal.multiplier("medicine"), 0.85);
        assert!(cal.is_blocked("stove"));
        assert!(!cal.is_blocked("toy"));
    }
}
