use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::backend::InferenceBackend;
use crate::classify::RiskClassifier;
use crate::config::PipelineConfig;
use crate::decode::{Calibration, Decoder, RawTensor};
use crate::error::{HazardError, Result};
use crate::hazard::{HazardIdGen, HazardObject};
use crate::hdi::HouseholdDangerIndex;
use crate::nms::nms_filter;
use crate::preprocess::ImageTensor;
use crate::smoother::TemporalSmoother;
use crate::spatial::{detect_spatial_context, split_scene};

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Processed(Vec<HazardObject>),
    /// Another frame was in flight; this one was dropped.
    Skipped,
}

impl FrameOutcome {
    pub fn hazards(&self) -> Option<&[HazardObject]> {
        match self {
            FrameOutcome::Processed(h) => Some(h),
            FrameOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped)
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Caller-owned pipeline state: the model handle, rolling history and the
/// in-flight flag. At most one frame runs through a session at a time.
pub struct HazardSession {
    cfg: PipelineConfig,
    decoder: Decoder,
    classifier: RiskClassifier,
    backend: Mutex<Option<Box<dyn InferenceBackend>>>,
    smoother: Mutex<TemporalSmoother>,
    busy: AtomicBool,
    ids: HazardIdGen,
}

impl HazardSession {
    pub fn new(cfg: PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        let decoder = Decoder::new(&cfg.model, Calibration::from_config(&cfg.decode));
        let classifier = RiskClassifier::new(cfg.position.clone());
        let smoother = TemporalSmoother::new(cfg.smoothing.clone());
        info!(
            "session: classes={} boxes={} conf_th={} iou_th={}",
            cfg.model.num_classes(), cfg.model.num_boxes, cfg.decode.confidence_threshold, cfg.decode.iou_threshold
        );
        Ok(Self {
            cfg,
            decoder,
            classifier,
            backend: Mutex::new(None),
            smoother: Mutex::new(smoother),
            busy: AtomicBool::new(false),
            ids: HazardIdGen::new(),
        })
    }

    pub fn with_backend(self, backend: Box<dyn InferenceBackend>) -> Self {
        self.load_backend(backend);
        self
    }

    pub fn load_backend(&self, backend: Box<dyn InferenceBackend>) {
        info!("session: backend loaded: {}", backend.name());
        *lock(&self.backend) = Some(backend);
    }

    pub fn unload_backend(&self) {
        *lock(&self.backend) = None;
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.backend).is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn history_len(&self) -> usize {
        lock(&self.smoother).len()
    }

    pub fn reset_history(&self) {
        lock(&self.smoother).reset();
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Runs inference on a preprocessed frame and the full post-detection pipeline.
    pub fn detect_hazards(&self, input: &ImageTensor) -> Result<FrameOutcome> {
        let Some(_guard) = self.try_begin() else {
            warn!("session: frame dropped, previous frame still in flight");
            return Ok(FrameOutcome::Skipped);
        };

        let tensor = {
            let mut backend = lock(&self.backend);
            let backend = backend.as_mut().ok_or(HazardError::ModelNotReady)?;
            let expected = (self.cfg.model.input_width, self.cfg.model.input_height);
            if (input.width, input.height) != expected {
                return Err(HazardError::InputSize { expected, actual: (input.width, input.height) });
            }
            backend.infer(input).map_err(HazardError::Inference)?
        };

        self.run_pipeline(&tensor).map(FrameOutcome::Processed)
    }

    /// Post-detection pipeline for an already computed model output.
    pub fn process_tensor(&self, tensor: &RawTensor) -> Result<FrameOutcome> {
        let Some(_guard) = self.try_begin() else {
            warn!("session: frame dropped, previous frame still in flight");
            return Ok(FrameOutcome::Skipped);
        };
        self.run_pipeline(tensor).map(FrameOutcome::Processed)
    }

    fn run_pipeline(&self, tensor: &RawTensor) -> Result<Vec<HazardObject>> {
        let captured_at = OffsetDateTime::now_utc();

        // a failed decode returns here, before history is touched
        let dets = self.decoder.decode(tensor)?;
        let dets = nms_filter(dets, self.cfg.decode.iou_threshold, self.cfg.decode.max_detections);
        let (hazard_dets, scene) = split_scene(dets);

        let hazards: Vec<HazardObject> = hazard_dets
            .iter()
            .map(|d| self.classifier.classify(d, self.ids.next_id(), captured_at))
            .collect();
        let hazards = detect_spatial_context(&self.classifier, hazards, &scene);
        debug!(
            "pipeline: hazards={} edges={} surfaces={}",
            hazards.len(), scene.edges.len(), scene.surfaces.len()
        );

        Ok(lock(&self.smoother).smooth(captured_at, hazards))
    }

    pub fn assess(&self, hazards: Vec<HazardObject>, room: Option<&str>) -> HouseholdDangerIndex {
        let idx = HouseholdDangerIndex::new(hazards, OffsetDateTime::now_utc());
        match room {
            Some(r) => idx.with_room(r),
            None => idx,
        }
    }
}
