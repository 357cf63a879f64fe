use std::collections::VecDeque;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::SmoothingConfig;
use crate::hazard::HazardObject;

#[derive(Debug, Clone)]
pub struct Frame {
    pub captured_at: OffsetDateTime,
    pub hazards: Vec<HazardObject>,
}

/// Co-occurrence debounce over the last few frames. Does not track identity,
/// only whether a hazard of the same name showed up near the same place.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    cfg: SmoothingConfig,
    history: VecDeque<Frame>,
}

impl TemporalSmoother {
    pub fn new(cfg: SmoothingConfig) -> Self {
        let cap = cfg.history_length.max(1);
        Self { cfg, history: VecDeque::with_capacity(cap) }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Records the frame and returns the hazards consistent across recent history.
    pub fn smooth(&mut self, captured_at: OffsetDateTime, hazards: Vec<HazardObject>) -> Vec<HazardObject> {
        if !self.cfg.enable {
            return hazards;
        }

        self.history.push_back(Frame { captured_at, hazards: hazards.clone() });
        while self.history.len() > self.cfg.history_length.max(1) {
            self.history.pop_front();
        }

        if self.history.len() < self.cfg.min_frames {
            return hazards;
        }

        let total = hazards.len();
        let consistent: Vec<HazardObject> = hazards
            .iter()
            .filter(|h| self.appearances(h) >= self.cfg.min_appearances)
            .cloned()
            .collect();

        debug!("smoother: frames={} in={} consistent={}", self.history.len(), total, consistent.len());

        if consistent.is_empty() && total > 0 {
            // nothing stable yet, show the raw frame rather than flicker to empty
            return hazards;
        }
        consistent
    }

    fn appearances(&self, h: &HazardObject) -> usize {
        self.history
            .iter()
            .filter(|f| {
                f.hazards.iter().any(|o| {
                    o.object_name == h.object_name
                        && o.bounding_box.center_l1_distance(&h.bounding_box) < self.cfg.similarity_distance
                })
            })
            .count()
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}
