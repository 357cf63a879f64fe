use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

use crate::classes::{HazardLabel, LabelSet, ObjectClass, SurfaceKind};
use crate::geometry::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HazardId(pub u64);

impl fmt::Display for HazardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hz-{}", self.0)
    }
}

/// Monotonic id source; ids are unique for the lifetime of the generator.
#[derive(Debug)]
pub struct HazardIdGen {
    next: AtomicU64,
}

impl Default for HazardIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardIdGen {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next_id(&self) -> HazardId {
        HazardId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    Minimal,
    Low,
    Moderate,
    High,
    HighlyDangerous,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Minimal,
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::HighlyDangerous,
    ];

    pub fn from_score(score: f32) -> RiskLevel {
        if score >= 0.5 {
            RiskLevel::HighlyDangerous
        } else if score >= 0.4 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Moderate
        } else if score >= 0.2 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Minimal => "Minimal Risk",
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
            RiskLevel::HighlyDangerous => "Highly Dangerous",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs the label assignment was computed from. Kept on the hazard so later
/// stages can re-run classification with one input changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LabelContext {
    pub center_y: Option<f32>,
    pub is_secured: Option<bool>,
    pub has_storage: Option<bool>,
    pub is_near_edge: bool,
    pub associated_surface: Option<SurfaceKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HazardObject {
    pub id: HazardId,
    pub object_name: String,
    pub class: Option<ObjectClass>,
    hazard_labels: LabelSet,
    risk_score: f32,
    risk_level: RiskLevel,
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub detected_at: OffsetDateTime,
    pub is_near_edge: bool,
    pub distance_to_edge: Option<f32>,
    #[serde(skip)]
    pub(crate) context: LabelContext,
}

impl HazardObject {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: HazardId,
        object_name: String,
        class: Option<ObjectClass>,
        labels: LabelSet,
        risk_score: f32,
        bounding_box: BoundingBox,
        confidence: f32,
        detected_at: OffsetDateTime,
        context: LabelContext,
    ) -> Self {
        Self {
            id,
            object_name,
            class,
            hazard_labels: labels,
            risk_level: RiskLevel::from_score(risk_score),
            risk_score,
            bounding_box,
            confidence: confidence.clamp(0.0, 1.0),
            detected_at,
            is_near_edge: context.is_near_edge,
            distance_to_edge: None,
            context,
        }
    }

    pub fn hazard_labels(&self) -> &LabelSet { &self.hazard_labels }
    pub fn risk_score(&self) -> f32 { self.risk_score }
    pub fn risk_level(&self) -> RiskLevel { self.risk_level }
    pub fn context(&self) -> &LabelContext { &self.context }

    pub fn has_label(&self, label: HazardLabel) -> bool {
        self.hazard_labels.contains(&label)
    }

    pub fn has_positional_label(&self) -> bool {
        self.hazard_labels.iter().any(|l| l.is_positional())
    }

    /// Copy with a fresh assessment; the risk level is always re-derived from the score.
    pub(crate) fn with_assessment(&self, labels: LabelSet, risk_score: f32, context: LabelContext) -> Self {
        Self {
            hazard_labels: labels,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            is_near_edge: context.is_near_edge,
            context,
            ..self.clone()
        }
    }

    pub fn with_distance_to_edge(mut self, distance: f32) -> Self {
        self.distance_to_edge = Some(distance);
        self
    }

    /// Name used in user-facing text.
    pub fn display_name(&self) -> String {
        self.object_name.replace('_', " ")
    }
}
