//! Multi-label hazard classification and risk scoring.

use time::OffsetDateTime;

use crate::classes::{HazardLabel, LabelSet, ObjectClass};
use crate::config::PositionConfig;
use crate::decode::Detection;
use crate::hazard::{HazardId, HazardObject, LabelContext};

/// Below this estimated height an object is on the floor.
pub const FLOOR_THRESHOLD_M: f32 = 0.3;
/// WHO growth-standard reach height for a young child.
pub const CHILD_REACH_HEIGHT_M: f32 = 0.96;

pub const MAX_RISK_SCORE: f32 = 0.5;
pub const EDGE_BOOST: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRule {
    HighlyDangerous,
    ExplosiveOrDrowningInReach,
    StoredProperly,
    HighRisk,
    SharpInReach,
    HotElectricalOrPoisonInReach,
    FallRisk,
    ModerateRisk,
    Unsecured,
    LowRisk,
}

impl RiskRule {
    pub fn matches(self, labels: &LabelSet) -> bool {
        use HazardLabel::*;
        let has = |l: HazardLabel| labels.contains(&l);
        match self {
            RiskRule::HighlyDangerous => has(HighlyDangerous),
            RiskRule::ExplosiveOrDrowningInReach => (has(Explosive) || has(Drowning)) && has(WithinReach),
            RiskRule::StoredProperly => has(StoredProperly),
            RiskRule::HighRisk => has(HighRisk),
            RiskRule::SharpInReach => has(Sharp) && has(WithinReach),
            RiskRule::HotElectricalOrPoisonInReach => {
                (has(Hot) || has(Electrical) || has(Poisonous)) && has(WithinReach)
            }
            RiskRule::FallRisk => has(FallRisk),
            RiskRule::ModerateRisk => has(ModerateRisk),
            RiskRule::Unsecured => has(Unsecured),
            RiskRule::LowRisk => has(LowRisk),
        }
    }
}

/// Evaluated top-down, first match wins. Order matters: the predicates overlap.
pub const RISK_CASCADE: &[(RiskRule, f32)] = &[
    (RiskRule::HighlyDangerous, 0.5),
    (RiskRule::ExplosiveOrDrowningInReach, 0.5),
    (RiskRule::StoredProperly, 0.1),
    (RiskRule::HighRisk, 0.4),
    (RiskRule::SharpInReach, 0.4),
    (RiskRule::HotElectricalOrPoisonInReach, 0.4),
    (RiskRule::FallRisk, 0.3),
    (RiskRule::ModerateRisk, 0.3),
    (RiskRule::Unsecured, 0.3),
    (RiskRule::LowRisk, 0.2),
];

pub const BASELINE_SCORE: f32 = 0.1;

fn round_score(s: f32) -> f32 {
    (s * 100.0).round() / 100.0
}

pub fn calculate_risk_score(labels: &LabelSet, is_near_edge: bool) -> f32 {
    let base = RISK_CASCADE
        .iter()
        .find(|(rule, _)| rule.matches(labels))
        .map(|(_, score)| *score)
        .unwrap_or(BASELINE_SCORE);

    if is_near_edge && base < MAX_RISK_SCORE {
        round_score(base + EDGE_BOOST).min(MAX_RISK_SCORE)
    } else {
        base
    }
}

/// Height of an object above the floor assuming a level camera at `camera_height_m`.
pub fn estimate_height(center_y: f32, camera_height_m: f32) -> f32 {
    camera_height_m * (1.0 - center_y.clamp(0.0, 1.0))
}

pub fn positional_labels(height_m: f32) -> &'static [HazardLabel] {
    if height_m < FLOOR_THRESHOLD_M {
        &[HazardLabel::FloorLevel, HazardLabel::WithinReach]
    } else if height_m <= CHILD_REACH_HEIGHT_M {
        &[HazardLabel::WithinReach]
    } else {
        &[HazardLabel::Elevated]
    }
}

pub fn categorical_labels(class: Option<ObjectClass>) -> &'static [HazardLabel] {
    match class {
        Some(c) => c.categorical_labels(),
        None => &[HazardLabel::ModerateRisk],
    }
}

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    position: PositionConfig,
}

impl RiskClassifier {
    pub fn new(position: PositionConfig) -> Self {
        Self { position }
    }

    pub fn assign_hazard_labels(&self, class: Option<ObjectClass>, ctx: &LabelContext) -> LabelSet {
        let mut labels: LabelSet = categorical_labels(class).iter().copied().collect();

        let height = match (ctx.center_y, ctx.associated_surface) {
            (Some(cy), _) => Some(estimate_height(cy, self.position.camera_height_m)),
            (None, Some(surface)) => Some(surface.height_m()),
            (None, None) => None,
        };
        if let Some(h) = height {
            labels.extend(positional_labels(h).iter().copied());
        }

        let edge_sensitive = class.map(|c| c.is_edge_sensitive()).unwrap_or(false);
        if ctx.is_near_edge && edge_sensitive {
            labels.insert(HazardLabel::NearEdge);
            labels.insert(HazardLabel::FallRisk);
            labels.remove(&HazardLabel::LowRisk);
        }

        match ctx.is_secured {
            Some(true) => { labels.insert(HazardLabel::Secured); }
            Some(false) => { labels.insert(HazardLabel::Unsecured); }
            None => {}
        }
        if ctx.has_storage == Some(true) {
            labels.insert(HazardLabel::StoredProperly);
        }
        labels
    }

    /// Builds the hazard for one surviving detection.
    pub fn classify(&self, det: &Detection, id: HazardId, detected_at: OffsetDateTime) -> HazardObject {
        let ctx = LabelContext {
            center_y: self.position.use_vertical_position.then(|| det.bbox.center_y()),
            ..LabelContext::default()
        };
        let labels = self.assign_hazard_labels(det.class, &ctx);
        let score = calculate_risk_score(&labels, ctx.is_near_edge);
        HazardObject::new(
            id,
            det.class_name.clone(),
            det.class,
            labels,
            score,
            det.bbox,
            det.confidence,
            detected_at,
            ctx,
        )
    }

    /// Re-runs label assignment and scoring with a changed context, returning a new hazard.
    pub fn reclassify(&self, hazard: &HazardObject, ctx: LabelContext) -> HazardObject {
        let labels = self.assign_hazard_labels(hazard.class, &ctx);
        let score = calculate_risk_score(&labels, ctx.is_near_edge);
        hazard.with_assessment(labels, score, ctx)
    }
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(PositionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::SurfaceKind;
    use crate::geometry::BoundingBox;
    use HazardLabel::*;

    fn set(labels: &[HazardLabel]) -> LabelSet {
        labels.iter().copied().collect()
    }

    fn at(center_y: f32) -> LabelContext {
        LabelContext { center_y: Some(center_y), ..LabelContext::default() }
    }

    #[test]
    fn knife_mid_frame_is_sharp_and_within_reach() {
        let c = RiskClassifier::default();
        let labels = c.assign_hazard_labels(Some(ObjectClass::Knife), &at(0.5));
        assert_eq!(labels, set(&[Sharp, HighRisk, WithinReach]));
        assert_eq!(calculate_risk_score(&labels, false), 0.4);
    }

    #[test]
    fn positional_tiers() {
        let c = RiskClassifier::default();
        // 1.5 * (1 - 0.9) = 0.15 m
        let floor = c.assign_hazard_labels(None, &at(0.9));
        assert!(floor.contains(&FloorLevel) && floor.contains(&WithinReach));
        // 1.5 * (1 - 0.2) = 1.2 m
        let high = c.assign_hazard_labels(None, &at(0.2));
        assert!(high.contains(&Elevated) && !high.contains(&WithinReach));
        assert!(c.assign_hazard_labels(None, &LabelContext::default()).iter().all(|l| !l.is_positional()));
    }

    #[test]
    fn child_reach_boundary_is_inclusive() {
        assert_eq!(positional_labels(CHILD_REACH_HEIGHT_M), &[WithinReach]);
        assert_eq!(positional_labels(0.97), &[Elevated]);
        assert_eq!(positional_labels(0.29), &[FloorLevel, WithinReach]);
    }

    #[test]
    fn unknown_class_is_moderate() {
        let c = RiskClassifier::default();
        let labels = c.assign_hazard_labels(None, &LabelContext::default());
        assert_eq!(labels, set(&[ModerateRisk]));
        assert_eq!(calculate_risk_score(&labels, false), 0.3);
    }

    #[test]
    fn edge_labels_only_for_edge_sensitive_classes() {
        let c = RiskClassifier::default();
        let ctx = LabelContext { is_near_edge: true, ..LabelContext::default() };
        let fragile = c.assign_hazard_labels(Some(ObjectClass::FragileObject), &ctx);
        assert_eq!(fragile, set(&[Fragile, NearEdge, FallRisk]));
        let corner = c.assign_hazard_labels(Some(ObjectClass::TableCorner), &ctx);
        assert_eq!(corner, set(&[Hard, LowRisk]));
        let unknown = c.assign_hazard_labels(None, &ctx);
        assert!(!unknown.contains(&NearEdge));
    }

    #[test]
    fn security_flags() {
        let c = RiskClassifier::default();
        let ctx = LabelContext { is_secured: Some(false), has_storage: Some(true), ..LabelContext::default() };
        let labels = c.assign_hazard_labels(Some(ObjectClass::Knife), &ctx);
        assert!(labels.contains(&Unsecured) && labels.contains(&StoredProperly));
        assert_eq!(calculate_risk_score(&labels, false), 0.1);
    }

    #[test]
    fn surface_height_fallback() {
        let c = RiskClassifier::default();
        let ctx = LabelContext { associated_surface: Some(SurfaceKind::Shelf), ..LabelContext::default() };
        assert!(c.assign_hazard_labels(Some(ObjectClass::Medicine), &ctx).contains(&Elevated));
        let ctx = LabelContext { associated_surface: Some(SurfaceKind::Table), ..LabelContext::default() };
        assert!(c.assign_hazard_labels(Some(ObjectClass::Medicine), &ctx).contains(&WithinReach));
    }

    #[test]
    fn cascade_order_is_first_match() {
        assert_eq!(calculate_risk_score(&set(&[HighlyDangerous, HighRisk]), false), 0.5);
        assert_eq!(calculate_risk_score(&set(&[Drowning, ModerateRisk, WithinReach]), false), 0.5);
        assert_eq!(calculate_risk_score(&set(&[Drowning, ModerateRisk, Elevated]), false), 0.3);
        assert_eq!(calculate_risk_score(&set(&[Hot, ModerateRisk, WithinReach]), false), 0.4);
        assert_eq!(calculate_risk_score(&set(&[LowRisk]), false), 0.2);
        assert_eq!(calculate_risk_score(&set(&[Fragile]), false), 0.1);
    }

    #[test]
    fn highly_dangerous_never_below_low_risk() {
        let extras = [Sharp, Hot, WithinReach, Elevated, StoredProperly, Unsecured, FallRisk];
        for e in extras {
            for edge in [false, true] {
                let hd = calculate_risk_score(&set(&[HighlyDangerous, e]), edge);
                let lr = calculate_risk_score(&set(&[LowRisk, e]), edge);
                assert!(hd >= lr, "{e} edge={edge}");
            }
        }
    }

    #[test]
    fn edge_boost_crosses_tiers_but_caps() {
        assert_eq!(calculate_risk_score(&set(&[LowRisk]), true), 0.3);
        assert_eq!(calculate_risk_score(&set(&[HighRisk]), true), 0.5);
        assert_eq!(calculate_risk_score(&set(&[HighlyDangerous]), true), 0.5);
        for (_, score) in RISK_CASCADE {
            assert!(*score <= MAX_RISK_SCORE);
        }
        assert!(calculate_risk_score(&set(&[FallRisk, NearEdge]), true) <= MAX_RISK_SCORE);
    }

    #[test]
    fn reclassify_returns_copy() {
        let c = RiskClassifier::default();
        let det = Detection::new("fragile_object", 0.8, BoundingBox::new(0.4, 0.5, 0.1, 0.1));
        let original = c.classify(&det, HazardId(7), OffsetDateTime::UNIX_EPOCH);
        let ctx = LabelContext { is_near_edge: true, ..*original.context() };
        let moved = c.reclassify(&original, ctx);
        assert!(!original.is_near_edge);
        assert!(moved.is_near_edge);
        assert_eq!(moved.id, original.id);
        assert!(moved.risk_score() > original.risk_score());
        assert_eq!(moved.risk_level(), crate::hazard::RiskLevel::from_score(moved.risk_score()));
    }
}
