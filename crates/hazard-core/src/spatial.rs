use tracing::debug;

use crate::classes::{ClassRole, SurfaceKind};
use crate::classify::RiskClassifier;
use crate::decode::Detection;
use crate::geometry::BoundingBox;
use crate::hazard::{HazardObject, LabelContext};

pub const EDGE_NEAR_DISTANCE: f32 = 0.15;
pub const EDGE_ABOVE_BAND: f32 = 0.05;
pub const EDGE_MIN_OVERLAP_FRAC: f32 = 0.5;
pub const SURFACE_MAX_DISTANCE: f32 = 0.3;

/// Non-hazard objects of a frame that give hazards their spatial context.
#[derive(Debug, Clone, Default)]
pub struct SceneContext {
    pub edges: Vec<BoundingBox>,
    pub surfaces: Vec<(SurfaceKind, BoundingBox)>,
}

impl SceneContext {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.surfaces.is_empty()
    }
}

/// Separates edge and surface detections from hazard detections.
/// Unknown classes are treated as hazards.
pub fn split_scene(dets: Vec<Detection>) -> (Vec<Detection>, SceneContext) {
    let mut scene = SceneContext::default();
    let mut hazards = Vec::with_capacity(dets.len());
    for d in dets {
        match d.class.map(|c| c.role()) {
            Some(ClassRole::Edge) => scene.edges.push(d.bbox),
            Some(ClassRole::Surface(kind)) => scene.surfaces.push((kind, d.bbox)),
            Some(ClassRole::Hazard) | None => hazards.push(d),
        }
    }
    (hazards, scene)
}

fn edge_sensitive(h: &HazardObject) -> bool {
    h.class.map(|c| c.is_edge_sensitive()).unwrap_or(false)
}

/// Escalates edge-sensitive hazards that sit near or directly on a surface edge.
/// The first matching edge wins.
pub fn detect_edge_proximity(
    classifier: &RiskClassifier,
    hazards: Vec<HazardObject>,
    scene: &SceneContext,
) -> Vec<HazardObject> {
    if scene.edges.is_empty() {
        return hazards;
    }
    hazards
        .into_iter()
        .map(|h| {
            if !edge_sensitive(&h) || h.is_near_edge {
                return h;
            }
            let hit = scene.edges.iter().find(|edge| {
                h.bounding_box.is_near(edge, EDGE_NEAR_DISTANCE)
                    || h.bounding_box.is_above_edge(edge, EDGE_ABOVE_BAND, EDGE_MIN_OVERLAP_FRAC)
            });
            match hit {
                Some(edge) => {
                    let distance = h.bounding_box.center_distance(edge);
                    debug!("spatial: {} {} near edge d={:.3}", h.id, h.object_name, distance);
                    let ctx = LabelContext { is_near_edge: true, ..*h.context() };
                    classifier.reclassify(&h, ctx).with_distance_to_edge(distance)
                }
                None => h,
            }
        })
        .collect()
}

/// Gives hazards without any positional label the height of the nearest surface.
pub fn infer_surface_positions(
    classifier: &RiskClassifier,
    hazards: Vec<HazardObject>,
    scene: &SceneContext,
) -> Vec<HazardObject> {
    if scene.surfaces.is_empty() {
        return hazards;
    }
    hazards
        .into_iter()
        .map(|h| {
            if h.has_positional_label() {
                return h;
            }
            let nearest = scene
                .surfaces
                .iter()
                .map(|(kind, b)| (*kind, h.bounding_box.center_distance(b)))
                .filter(|(_, d)| *d < SURFACE_MAX_DISTANCE)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            match nearest {
                Some((kind, _)) => {
                    let ctx = LabelContext { associated_surface: Some(kind), ..*h.context() };
                    classifier.reclassify(&h, ctx)
                }
                None => h,
            }
        })
        .collect()
}

pub fn detect_spatial_context(
    classifier: &RiskClassifier,
    hazards: Vec<HazardObject>,
    scene: &SceneContext,
) -> Vec<HazardObject> {
    let hazards = detect_edge_proximity(classifier, hazards, scene);
    infer_surface_positions(classifier, hazards, scene)
}
