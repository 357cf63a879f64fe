//! Canonical object classes and hazard labels.
//!
//! One class list is supported: the 27-entry set below, with a three-tier positional
//! model (floor / within reach / elevated). Index order is the default label file order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Knife,
    Scissors,
    Stove,
    Kettle,
    Iron,
    ElectricalOutlet,
    PowerCord,
    Medicine,
    CleaningChemical,
    Lighter,
    GasCylinder,
    Bathtub,
    Bucket,
    SmallObject,
    Battery,
    Bookshelf,
    TableCorner,
    FragileObject,
    Stairs,
    Window,
    PlasticBag,
    Toy,
    SurfaceEdge,
    Table,
    Countertop,
    Shelf,
    FloorMat,
}

/// What a detected class contributes to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    Hazard,
    /// A physical edge other objects can fall from.
    Edge,
    /// A support surface with a known typical height.
    Surface(SurfaceKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    FloorMat,
    Table,
    Countertop,
    Shelf,
}

impl SurfaceKind {
    /// Typical top height above the floor, in meters.
    pub fn height_m(self) -> f32 {
        match self {
            SurfaceKind::FloorMat => 0.0,
            SurfaceKind::Table => 0.75,
            SurfaceKind::Countertop => 0.9,
            SurfaceKind::Shelf => 1.6,
        }
    }
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 27] = [
        ObjectClass::Knife,
        ObjectClass::Scissors,
        ObjectClass::Stove,
        ObjectClass::Kettle,
        ObjectClass::Iron,
        ObjectClass::ElectricalOutlet,
        ObjectClass::PowerCord,
        ObjectClass::Medicine,
        ObjectClass::CleaningChemical,
        ObjectClass::Lighter,
        ObjectClass::GasCylinder,
        ObjectClass::Bathtub,
        ObjectClass::Bucket,
        ObjectClass::SmallObject,
        ObjectClass::Battery,
        ObjectClass::Bookshelf,
        ObjectClass::TableCorner,
        ObjectClass::FragileObject,
        ObjectClass::Stairs,
        ObjectClass::Window,
        ObjectClass::PlasticBag,
        ObjectClass::Toy,
        ObjectClass::SurfaceEdge,
        ObjectClass::Table,
        ObjectClass::Countertop,
        ObjectClass::Shelf,
        ObjectClass::FloorMat,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ObjectClass::Knife => "knife",
            ObjectClass::Scissors => "scissors",
            ObjectClass::Stove => "stove",
            ObjectClass::Kettle => "kettle",
            ObjectClass::Iron => "iron",
            ObjectClass::ElectricalOutlet => "electrical_outlet",
            ObjectClass::PowerCord => "power_cord",
            ObjectClass::Medicine => "medicine",
            ObjectClass::CleaningChemical => "cleaning_chemical",
            ObjectClass::Lighter => "lighter",
            ObjectClass::GasCylinder => "gas_cylinder",
            ObjectClass::Bathtub => "bathtub",
            ObjectClass::Bucket => "bucket",
            ObjectClass::SmallObject => "small_object",
            ObjectClass::Battery => "battery",
            ObjectClass::Bookshelf => "bookshelf",
            ObjectClass::TableCorner => "table_corner",
            ObjectClass::FragileObject => "fragile_object",
            ObjectClass::Stairs => "stairs",
            ObjectClass::Window => "window",
            ObjectClass::PlasticBag => "plastic_bag",
            ObjectClass::Toy => "toy",
            ObjectClass::SurfaceEdge => "surface_edge",
            ObjectClass::Table => "table",
            ObjectClass::Countertop => "countertop",
            ObjectClass::Shelf => "shelf",
            ObjectClass::FloorMat => "floor_mat",
        }
    }

    pub fn from_label(label: &str) -> Option<ObjectClass> {
        ObjectClass::ALL.iter().copied().find(|c| c.label() == label)
    }

    /// Human-readable name used in recommendation text.
    pub fn display_name(self) -> String {
        self.label().replace('_', " ")
    }

    pub fn role(self) -> ClassRole {
        match self {
            ObjectClass::SurfaceEdge => ClassRole::Edge,
            ObjectClass::Table => ClassRole::Surface(SurfaceKind::Table),
            ObjectClass::Countertop => ClassRole::Surface(SurfaceKind::Countertop),
            ObjectClass::Shelf => ClassRole::Surface(SurfaceKind::Shelf),
            ObjectClass::FloorMat => ClassRole::Surface(SurfaceKind::FloorMat),
            _ => ClassRole::Hazard,
        }
    }

    /// Classes whose risk escalates when they sit on or near a surface edge.
    pub fn is_edge_sensitive(self) -> bool {
        matches!(
            self,
            ObjectClass::Knife
                | ObjectClass::Scissors
                | ObjectClass::Kettle
                | ObjectClass::Iron
                | ObjectClass::Medicine
                | ObjectClass::CleaningChemical
                | ObjectClass::Lighter
                | ObjectClass::SmallObject
                | ObjectClass::Battery
                | ObjectClass::FragileObject
        )
    }

    /// Inherent hazard tags plus the baseline tier for this class.
    pub fn categorical_labels(self) -> &'static [HazardLabel] {
        use HazardLabel::*;
        match self {
            ObjectClass::Knife => &[Sharp, HighRisk],
            ObjectClass::Scissors => &[Sharp, ModerateRisk],
            ObjectClass::Stove => &[Hot, HighlyDangerous],
            ObjectClass::Kettle => &[Hot, HighRisk],
            ObjectClass::Iron => &[Hot, Electrical, HighRisk],
            ObjectClass::ElectricalOutlet => &[Electrical, HighRisk],
            ObjectClass::PowerCord => &[Electrical, ModerateRisk],
            ObjectClass::Medicine => &[Poisonous, HighRisk],
            ObjectClass::CleaningChemical => &[Poisonous, HighlyDangerous],
            ObjectClass::Lighter => &[Flammable, HighRisk],
            ObjectClass::GasCylinder => &[Explosive, Flammable, HighlyDangerous],
            ObjectClass::Bathtub => &[Drowning, HighRisk],
            ObjectClass::Bucket => &[Drowning, ModerateRisk],
            ObjectClass::SmallObject => &[Choking, ModerateRisk],
            ObjectClass::Battery => &[Choking, Poisonous, HighRisk],
            ObjectClass::Bookshelf => &[UnstableFurniture, ModerateRisk],
            ObjectClass::TableCorner => &[Hard, LowRisk],
            ObjectClass::FragileObject => &[Fragile, LowRisk],
            ObjectClass::Stairs => &[Structural, HighRisk],
            ObjectClass::Window => &[Structural, HighRisk],
            ObjectClass::PlasticBag => &[Choking, ModerateRisk],
            ObjectClass::Toy => &[LowRisk],
            ObjectClass::SurfaceEdge => &[Hard, LowRisk],
            ObjectClass::Table | ObjectClass::Countertop | ObjectClass::Shelf | ObjectClass::FloorMat => &[LowRisk],
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardLabel {
    // categorical
    Sharp,
    Hot,
    Electrical,
    Poisonous,
    Flammable,
    Explosive,
    Drowning,
    Choking,
    UnstableFurniture,
    Hard,
    Fragile,
    Structural,
    // baseline tier
    HighlyDangerous,
    HighRisk,
    ModerateRisk,
    LowRisk,
    // positional
    FloorLevel,
    WithinReach,
    Elevated,
    // contextual
    NearEdge,
    FallRisk,
    Secured,
    Unsecured,
    StoredProperly,
}

impl HazardLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            HazardLabel::Sharp => "sharp",
            HazardLabel::Hot => "hot",
            HazardLabel::Electrical => "electrical",
            HazardLabel::Poisonous => "poisonous",
            HazardLabel::Flammable => "flammable",
            HazardLabel::Explosive => "explosive",
            HazardLabel::Drowning => "drowning",
            HazardLabel::Choking => "choking",
            HazardLabel::UnstableFurniture => "unstable_furniture",
            HazardLabel::Hard => "hard",
            HazardLabel::Fragile => "fragile",
            HazardLabel::Structural => "structural",
            HazardLabel::HighlyDangerous => "highly_dangerous",
            HazardLabel::HighRisk => "high_risk",
            HazardLabel::ModerateRisk => "moderate_risk",
            HazardLabel::LowRisk => "low_risk",
            HazardLabel::FloorLevel => "floor_level",
            HazardLabel::WithinReach => "within_reach",
            HazardLabel::Elevated => "elevated",
            HazardLabel::NearEdge => "near_edge",
            HazardLabel::FallRisk => "fall_risk",
            HazardLabel::Secured => "secured",
            HazardLabel::Unsecured => "unsecured",
            HazardLabel::StoredProperly => "stored_properly",
        }
    }

    pub fn is_positional(self) -> bool {
        matches!(self, HazardLabel::FloorLevel | HazardLabel::WithinReach | HazardLabel::Elevated)
    }
}

impl fmt::Display for HazardLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type LabelSet = BTreeSet<HazardLabel>;

/// Default label file: every canonical class, in index order.
pub fn default_class_names() -> Vec<String> {
    ObjectClass::ALL.iter().map(|c| c.label().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_lookup() {
        for c in ObjectClass::ALL {
            assert_eq!(ObjectClass::from_label(c.label()), Some(c));
        }
        assert_eq!(ObjectClass::from_label("unicorn"), None);
    }

    #[test]
    fn every_class_has_exactly_one_baseline_tier() {
        let tiers = [
            HazardLabel::HighlyDangerous,
            HazardLabel::HighRisk,
            HazardLabel::ModerateRisk,
            HazardLabel::LowRisk,
        ];
        for c in ObjectClass::ALL {
            let n = c.categorical_labels().iter().filter(|l| tiers.contains(l)).count();
            assert_eq!(n, 1, "{c}");
        }
    }

    #[test]
    fn context_classes_are_not_edge_sensitive() {
        for c in ObjectClass::ALL {
            if c.role() != ClassRole::Hazard {
                assert!(!c.is_edge_sensitive(), "{c}");
            }
        }
    }
}
