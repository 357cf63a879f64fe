//! Household Danger Index and safety recommendations.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use time::OffsetDateTime;

use crate::classes::HazardLabel;
use crate::hazard::{HazardId, HazardObject, RiskLevel};

/// Scene-level severity. Shares numeric cutoffs with [`RiskLevel`] but is a separate scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Safe,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn from_hdi(hdi: f32) -> Severity {
        if hdi >= 0.5 {
            Severity::Critical
        } else if hdi >= 0.4 {
            Severity::High
        } else if hdi >= 0.3 {
            Severity::Moderate
        } else if hdi >= 0.2 {
            Severity::Low
        } else {
            Severity::Safe
        }
    }

    pub fn interpretation(self) -> &'static str {
        match self {
            Severity::Safe => "Safe",
            Severity::Low => "Slightly Unsafe",
            Severity::Moderate => "Moderately Unsafe",
            Severity::High => "Highly Unsafe",
            Severity::Critical => "Critically Unsafe",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Suggested,
    Important,
    Urgent,
}

impl Priority {
    pub fn from_score(score: f32) -> Priority {
        if score >= 0.4 {
            Priority::Urgent
        } else if score >= 0.3 {
            Priority::Important
        } else {
            Priority::Suggested
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyRecommendation {
    pub message: String,
    pub priority: Priority,
    pub category: String,
    pub affected_hazards: Vec<HazardId>,
    pub is_completed: bool,
}

impl SafetyRecommendation {
    fn new(message: String, priority: Priority, category: &str, affected_hazards: Vec<HazardId>) -> Self {
        Self { message, priority, category: category.to_string(), affected_hazards, is_completed: false }
    }
}

/// Mean risk score, rounded to two decimals so it lands on the same grid as
/// the scores and compares cleanly against the severity cutoffs.
pub fn calculate_hdi(hazards: &[HazardObject]) -> f32 {
    if hazards.is_empty() {
        return 0.0;
    }
    let mean = hazards.iter().map(|h| f64::from(h.risk_score())).sum::<f64>() / hazards.len() as f64;
    ((mean * 100.0).round() / 100.0) as f32
}

/// Picks the message for one hazard; earlier arms take precedence.
fn hazard_advice(h: &HazardObject) -> (String, &'static str) {
    use HazardLabel::*;
    let name = h.display_name();
    let has = |l| h.has_label(l);

    if has(NearEdge) || has(FallRisk) {
        (format!("Move the {name} away from the edge of the surface so it cannot be knocked off."), "Fall Prevention")
    } else if has(Structural) {
        (format!("Install a safety gate or guard at the {name} and keep it closed."), "Structural Safety")
    } else if has(Drowning) {
        (format!("Empty the {name} after use and never leave a child near standing water."), "Water Safety")
    } else if has(Explosive) || has(Flammable) {
        (format!("Store the {name} in a locked cabinet away from heat sources."), "Fire Safety")
    } else if has(Electrical) {
        (format!("Fit a safety cover or cord shortener to the {name}."), "Electrical Safety")
    } else if has(Hot) {
        (format!("Use guards or back burners and keep children away from the {name} while it is hot."), "Burn Prevention")
    } else if has(Poisonous) {
        (format!("Lock the {name} away in a child-resistant cabinet."), "Poison Control")
    } else if has(Sharp) {
        (format!("Keep the {name} in a locked drawer or out of reach."), "Sharp Objects")
    } else if has(Choking) {
        (format!("Remove the {name} from floors and low surfaces; it is a choking hazard."), "Choking Hazards")
    } else if has(UnstableFurniture) {
        (format!("Anchor the {name} to the wall to prevent tip-over."), "Furniture Safety")
    } else if has(Hard) {
        (format!("Add corner protectors to the {name}."), "Impact Protection")
    } else if has(Fragile) {
        (format!("Move the {name} to a higher, stable location."), "Breakables")
    } else {
        (format!("Review the placement of the {name} and secure it if needed."), "General Safety")
    }
}

/// Assessment over the current hazard set. Recomputed on demand, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct HouseholdDangerIndex {
    pub hazards: Vec<HazardObject>,
    pub assessment_time: OffsetDateTime,
    pub room_name: Option<String>,
}

impl HouseholdDangerIndex {
    pub fn new(hazards: Vec<HazardObject>, assessment_time: OffsetDateTime) -> Self {
        Self { hazards, assessment_time, room_name: None }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room_name = Some(room.into());
        self
    }

    pub fn calculate_hdi(&self) -> f32 {
        calculate_hdi(&self.hazards)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_hdi(self.calculate_hdi())
    }

    pub fn interpretation(&self) -> &'static str {
        self.severity().interpretation()
    }

    pub fn level_breakdown(&self) -> BTreeMap<RiskLevel, usize> {
        let mut counts: BTreeMap<RiskLevel, usize> = RiskLevel::ALL.iter().map(|l| (*l, 0)).collect();
        for h in &self.hazards {
            *counts.entry(h.risk_level()).or_default() += 1;
        }
        counts
    }

    /// Highest-scoring hazard; the earliest wins ties.
    pub fn highest_risk(&self) -> Option<&HazardObject> {
        self.hazards.iter().fold(None, |best: Option<&HazardObject>, h| match best {
            Some(b) if b.risk_score() >= h.risk_score() => Some(b),
            _ => Some(h),
        })
    }

    pub fn generate_recommendations(&self) -> Vec<SafetyRecommendation> {
        let mut seen: HashSet<(&str, RiskLevel)> = HashSet::new();
        let mut recs = Vec::new();

        for h in &self.hazards {
            if !seen.insert((h.object_name.as_str(), h.risk_level())) {
                continue;
            }
            let (message, category) = hazard_advice(h);
            recs.push(SafetyRecommendation::new(message, Priority::from_score(h.risk_score()), category, vec![h.id]));
        }

        let hdi = self.calculate_hdi();
        let all_ids = || self.hazards.iter().map(|h| h.id).collect::<Vec<_>>();
        if hdi >= 0.4 {
            recs.push(SafetyRecommendation::new(
                "Multiple severe hazards detected. Address the urgent items before leaving a child unsupervised in this room.".into(),
                Priority::Urgent,
                "Overall Assessment",
                all_ids(),
            ));
            recs.push(SafetyRecommendation::new(
                "Consider a professional home-safety assessment for this room.".into(),
                Priority::Important,
                "Overall Assessment",
                vec![],
            ));
        } else if hdi >= 0.3 {
            recs.push(SafetyRecommendation::new(
                "Several hazards need attention. Work through the important items this week.".into(),
                Priority::Important,
                "Overall Assessment",
                all_ids(),
            ));
        } else if hdi >= 0.2 {
            recs.push(SafetyRecommendation::new(
                "This room is mostly safe. Review the suggested items when convenient.".into(),
                Priority::Suggested,
                "Overall Assessment",
                vec![],
            ));
        }

        // stable: equal priorities keep insertion order
        recs.sort_by(|a, b| b.priority.cmp(&a.priority));
        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RiskClassifier;
    use crate::decode::Detection;
    use crate::geometry::BoundingBox;
    use crate::hazard::{HazardIdGen, LabelContext};

    struct Fixture {
        classifier: RiskClassifier,
        ids: HazardIdGen,
    }

    impl Fixture {
        fn new() -> Self {
            Self { classifier: RiskClassifier::default(), ids: HazardIdGen::new() }
        }

        fn at(&self, name: &str, x: f32, y: f32) -> HazardObject {
            let det = Detection::new(name, 0.8, BoundingBox::new(x, y, 0.1, 0.1));
            self.classifier.classify(&det, self.ids.next_id(), OffsetDateTime::UNIX_EPOCH)
        }

        fn hazard(&self, name: &str) -> HazardObject {
            self.at(name, 0.45, 0.45)
        }
    }

    fn index(hazards: Vec<HazardObject>) -> HouseholdDangerIndex {
        HouseholdDangerIndex::new(hazards, OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn empty_hdi_is_zero() {
        assert_eq!(calculate_hdi(&[]), 0.0);
        let idx = index(vec![]);
        assert_eq!(idx.severity(), Severity::Safe);
        assert!(idx.generate_recommendations().is_empty());
        assert!(idx.highest_risk().is_none());
    }

    #[test]
    fn uniform_scores_average_to_the_score() {
        let f = Fixture::new();
        for n in 1..=12 {
            let hs: Vec<_> = (0..n).map(|_| f.hazard("bookshelf")).collect();
            assert_eq!(hs[0].risk_score(), 0.3);
            assert_eq!(calculate_hdi(&hs), 0.3, "n={n}");
            assert_eq!(index(hs).severity(), Severity::Moderate, "n={n}");
        }
        let knives: Vec<_> = (0..7).map(|_| f.hazard("knife")).collect();
        assert_eq!(calculate_hdi(&knives), 0.4);
    }

    #[test]
    fn mixed_scores_hit_the_moderate_cutoff() {
        let f = Fixture::new();
        // 0.2 + 0.2 + 0.5 over three hazards is exactly 0.3
        let hs = vec![f.at("table_corner", 0.45, 0.1), f.at("table_corner", 0.45, 0.1), f.hazard("stove")];
        let scores: Vec<f32> = hs.iter().map(|h| h.risk_score()).collect();
        assert_eq!(scores, vec![0.2, 0.2, 0.5]);
        assert_eq!(calculate_hdi(&hs), 0.3);
        let idx = index(hs);
        assert_eq!(idx.severity(), Severity::Moderate);
        assert!(idx
            .generate_recommendations()
            .iter()
            .any(|r| r.category == "Overall Assessment" && r.priority == Priority::Important));
    }

    #[test]
    fn severity_boundaries_match_risk_levels() {
        let pairs = [
            (RiskLevel::Minimal, Severity::Safe),
            (RiskLevel::Low, Severity::Low),
            (RiskLevel::Moderate, Severity::Moderate),
            (RiskLevel::High, Severity::High),
            (RiskLevel::HighlyDangerous, Severity::Critical),
        ];
        for s in [0.0, 0.1, 0.19, 0.2, 0.25, 0.3, 0.39, 0.4, 0.45, 0.5] {
            let level = RiskLevel::from_score(s);
            let sev = Severity::from_hdi(s);
            assert!(pairs.contains(&(level, sev)), "{s}");
        }
        assert_eq!(Severity::High.interpretation(), "Highly Unsafe");
        assert_eq!(Severity::Critical.interpretation(), "Critically Unsafe");
    }

    #[test]
    fn duplicates_by_name_and_level_emit_once() {
        let f = Fixture::new();
        let a = f.at("knife", 0.1, 0.4);
        let b = f.at("knife", 0.7, 0.5);
        assert_eq!(a.risk_level(), b.risk_level());
        let recs = index(vec![a.clone(), b]).generate_recommendations();
        let knife_recs: Vec<_> = recs.iter().filter(|r| r.category == "Sharp Objects").collect();
        assert_eq!(knife_recs.len(), 1);
        assert_eq!(knife_recs[0].affected_hazards, vec![a.id]);
    }

    #[test]
    fn same_name_different_level_is_not_a_duplicate() {
        let f = Fixture::new();
        let reach = f.at("bucket", 0.4, 0.5);
        let high = f.at("bucket", 0.4, 0.0);
        assert_ne!(reach.risk_level(), high.risk_level());
        let recs = index(vec![reach, high]).generate_recommendations();
        assert_eq!(recs.iter().filter(|r| r.category == "Water Safety").count(), 2);
    }

    #[test]
    fn recommendations_sorted_and_stable() {
        let f = Fixture::new();
        // suggested, urgent, suggested, important, urgent
        let hs = vec![
            f.hazard("table_corner"),
            f.hazard("knife"),
            f.hazard("fragile_object"),
            f.hazard("bookshelf"),
            f.hazard("stove"),
        ];
        let recs = index(hs).generate_recommendations();
        for w in recs.windows(2) {
            assert!(w[0].priority >= w[1].priority);
        }
        let urgent: Vec<_> = recs.iter().filter(|r| r.priority == Priority::Urgent).map(|r| r.category.as_str()).collect();
        assert_eq!(urgent, vec!["Sharp Objects", "Burn Prevention"]);
        let suggested: Vec<_> = recs.iter().filter(|r| r.priority == Priority::Suggested).map(|r| r.category.as_str()).collect();
        assert_eq!(suggested, vec!["Impact Protection", "Breakables"]);
        assert!(recs.iter().all(|r| !r.is_completed));
    }

    #[test]
    fn edge_advice_wins_over_categorical() {
        let f = Fixture::new();
        let k = f.hazard("knife");
        let ctx = LabelContext { is_near_edge: true, ..*k.context() };
        let k = f.classifier.reclassify(&k, ctx);
        let (_, category) = hazard_advice(&k);
        assert_eq!(category, "Fall Prevention");
    }

    #[test]
    fn global_recommendations_follow_hdi_tier() {
        let f = Fixture::new();
        let severe = index(vec![f.hazard("stove"), f.hazard("cleaning_chemical")]).generate_recommendations();
        assert_eq!(severe.iter().filter(|r| r.category == "Overall Assessment").count(), 2);
        assert_eq!(severe[0].priority, Priority::Urgent);

        let mild = index(vec![f.hazard("table_corner")]).generate_recommendations();
        assert_eq!(mild.iter().filter(|r| r.category == "Overall Assessment").count(), 1);
        assert_eq!(mild.last().unwrap().priority, Priority::Suggested);
    }

    #[test]
    fn breakdown_and_highest() {
        let f = Fixture::new();
        let idx = index(vec![f.hazard("table_corner"), f.hazard("stove"), f.hazard("knife")]);
        let counts = idx.level_breakdown();
        assert_eq!(counts[&RiskLevel::HighlyDangerous], 1);
        assert_eq!(counts[&RiskLevel::High], 1);
        assert_eq!(counts[&RiskLevel::Low], 1);
        assert_eq!(counts[&RiskLevel::Minimal], 0);
        assert_eq!(idx.highest_risk().unwrap().object_name, "stove");
    }
}
