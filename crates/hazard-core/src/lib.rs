//! Post-detection hazard pipeline: decode, suppress, classify, smooth, score.

pub mod backend;
pub mod classes;
pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod hazard;
pub mod hdi;
pub mod nms;
pub mod preprocess;
pub mod session;
pub mod smoother;
pub mod spatial;

pub use backend::{InferenceBackend, ReplayBackend};
pub use classes::{HazardLabel, LabelSet, ObjectClass, SurfaceKind};
pub use classify::{calculate_risk_score, RiskClassifier};
pub use config::PipelineConfig;
pub use decode::{Detection, RawTensor};
pub use error::{HazardError, Result};
pub use geometry::BoundingBox;
pub use hazard::{HazardId, HazardObject, LabelContext, RiskLevel};
pub use hdi::{calculate_hdi, HouseholdDangerIndex, Priority, SafetyRecommendation, Severity};
pub use preprocess::ImageTensor;
pub use session::{FrameOutcome, HazardSession};
