//! Metrics snapshot computation and the readiness pillar catalog

pub mod computer;
pub mod pillars;
pub mod types;

pub use computer::{
    compute_for_program, compute_snapshot, resolve_engagement, resolve_pillar,
    resolve_student_count, store_snapshot, SnapshotInputs,
};
pub use pillars::{classify, pillar_by_id, PillarDef, PillarLevel, PillarSource, PILLARS};
pub use types::{
    ComputedBy, EngagementMetrics, MetricsSnapshot, ProgramMetrics, ReachMetrics,
    RecognitionMetrics,
};
