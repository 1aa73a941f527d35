//! Metrics snapshot types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pillars::PillarLevel;
use crate::program::ProgramId;

/// Provenance of a computed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedBy {
    /// Computed automatically (checkpoint trigger)
    System,
    /// Computed by an explicit admin refresh
    Manual,
}

/// Student-reach figures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachMetrics {
    pub students_onboarded: u64,
    pub schools_assigned: u32,
    /// Distinct non-empty city/district values among assigned schools, sorted
    pub regions: Vec<String>,
}

/// Engagement figures, computed only from live roster data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub active_students: u64,
    /// Percentage of matched students marked active
    pub engagement_rate_pct: f64,
}

/// Recognition figures (certificates, kits, badges)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionMetrics {
    pub certificates_issued: u64,
    pub kits_in_progress: u64,
    pub badges_awarded: u64,
    /// Completers ÷ matched students × 100, rounded to nearest integer
    pub completion_rate_pct: u32,
}

/// Point-in-time metrics rollup for a program.
///
/// Immutable once captured into a checkpoint; the per-program stored copy is
/// overwritten (not appended) on each recomputation. The readiness map is a
/// `BTreeMap` so repeated computation over identical inputs serializes
/// byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub reach: ReachMetrics,
    pub engagement: EngagementMetrics,
    /// Pillar id → classified exposure level
    pub readiness: BTreeMap<String, PillarLevel>,
    pub recognition: RecognitionMetrics,
    pub computed_at: Option<DateTime<Utc>>,
    pub computed_by: ComputedBy,
}

impl MetricsSnapshot {
    /// The empty snapshot created alongside a new program, before any
    /// computation has run.
    pub fn empty() -> Self {
        Self {
            reach: ReachMetrics::default(),
            engagement: EngagementMetrics::default(),
            readiness: BTreeMap::new(),
            recognition: RecognitionMetrics::default(),
            computed_at: None,
            computed_by: ComputedBy::System,
        }
    }

    /// Stored level for a pillar, `NoData` when never computed
    pub fn pillar_level(&self, pillar_id: &str) -> PillarLevel {
        self.readiness
            .get(pillar_id)
            .copied()
            .unwrap_or(PillarLevel::NoData)
    }
}

/// One-per-program stored metrics rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramMetrics {
    pub program_id: ProgramId,
    pub snapshot: MetricsSnapshot,
}

impl ProgramMetrics {
    /// Create the empty rollup row for a freshly created program
    pub fn empty(program_id: ProgramId) -> Self {
        Self {
            program_id,
            snapshot: MetricsSnapshot::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_no_data() {
        let snapshot = MetricsSnapshot::empty();
        assert_eq!(snapshot.reach.students_onboarded, 0);
        assert!(snapshot.computed_at.is_none());
        assert_eq!(snapshot.pillar_level("communication"), PillarLevel::NoData);
    }

    #[test]
    fn snapshot_serde_roundtrip() {
        let mut snapshot = MetricsSnapshot::empty();
        snapshot.reach.students_onboarded = 120;
        snapshot
            .readiness
            .insert("stem_exposure".into(), PillarLevel::High);

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(json.contains("\"high\""));
    }

    #[test]
    fn computed_by_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&ComputedBy::Manual).unwrap(),
            "\"manual\""
        );
    }
}
