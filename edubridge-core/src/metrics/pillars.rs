//! Readiness pillar catalog
//!
//! Static declarative table mapping each of the 11 readiness-exposure
//! pillars to its data source. Pure data; the only behavior here is the
//! shared score→level classifier.

use serde::{Deserialize, Serialize};

/// Classified exposure level for a readiness pillar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillarLevel {
    NoData,
    Low,
    Medium,
    High,
}

impl PillarLevel {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_data" => Some(Self::NoData),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// How a pillar's score is derived from raw records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PillarSource {
    /// Average of a per-student sub-score field (0–100) across the roster
    RosterAggregate { score_field: &'static str },
    /// Fraction of students with any matching activity record, as a percentage
    ActivityCoverage { activity_kind: &'static str },
}

/// One entry in the readiness pillar catalog
#[derive(Debug, Clone, Copy)]
pub struct PillarDef {
    pub id: &'static str,
    pub display_name: &'static str,
    pub source: PillarSource,
}

/// The fixed catalog of 11 readiness pillars.
///
/// Order here is the display order used by dashboards and reports.
pub const PILLARS: [PillarDef; 11] = [
    PillarDef {
        id: "communication",
        display_name: "Communication",
        source: PillarSource::RosterAggregate {
            score_field: "communication",
        },
    },
    PillarDef {
        id: "critical_thinking",
        display_name: "Critical Thinking",
        source: PillarSource::RosterAggregate {
            score_field: "critical_thinking",
        },
    },
    PillarDef {
        id: "collaboration",
        display_name: "Collaboration",
        source: PillarSource::RosterAggregate {
            score_field: "collaboration",
        },
    },
    PillarDef {
        id: "self_awareness",
        display_name: "Self Awareness",
        source: PillarSource::RosterAggregate {
            score_field: "self_awareness",
        },
    },
    PillarDef {
        id: "digital_literacy",
        display_name: "Digital Literacy",
        source: PillarSource::RosterAggregate {
            score_field: "digital_literacy",
        },
    },
    PillarDef {
        id: "financial_literacy",
        display_name: "Financial Literacy",
        source: PillarSource::RosterAggregate {
            score_field: "financial_literacy",
        },
    },
    PillarDef {
        id: "career_exploration",
        display_name: "Career Exploration",
        source: PillarSource::ActivityCoverage {
            activity_kind: "career_exploration",
        },
    },
    PillarDef {
        id: "stem_exposure",
        display_name: "STEM Exposure",
        source: PillarSource::ActivityCoverage {
            activity_kind: "stem_exposure",
        },
    },
    PillarDef {
        id: "entrepreneurship",
        display_name: "Entrepreneurship",
        source: PillarSource::ActivityCoverage {
            activity_kind: "entrepreneurship",
        },
    },
    PillarDef {
        id: "workplace_skills",
        display_name: "Workplace Skills",
        source: PillarSource::ActivityCoverage {
            activity_kind: "workplace_skills",
        },
    },
    PillarDef {
        id: "higher_ed_awareness",
        display_name: "Higher Education Awareness",
        source: PillarSource::ActivityCoverage {
            activity_kind: "higher_ed_awareness",
        },
    },
];

/// Look up a pillar definition by id
pub fn pillar_by_id(id: &str) -> Option<&'static PillarDef> {
    PILLARS.iter().find(|p| p.id == id)
}

/// Classify a 0–100 score into an exposure level.
///
/// Thresholds: ≤33 low, ≤66 medium, above that high. A missing or NaN score
/// is `NoData`, not `Low`; absence of data is not evidence of low exposure.
pub fn classify(score: Option<f64>) -> PillarLevel {
    match score {
        None => PillarLevel::NoData,
        Some(s) if s.is_nan() => PillarLevel::NoData,
        Some(s) if s <= 33.0 => PillarLevel::Low,
        Some(s) if s <= 66.0 => PillarLevel::Medium,
        Some(_) => PillarLevel::High,
    }
}
