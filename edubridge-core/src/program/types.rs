//! Core program types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a sponsored program
pub type ProgramId = Uuid;

/// Lifecycle status of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Draft,
    Approved,
    ImplementationInProgress,
    MidProgramReviewCompleted,
    Completed,
}

impl ProgramStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::ImplementationInProgress => "implementation_in_progress",
            Self::MidProgramReviewCompleted => "mid_program_review_completed",
            Self::Completed => "completed",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "implementation_in_progress" => Some(Self::ImplementationInProgress),
            "mid_program_review_completed" => Some(Self::MidProgramReviewCompleted),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether the program definition may still be edited.
    ///
    /// Once implementation starts, scope/dates/identity are frozen so that
    /// captured checkpoint snapshots and assigned-school data stay consistent
    /// with the program definition they were computed against.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Approved)
    }
}

/// Geography filter limiting which schools a program targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicScope {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub districts: Vec<String>,
}

/// Start/end window of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationWindow {
    pub starts_on: DateTime<Utc>,
    pub ends_on: DateTime<Utc>,
}

impl DurationWindow {
    pub fn is_valid(&self) -> bool {
        self.starts_on < self.ends_on
    }
}

/// A report published for this program (dashboard exports, sponsor documents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedReport {
    pub report_type: String,
    pub published_at: DateTime<Utc>,
    pub published_by: String,
}

/// Denormalized rollup counters mirrored from the assignment rows.
///
/// Always recomputed-and-overwritten after every assignment mutation, never
/// incrementally patched, so they cannot drift from the join rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupCounters {
    pub schools_implemented: u32,
    pub students_onboarded: u64,
}

/// A sponsored education program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    /// Sponsoring partner; immutable after creation
    pub partner_id: String,
    pub scope: GeographicScope,
    pub window: DurationWindow,
    pub status: ProgramStatus,
    pub counters: RollupCounters,
    pub published_reports: Vec<PublishedReport>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDraft {
    pub name: String,
    pub partner_id: String,
    #[serde(default)]
    pub scope: GeographicScope,
    pub window: DurationWindow,
}

/// Partial update to an editable program.
///
/// Partner reassignment is deliberately not expressible here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramPatch {
    pub name: Option<String>,
    pub scope: Option<GeographicScope>,
    pub window: Option<DurationWindow>,
}

/// Sponsoring corporate partner (read-only from the engine's perspective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    /// Account-level approval flag; can lag `business_active`
    pub account_approved: bool,
    /// Business-level active flag; can lag `account_approved`
    pub business_active: bool,
    /// User id of the sponsor contact authorized to acknowledge checkpoints
    pub sponsor_contact_id: String,
}

/// Implementation status of an assigned school
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolStatus {
    Pending,
    InProgress,
    Active,
    Completed,
}

impl SchoolStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Join row linking a program to an assigned school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolAssignment {
    pub program_id: ProgramId,
    pub school_id: String,
    /// Stored per-school student count; fallback when roster linkage is absent
    pub students_covered: u64,
    pub status: SchoolStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form per-school metrics recorded by field staff
    #[serde(default)]
    pub metrics: serde_json::Value,
}

impl SchoolAssignment {
    /// Create a pending assignment
    pub fn new(program_id: ProgramId, school_id: impl Into<String>, students_covered: u64) -> Self {
        Self {
            program_id,
            school_id: school_id.into(),
            students_covered,
            status: SchoolStatus::Pending,
            assigned_at: Utc::now(),
            started_at: None,
            activated_at: None,
            completed_at: None,
            metrics: serde_json::Value::Null,
        }
    }

    /// Move the assignment to a new implementation status, stamping the
    /// matching timestamp.
    pub fn set_status(&mut self, status: SchoolStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            SchoolStatus::Pending => {}
            SchoolStatus::InProgress => self.started_at = Some(at),
            SchoolStatus::Active => self.activated_at = Some(at),
            SchoolStatus::Completed => self.completed_at = Some(at),
        }
    }
}
