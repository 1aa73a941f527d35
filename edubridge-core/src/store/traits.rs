//! Persistence seams
//!
//! The engine talks to storage through two traits: [`DataStore`] for the five
//! entity collections it owns, and [`RosterSource`] for the external
//! student/activity records it only ever reads. Both are object-safe so
//! embedders can hand in whatever backend they run on.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, CheckpointStatus};
use crate::error::StoreError;
use crate::metrics::ProgramMetrics;
use crate::program::{Partner, Program, ProgramId, SchoolAssignment};

/// CRUD and aggregation over the engine-owned collections
#[async_trait]
pub trait DataStore: Send + Sync {
    // ===== Programs =====

    async fn insert_program(&self, program: &Program) -> Result<(), StoreError>;

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StoreError>;

    async fn update_program(&self, program: &Program) -> Result<(), StoreError>;

    /// Remove the program row itself. Returns whether a row existed.
    async fn delete_program(&self, id: ProgramId) -> Result<bool, StoreError>;

    /// Programs owned by a sponsoring partner (sponsor-facing listing)
    async fn list_partner_programs(&self, partner_id: &str) -> Result<Vec<Program>, StoreError>;

    // ===== Partners =====

    async fn get_partner(&self, id: &str) -> Result<Option<Partner>, StoreError>;

    // ===== School assignments =====

    /// Insert an assignment row. Returns `false` (without error) when the
    /// (program, school) pair already exists; duplicate assignment is
    /// skipped, not fatal.
    async fn insert_assignment(&self, assignment: &SchoolAssignment) -> Result<bool, StoreError>;

    async fn update_assignment(&self, assignment: &SchoolAssignment) -> Result<(), StoreError>;

    async fn get_assignment(
        &self,
        program_id: ProgramId,
        school_id: &str,
    ) -> Result<Option<SchoolAssignment>, StoreError>;

    async fn assignments_for(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<SchoolAssignment>, StoreError>;

    /// Delete all assignment rows for a program; returns rows removed
    async fn delete_assignments(&self, program_id: ProgramId) -> Result<u64, StoreError>;

    // ===== Checkpoints =====

    async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    async fn get_checkpoint(
        &self,
        program_id: ProgramId,
        number: u8,
    ) -> Result<Option<Checkpoint>, StoreError>;

    /// All checkpoints for a program, ordered by number
    async fn checkpoints_for(&self, program_id: ProgramId) -> Result<Vec<Checkpoint>, StoreError>;

    /// Compare-and-swap write of a checkpoint row.
    ///
    /// The row is written only if the stored status still equals `expected`;
    /// returns whether the write happened. This is the check-then-write
    /// primitive that keeps two concurrent triggers/acknowledgments from both
    /// succeeding.
    async fn update_checkpoint_if(
        &self,
        checkpoint: &Checkpoint,
        expected: CheckpointStatus,
    ) -> Result<bool, StoreError>;

    /// Patch only the notes fields of a checkpoint row.
    ///
    /// `None` leaves a field untouched. Status, snapshot, and timestamps are
    /// never written through this path, so a notes edit racing a transition
    /// cannot roll the row back. Returns the updated row, or `None` when the
    /// checkpoint does not exist.
    async fn update_checkpoint_notes(
        &self,
        program_id: ProgramId,
        number: u8,
        admin_notes: Option<String>,
        sponsor_notes: Option<String>,
    ) -> Result<Option<Checkpoint>, StoreError>;

    /// Delete all checkpoint rows for a program; returns rows removed
    async fn delete_checkpoints(&self, program_id: ProgramId) -> Result<u64, StoreError>;

    // ===== Metrics =====

    /// Overwrite (not append) the stored rollup
    async fn put_metrics(&self, metrics: &ProgramMetrics) -> Result<(), StoreError>;

    async fn get_metrics(&self, program_id: ProgramId)
    -> Result<Option<ProgramMetrics>, StoreError>;

    async fn delete_metrics(&self, program_id: ProgramId) -> Result<bool, StoreError>;
}

/// A student row from the external roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub school_id: String,
    /// Attendance/participation flag used for engagement
    pub active: bool,
    /// Whether the student completed the program curriculum
    pub completed: bool,
    pub certificates_delivered: u32,
    pub kits_in_progress: u32,
    /// Per-pillar sub-scores (0–100), keyed by score field name
    #[serde(default)]
    pub scores: HashMap<String, f64>,
}

impl StudentRecord {
    /// Minimal active student, for fixtures
    pub fn new(id: impl Into<String>, school_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            school_id: school_id.into(),
            active: true,
            completed: false,
            certificates_delivered: 0,
            kits_in_progress: 0,
            scores: HashMap::new(),
        }
    }
}

/// A game/activity progress row from the external source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub student_id: String,
    pub school_id: String,
    /// Activity kind matched against pillar coverage definitions
    pub kind: String,
    /// Badge earned in this activity, if any
    pub badge: Option<String>,
}

/// Resolved organization record for a school
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolOrganization {
    pub school_id: String,
    pub name: String,
    pub city: Option<String>,
    pub district: Option<String>,
    /// Declared roster size, used for `students_covered` at assignment time
    pub roster_size: u64,
}

/// Filter for bulk school selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchoolFilter {
    pub city: Option<String>,
    pub district: Option<String>,
}

/// Read-only queries over external roster/activity data
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Students enrolled at any of the given schools
    async fn students_for(&self, school_ids: &[String]) -> Result<Vec<StudentRecord>, StoreError>;

    /// Activity records for students at any of the given schools
    async fn activities_for(&self, school_ids: &[String])
    -> Result<Vec<ActivityRecord>, StoreError>;

    /// Organization records for the given schools (missing ones are skipped)
    async fn organizations_for(
        &self,
        school_ids: &[String],
    ) -> Result<Vec<SchoolOrganization>, StoreError>;

    /// School ids matching a geography filter
    async fn schools_matching(&self, filter: &SchoolFilter) -> Result<Vec<String>, StoreError>;
}
