//! In-memory store implementations
//!
//! Used by tests and by embedders that have no persistent backend wired up
//! yet. All collections live behind a single `RwLock`, which gives each store
//! call the single-transaction-scope semantics the engine expects (the
//! compare-and-swap on checkpoints happens under the write lock).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{
    ActivityRecord, DataStore, RosterSource, SchoolFilter, SchoolOrganization, StudentRecord,
};
use crate::checkpoint::{Checkpoint, CheckpointStatus};
use crate::error::StoreError;
use crate::metrics::ProgramMetrics;
use crate::program::{Partner, Program, ProgramId, SchoolAssignment};

#[derive(Default)]
struct StoreInner {
    programs: HashMap<ProgramId, Program>,
    partners: HashMap<String, Partner>,
    assignments: HashMap<(ProgramId, String), SchoolAssignment>,
    checkpoints: HashMap<(ProgramId, u8), Checkpoint>,
    metrics: HashMap<ProgramId, ProgramMetrics>,
}

/// In-memory [`DataStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a partner row (partners are owned by an external admin surface)
    pub async fn put_partner(&self, partner: Partner) {
        self.inner
            .write()
            .await
            .partners
            .insert(partner.id.clone(), partner);
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn insert_program(&self, program: &Program) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .programs
            .insert(program.id, program.clone());
        Ok(())
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StoreError> {
        Ok(self.inner.read().await.programs.get(&id).cloned())
    }

    async fn update_program(&self, program: &Program) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .programs
            .insert(program.id, program.clone());
        Ok(())
    }

    async fn delete_program(&self, id: ProgramId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.programs.remove(&id).is_some())
    }

    async fn list_partner_programs(&self, partner_id: &str) -> Result<Vec<Program>, StoreError> {
        let inner = self.inner.read().await;
        let mut programs: Vec<Program> = inner
            .programs
            .values()
            .filter(|p| p.partner_id == partner_id)
            .cloned()
            .collect();
        programs.sort_by_key(|p| p.created_at);
        Ok(programs)
    }

    async fn get_partner(&self, id: &str) -> Result<Option<Partner>, StoreError> {
        Ok(self.inner.read().await.partners.get(id).cloned())
    }

    async fn insert_assignment(&self, assignment: &SchoolAssignment) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (assignment.program_id, assignment.school_id.clone());
        if inner.assignments.contains_key(&key) {
            return Ok(false);
        }
        inner.assignments.insert(key, assignment.clone());
        Ok(true)
    }

    async fn update_assignment(&self, assignment: &SchoolAssignment) -> Result<(), StoreError> {
        let key = (assignment.program_id, assignment.school_id.clone());
        self.inner
            .write()
            .await
            .assignments
            .insert(key, assignment.clone());
        Ok(())
    }

    async fn get_assignment(
        &self,
        program_id: ProgramId,
        school_id: &str,
    ) -> Result<Option<SchoolAssignment>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .assignments
            .get(&(program_id, school_id.to_string()))
            .cloned())
    }

    async fn assignments_for(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<SchoolAssignment>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SchoolAssignment> = inner
            .assignments
            .values()
            .filter(|a| a.program_id == program_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.school_id.cmp(&b.school_id));
        Ok(rows)
    }

    async fn delete_assignments(&self, program_id: ProgramId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.assignments.len();
        inner.assignments.retain(|(pid, _), _| *pid != program_id);
        Ok((before - inner.assignments.len()) as u64)
    }

    async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.inner.write().await.checkpoints.insert(
            (checkpoint.program_id, checkpoint.number),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        program_id: ProgramId,
        number: u8,
    ) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .checkpoints
            .get(&(program_id, number))
            .cloned())
    }

    async fn checkpoints_for(&self, program_id: ProgramId) -> Result<Vec<Checkpoint>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Checkpoint> = inner
            .checkpoints
            .values()
            .filter(|c| c.program_id == program_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.number);
        Ok(rows)
    }

    async fn update_checkpoint_if(
        &self,
        checkpoint: &Checkpoint,
        expected: CheckpointStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (checkpoint.program_id, checkpoint.number);
        match inner.checkpoints.get(&key) {
            Some(stored) if stored.status == expected => {
                inner.checkpoints.insert(key, checkpoint.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_checkpoint_notes(
        &self,
        program_id: ProgramId,
        number: u8,
        admin_notes: Option<String>,
        sponsor_notes: Option<String>,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.checkpoints.get_mut(&(program_id, number)) else {
            return Ok(None);
        };
        if let Some(notes) = admin_notes {
            stored.admin_notes = Some(notes);
        }
        if let Some(notes) = sponsor_notes {
            stored.sponsor_notes = Some(notes);
        }
        Ok(Some(stored.clone()))
    }

    async fn delete_checkpoints(&self, program_id: ProgramId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.checkpoints.len();
        inner.checkpoints.retain(|(pid, _), _| *pid != program_id);
        Ok((before - inner.checkpoints.len()) as u64)
    }

    async fn put_metrics(&self, metrics: &ProgramMetrics) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .metrics
            .insert(metrics.program_id, metrics.clone());
        Ok(())
    }

    async fn get_metrics(
        &self,
        program_id: ProgramId,
    ) -> Result<Option<ProgramMetrics>, StoreError> {
        Ok(self.inner.read().await.metrics.get(&program_id).cloned())
    }

    async fn delete_metrics(&self, program_id: ProgramId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.metrics.remove(&program_id).is_some())
    }
}

#[derive(Default)]
struct RosterInner {
    students: Vec<StudentRecord>,
    activities: Vec<ActivityRecord>,
    organizations: HashMap<String, SchoolOrganization>,
}

/// In-memory [`RosterSource`] with fixture helpers
#[derive(Default)]
pub struct MemoryRoster {
    inner: RwLock<RosterInner>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student(&self, student: StudentRecord) {
        self.inner.write().await.students.push(student);
    }

    pub async fn add_activity(&self, activity: ActivityRecord) {
        self.inner.write().await.activities.push(activity);
    }

    pub async fn put_organization(&self, organization: SchoolOrganization) {
        self.inner
            .write()
            .await
            .organizations
            .insert(organization.school_id.clone(), organization);
    }

    /// Drop all student rows (simulates a broken roster linkage)
    pub async fn clear_students(&self) {
        self.inner.write().await.students.clear();
    }
}

#[async_trait]
impl RosterSource for MemoryRoster {
    async fn students_for(&self, school_ids: &[String]) -> Result<Vec<StudentRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .iter()
            .filter(|s| school_ids.contains(&s.school_id))
            .cloned()
            .collect())
    }

    async fn activities_for(
        &self,
        school_ids: &[String],
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .activities
            .iter()
            .filter(|a| school_ids.contains(&a.school_id))
            .cloned()
            .collect())
    }

    async fn organizations_for(
        &self,
        school_ids: &[String],
    ) -> Result<Vec<SchoolOrganization>, StoreError> {
        let inner = self.inner.read().await;
        Ok(school_ids
            .iter()
            .filter_map(|id| inner.organizations.get(id).cloned())
            .collect())
    }

    async fn schools_matching(&self, filter: &SchoolFilter) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner
            .organizations
            .values()
            .filter(|org| {
                filter
                    .city
                    .as_ref()
                    .is_none_or(|city| org.city.as_deref() == Some(city.as_str()))
                    && filter
                        .district
                        .as_ref()
                        .is_none_or(|district| org.district.as_deref() == Some(district.as_str()))
            })
            .map(|org| org.school_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
