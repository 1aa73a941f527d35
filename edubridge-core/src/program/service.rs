//! Program lifecycle business logic
//!
//! Owns program creation, school assignment, and the status transitions that
//! are not driven by checkpoints. Checkpoint-driven transitions live in
//! [`crate::checkpoint::CheckpointMachine`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::types::{
    Partner, Program, ProgramDraft, ProgramId, ProgramPatch, ProgramStatus, PublishedReport,
    RollupCounters, SchoolAssignment, SchoolStatus,
};
use crate::checkpoint::Checkpoint;
use crate::config::EngineConfig;
use crate::error::{CoreResult, DomainError};
use crate::events::{dispatch_best_effort, Notifier, ProgramEvent};
use crate::metrics::{self, ComputedBy, MetricsSnapshot, ProgramMetrics};
use crate::store::{DataStore, RosterSource, SchoolFilter};

/// Result of a bulk school-assignment call.
///
/// Partial success is success: already-assigned schools are counted in
/// `skipped`, not reported as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assigned: u32,
    pub skipped: u32,
}

/// Service owning program-level lifecycle operations
pub struct ProgramService<S: DataStore, R: RosterSource> {
    store: Arc<S>,
    roster: Arc<R>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S: DataStore, R: RosterSource> ProgramService<S, R> {
    pub fn new(
        store: Arc<S>,
        roster: Arc<R>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            roster,
            notifier,
            config,
        }
    }

    async fn load_program(&self, program_id: ProgramId) -> CoreResult<Program> {
        self.store
            .get_program(program_id)
            .await?
            .ok_or_else(|| DomainError::program_not_found(program_id))
    }

    /// Validate the sponsoring partner for program creation.
    ///
    /// Account approval and business activity are independent flags and one
    /// can lag the other; both must hold.
    async fn validate_partner(&self, partner_id: &str) -> CoreResult<Partner> {
        let partner = self
            .store
            .get_partner(partner_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "Partner",
                id: partner_id.to_string(),
            })?;
        if !partner.account_approved {
            return Err(DomainError::Validation(format!(
                "partner {partner_id} is not approved"
            )));
        }
        if !partner.business_active {
            return Err(DomainError::Validation(format!(
                "partner {partner_id} is not active"
            )));
        }
        Ok(partner)
    }

    /// Create a program in `draft`, with its five pending checkpoints and an
    /// empty metrics rollup.
    pub async fn create(&self, actor_id: &str, draft: ProgramDraft) -> CoreResult<Program> {
        if draft.name.trim().is_empty() {
            return Err(DomainError::Validation("program name is required".into()));
        }
        if !draft.window.is_valid() {
            return Err(DomainError::Validation(
                "program window must start before it ends".into(),
            ));
        }
        self.validate_partner(&draft.partner_id).await?;

        let now = Utc::now();
        let program = Program {
            id: Uuid::new_v4(),
            name: draft.name,
            partner_id: draft.partner_id,
            scope: draft.scope,
            window: draft.window,
            status: ProgramStatus::Draft,
            counters: RollupCounters::default(),
            published_reports: vec![],
            created_by: actor_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_program(&program).await?;
        for checkpoint in Checkpoint::initial_set(program.id) {
            self.store.insert_checkpoint(&checkpoint).await?;
        }
        self.store
            .put_metrics(&ProgramMetrics::empty(program.id))
            .await?;

        info!(program_id = %program.id, "program created");
        if self.config.notifications.enabled && self.config.notifications.notify_created {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::ProgramCreated {
                    program_id: program.id,
                    partner_id: program.partner_id.clone(),
                },
            )
            .await;
        }

        Ok(program)
    }

    /// Update an editable program. Allowed only in draft/approved; partner
    /// reassignment is rejected at the type level ([`ProgramPatch`] cannot
    /// express it).
    pub async fn update(&self, program_id: ProgramId, patch: ProgramPatch) -> CoreResult<Program> {
        let mut program = self.load_program(program_id).await?;
        if !program.status.is_editable() {
            return Err(DomainError::InvalidState(format!(
                "program is {} and can no longer be edited",
                program.status.as_str()
            )));
        }

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::Validation("program name is required".into()));
            }
            program.name = name;
        }
        if let Some(scope) = patch.scope {
            program.scope = scope;
        }
        if let Some(window) = patch.window {
            if !window.is_valid() {
                return Err(DomainError::Validation(
                    "program window must start before it ends".into(),
                ));
            }
            program.window = window;
        }
        program.updated_at = Utc::now();
        self.store.update_program(&program).await?;
        Ok(program)
    }

    /// Assign schools to a program. Duplicates are skipped; the denormalized
    /// counters are recomputed from the join rows afterwards.
    pub async fn assign_schools(
        &self,
        program_id: ProgramId,
        school_ids: &[String],
        _actor_id: &str,
    ) -> CoreResult<AssignmentOutcome> {
        if school_ids.is_empty() {
            return Err(DomainError::Validation(
                "at least one school id is required".into(),
            ));
        }
        self.load_program(program_id).await?;

        let organizations = self.roster.organizations_for(school_ids).await?;
        let roster_sizes: std::collections::HashMap<&str, u64> = organizations
            .iter()
            .map(|org| (org.school_id.as_str(), org.roster_size))
            .collect();

        let mut outcome = AssignmentOutcome {
            assigned: 0,
            skipped: 0,
        };
        for school_id in school_ids {
            let students_covered = roster_sizes.get(school_id.as_str()).copied().unwrap_or(0);
            let assignment = SchoolAssignment::new(program_id, school_id.clone(), students_covered);
            if self.store.insert_assignment(&assignment).await? {
                outcome.assigned += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        self.refresh_counters(program_id).await?;

        if self.config.notifications.enabled {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::SchoolsAssigned {
                    program_id,
                    assigned: outcome.assigned,
                    skipped: outcome.skipped,
                },
            )
            .await;
        }
        Ok(outcome)
    }

    /// Assign every school matching a geography filter
    pub async fn assign_schools_by_filter(
        &self,
        program_id: ProgramId,
        filter: &SchoolFilter,
        actor_id: &str,
    ) -> CoreResult<AssignmentOutcome> {
        let school_ids = self.roster.schools_matching(filter).await?;
        if school_ids.is_empty() {
            return Ok(AssignmentOutcome {
                assigned: 0,
                skipped: 0,
            });
        }
        self.assign_schools(program_id, &school_ids, actor_id).await
    }

    /// Move an assigned school to a new implementation status
    pub async fn update_school_status(
        &self,
        program_id: ProgramId,
        school_id: &str,
        status: SchoolStatus,
    ) -> CoreResult<SchoolAssignment> {
        self.load_program(program_id).await?;
        let mut assignment = self
            .store
            .get_assignment(program_id, school_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "SchoolAssignment",
                id: format!("{program_id}/{school_id}"),
            })?;
        assignment.set_status(status, Utc::now());
        self.store.update_assignment(&assignment).await?;
        Ok(assignment)
    }

    /// Recompute-and-overwrite the denormalized rollup counters from the
    /// authoritative join rows. Never incrementally patched; an extra
    /// aggregate query per mutation buys freedom from drift.
    async fn refresh_counters(&self, program_id: ProgramId) -> CoreResult<()> {
        let assignments = self.store.assignments_for(program_id).await?;
        let mut program = self.load_program(program_id).await?;
        program.counters = RollupCounters {
            schools_implemented: assignments.len() as u32,
            students_onboarded: assignments.iter().map(|a| a.students_covered).sum(),
        };
        program.updated_at = Utc::now();
        self.store.update_program(&program).await?;
        Ok(())
    }

    /// Admin override for program status. Accepts only the fixed enum and
    /// deliberately skips checkpoint-consistency validation; this is the
    /// escape hatch alongside the checkpoint-driven transitions.
    pub async fn update_status(
        &self,
        program_id: ProgramId,
        status: ProgramStatus,
        _actor_id: &str,
    ) -> CoreResult<Program> {
        let mut program = self.load_program(program_id).await?;
        program.status = status;
        program.updated_at = Utc::now();
        self.store.update_program(&program).await?;

        if self.config.notifications.enabled {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::StatusChanged { program_id, status },
            )
            .await;
        }
        Ok(program)
    }

    /// Soft archive: status moves to `completed`, reversible via
    /// [`Self::update_status`].
    pub async fn archive(&self, program_id: ProgramId, actor_id: &str) -> CoreResult<Program> {
        self.update_status(program_id, ProgramStatus::Completed, actor_id)
            .await
    }

    /// Permanently delete a program, cascading to its child rows first
    /// (assignments, metrics, checkpoints, then the program itself) so no
    /// orphaned child can outlive the parent.
    pub async fn delete_permanent(&self, program_id: ProgramId) -> CoreResult<()> {
        self.load_program(program_id).await?;
        self.store.delete_assignments(program_id).await?;
        self.store.delete_metrics(program_id).await?;
        self.store.delete_checkpoints(program_id).await?;
        self.store.delete_program(program_id).await?;
        info!(%program_id, "program permanently deleted");
        Ok(())
    }

    /// Manually recompute and store the program's metrics rollup
    pub async fn refresh_metrics(
        &self,
        program_id: ProgramId,
        _actor_id: &str,
    ) -> CoreResult<MetricsSnapshot> {
        let snapshot = metrics::compute_for_program(
            &*self.store,
            &*self.roster,
            program_id,
            ComputedBy::Manual,
        )
        .await?;
        let snapshot = metrics::store_snapshot(&*self.store, program_id, snapshot).await?;

        if self.config.notifications.enabled {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::MetricsRefreshed {
                    program_id,
                    computed_by: ComputedBy::Manual,
                },
            )
            .await;
        }
        Ok(snapshot)
    }

    /// Append a published-report record to the program
    pub async fn record_published_report(
        &self,
        program_id: ProgramId,
        report_type: &str,
        actor_id: &str,
    ) -> CoreResult<Program> {
        let mut program = self.load_program(program_id).await?;
        program.published_reports.push(PublishedReport {
            report_type: report_type.to_string(),
            published_at: Utc::now(),
            published_by: actor_id.to_string(),
        });
        program.updated_at = Utc::now();
        self.store.update_program(&program).await?;

        if self.config.notifications.enabled {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::ReportPublished {
                    program_id,
                    report_type: report_type.to_string(),
                },
            )
            .await;
        }
        Ok(program)
    }

    /// Programs owned by a sponsoring partner (sponsor-facing listing)
    pub async fn list_for_partner(&self, partner_id: &str) -> CoreResult<Vec<Program>> {
        Ok(self.store.list_partner_programs(partner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::RecordingNotifier;
    use crate::program::{DurationWindow, GeographicScope};
    use crate::store::{MemoryRoster, MemoryStore, SchoolOrganization};

    fn window() -> DurationWindow {
        let now = Utc::now();
        DurationWindow {
            starts_on: now,
            ends_on: now + chrono::Duration::days(90),
        }
    }

    fn draft(partner_id: &str) -> ProgramDraft {
        ProgramDraft {
            name: "Career Launch".into(),
            partner_id: partner_id.into(),
            scope: GeographicScope::default(),
            window: window(),
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        roster: Arc<MemoryRoster>,
        notifier: Arc<RecordingNotifier>,
        service: ProgramService<MemoryStore, MemoryRoster>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let roster = Arc::new(MemoryRoster::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = ProgramService::new(
            store.clone(),
            roster.clone(),
            notifier.clone(),
            EngineConfig::default(),
        );
        store
            .put_partner(Partner {
                id: "partner-1".into(),
                name: "Acme CSR".into(),
                account_approved: true,
                business_active: true,
                sponsor_contact_id: "sponsor-1".into(),
            })
            .await;
        for (id, size) in [("sch-1", 50u64), ("sch-2", 70)] {
            roster
                .put_organization(SchoolOrganization {
                    school_id: id.into(),
                    name: id.to_uppercase(),
                    city: Some("Pune".into()),
                    district: None,
                    roster_size: size,
                })
                .await;
        }
        Fixture {
            store,
            roster,
            notifier,
            service,
        }
    }

    #[tokio::test]
    async fn create_sets_up_checkpoints_and_empty_metrics() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        assert_eq!(program.status, ProgramStatus::Draft);
        let checkpoints = f.store.checkpoints_for(program.id).await.unwrap();
        assert_eq!(checkpoints.len(), 5);
        assert!(checkpoints
            .iter()
            .all(|c| c.status == crate::checkpoint::CheckpointStatus::Pending));

        let metrics = f.store.get_metrics(program.id).await.unwrap().unwrap();
        assert!(metrics.snapshot.computed_at.is_none());

        let events = f.notifier.recorded().await;
        assert!(matches!(
            events.as_slice(),
            [ProgramEvent::ProgramCreated { .. }]
        ));
    }

    #[tokio::test]
    async fn create_rejects_unapproved_partner() {
        let f = fixture().await;
        f.store
            .put_partner(Partner {
                id: "partner-2".into(),
                name: "Pending Corp".into(),
                account_approved: false,
                business_active: true,
                sponsor_contact_id: "sponsor-2".into(),
            })
            .await;

        let err = f.service.create("admin-1", draft("partner-2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("not approved"));
    }

    #[tokio::test]
    async fn create_rejects_inactive_partner() {
        let f = fixture().await;
        f.store
            .put_partner(Partner {
                id: "partner-3".into(),
                name: "Dormant Corp".into(),
                account_approved: true,
                business_active: false,
                sponsor_contact_id: "sponsor-3".into(),
            })
            .await;

        let err = f.service.create("admin-1", draft("partner-3")).await.unwrap_err();
        assert!(err.to_string().contains("not active"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_partner() {
        let f = fixture().await;
        let err = f.service.create("admin-1", draft("nobody")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn assign_schools_sets_covered_counts_and_counters() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        let outcome = f
            .service
            .assign_schools(
                program.id,
                &["sch-1".to_string(), "sch-2".to_string()],
                "admin-1",
            )
            .await
            .unwrap();
        assert_eq!(outcome, AssignmentOutcome { assigned: 2, skipped: 0 });

        let stored = f.store.get_program(program.id).await.unwrap().unwrap();
        assert_eq!(stored.counters.schools_implemented, 2);
        assert_eq!(stored.counters.students_onboarded, 120);
    }

    #[tokio::test]
    async fn duplicate_assignment_is_skipped_not_fatal() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        f.service
            .assign_schools(program.id, &["sch-1".to_string()], "admin-1")
            .await
            .unwrap();
        let outcome = f
            .service
            .assign_schools(
                program.id,
                &["sch-1".to_string(), "sch-2".to_string()],
                "admin-1",
            )
            .await
            .unwrap();
        assert_eq!(outcome, AssignmentOutcome { assigned: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn assign_empty_list_is_a_validation_error() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        let err = f
            .service
            .assign_schools(program.id, &[], "admin-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn assign_by_filter_resolves_school_set() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        let outcome = f
            .service
            .assign_schools_by_filter(
                program.id,
                &SchoolFilter {
                    city: Some("Pune".into()),
                    district: None,
                },
                "admin-1",
            )
            .await
            .unwrap();
        assert_eq!(outcome.assigned, 2);

        let no_match = f
            .service
            .assign_schools_by_filter(
                program.id,
                &SchoolFilter {
                    city: Some("Nagpur".into()),
                    district: None,
                },
                "admin-1",
            )
            .await
            .unwrap();
        assert_eq!(no_match, AssignmentOutcome { assigned: 0, skipped: 0 });
    }

    #[tokio::test]
    async fn update_is_rejected_after_implementation_starts() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        f.service
            .update_status(program.id, ProgramStatus::ImplementationInProgress, "admin-1")
            .await
            .unwrap();

        let err = f
            .service
            .update(
                program.id,
                ProgramPatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("can no longer be edited"));
    }

    #[tokio::test]
    async fn update_applies_patch_while_editable() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        let updated = f
            .service
            .update(
                program.id,
                ProgramPatch {
                    name: Some("Career Launch v2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Career Launch v2");
        assert_eq!(updated.partner_id, "partner-1");
    }

    #[tokio::test]
    async fn school_status_update_stamps_timestamps() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        f.service
            .assign_schools(program.id, &["sch-1".to_string()], "admin-1")
            .await
            .unwrap();

        let assignment = f
            .service
            .update_school_status(program.id, "sch-1", SchoolStatus::Active)
            .await
            .unwrap();
        assert_eq!(assignment.status, SchoolStatus::Active);
        assert!(assignment.activated_at.is_some());
    }

    #[tokio::test]
    async fn delete_permanent_cascades_to_children() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        f.service
            .assign_schools(
                program.id,
                &["sch-1".to_string(), "sch-2".to_string()],
                "admin-1",
            )
            .await
            .unwrap();

        f.service.delete_permanent(program.id).await.unwrap();

        assert!(f.store.get_program(program.id).await.unwrap().is_none());
        assert!(f.store.assignments_for(program.id).await.unwrap().is_empty());
        assert!(f.store.checkpoints_for(program.id).await.unwrap().is_empty());
        assert!(f.store.get_metrics(program.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_metrics_records_manual_provenance() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();
        f.service
            .assign_schools(program.id, &["sch-1".to_string()], "admin-1")
            .await
            .unwrap();

        let snapshot = f.service.refresh_metrics(program.id, "admin-1").await.unwrap();
        assert_eq!(snapshot.computed_by, ComputedBy::Manual);
        assert_eq!(snapshot.reach.students_onboarded, 50);

        let stored = f.store.get_metrics(program.id).await.unwrap().unwrap();
        assert_eq!(stored.snapshot, snapshot);
    }

    #[tokio::test]
    async fn archive_is_soft_and_reversible() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        let archived = f.service.archive(program.id, "admin-1").await.unwrap();
        assert_eq!(archived.status, ProgramStatus::Completed);

        let restored = f
            .service
            .update_status(program.id, ProgramStatus::Draft, "admin-1")
            .await
            .unwrap();
        assert_eq!(restored.status, ProgramStatus::Draft);
    }

    #[tokio::test]
    async fn published_reports_accumulate() {
        let f = fixture().await;
        let program = f.service.create("admin-1", draft("partner-1")).await.unwrap();

        f.service
            .record_published_report(program.id, "impact_summary", "admin-1")
            .await
            .unwrap();
        let program = f
            .service
            .record_published_report(program.id, "quarterly", "admin-1")
            .await
            .unwrap();
        assert_eq!(program.published_reports.len(), 2);
        assert_eq!(program.published_reports[0].report_type, "impact_summary");
    }

    #[tokio::test]
    async fn list_for_partner_filters_ownership() {
        let f = fixture().await;
        f.service.create("admin-1", draft("partner-1")).await.unwrap();
        assert_eq!(f.service.list_for_partner("partner-1").await.unwrap().len(), 1);
        assert!(f.service.list_for_partner("other").await.unwrap().is_empty());
    }
}
