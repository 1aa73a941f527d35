//! Checkpoint state machine
//!
//! Enforces the ordered pending → ready → completed progression across a
//! program's five checkpoints and captures a metrics snapshot at the moment a
//! checkpoint becomes actionable. All transitions re-validate status through
//! the store's compare-and-swap write, so two concurrent triggers or
//! acknowledgments cannot both succeed.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::types::{
    Checkpoint, CheckpointOverview, CheckpointStatus, TriggerCheck, CHECKPOINT_COUNT,
};
use crate::config::EngineConfig;
use crate::error::{CoreResult, DomainError};
use crate::events::{dispatch_best_effort, Notifier, ProgramEvent};
use crate::metrics::{self, ComputedBy};
use crate::program::{Program, ProgramId};
use crate::store::{DataStore, RosterSource};

/// Drives checkpoint transitions for programs
pub struct CheckpointMachine<S: DataStore, R: RosterSource> {
    store: Arc<S>,
    roster: Arc<R>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S: DataStore, R: RosterSource> CheckpointMachine<S, R> {
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

    async fn load_checkpoint(&self, program_id: ProgramId, number: u8) -> CoreResult<Checkpoint> {
        self.store
            .get_checkpoint(program_id, number)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "Checkpoint",
                id: format!("{program_id}#{number}"),
            })
    }

    /// Check whether a checkpoint can be triggered, without side effects.
    ///
    /// Ordering violations come back as a blocked result with a reason, not
    /// as an error; missing program/checkpoint rows are not-found errors.
    pub async fn can_trigger(
        &self,
        program_id: ProgramId,
        number: u8,
    ) -> CoreResult<TriggerCheck> {
        if !(1..=CHECKPOINT_COUNT).contains(&number) {
            return Err(DomainError::Validation(format!(
                "checkpoint number must be 1–{CHECKPOINT_COUNT}, got {number}"
            )));
        }
        self.load_program(program_id).await?;
        let checkpoint = self.load_checkpoint(program_id, number).await?;

        if checkpoint.status != CheckpointStatus::Pending {
            return Ok(TriggerCheck::blocked(format!(
                "Checkpoint {number} is already {}",
                checkpoint.status.as_str()
            )));
        }

        // Checkpoint 1 has no predecessor constraint
        if number > 1 {
            let predecessor = self.load_checkpoint(program_id, number - 1).await?;
            if predecessor.status != CheckpointStatus::Completed {
                return Ok(TriggerCheck::blocked(format!(
                    "Checkpoint {} must be completed first",
                    number - 1
                )));
            }
        }

        Ok(TriggerCheck::allowed())
    }

    /// Move a checkpoint from `pending` to `ready`, capturing a fresh metrics
    /// snapshot and notifying the program's sponsor (best-effort).
    pub async fn trigger(
        &self,
        program_id: ProgramId,
        number: u8,
        actor_id: &str,
    ) -> CoreResult<Checkpoint> {
        let check = self.can_trigger(program_id, number).await?;
        if !check.allowed {
            let reason = check.reason.unwrap_or_else(|| "trigger not allowed".into());
            return Err(DomainError::InvalidState(reason));
        }

        let snapshot =
            metrics::compute_for_program(&*self.store, &*self.roster, program_id, ComputedBy::System)
                .await?;

        let mut checkpoint = self.load_checkpoint(program_id, number).await?;
        checkpoint.status = CheckpointStatus::Ready;
        checkpoint.triggered_by = Some(actor_id.to_string());
        checkpoint.triggered_at = Some(Utc::now());
        checkpoint.snapshot = Some(snapshot.clone());

        // Status may have moved since can_trigger; the CAS is authoritative
        let written = self
            .store
            .update_checkpoint_if(&checkpoint, CheckpointStatus::Pending)
            .await?;
        if !written {
            return Err(DomainError::InvalidState(format!(
                "Checkpoint {number} was modified concurrently"
            )));
        }

        // The freshly captured snapshot is also the program's current rollup
        metrics::store_snapshot(&*self.store, program_id, snapshot).await?;

        info!(%program_id, number, "checkpoint triggered");
        if self.config.notifications.enabled && self.config.notifications.notify_checkpoint_ready {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::CheckpointReady {
                    program_id,
                    number,
                    kind: checkpoint.kind,
                    triggered_by: actor_id.to_string(),
                },
            )
            .await;
        }

        Ok(checkpoint)
    }

    /// Acknowledge a `ready` checkpoint as the program's sponsor contact,
    /// completing it and advancing the program-level status where the
    /// checkpoint kind maps to one.
    pub async fn acknowledge(
        &self,
        program_id: ProgramId,
        number: u8,
        actor_id: &str,
    ) -> CoreResult<Checkpoint> {
        let mut program = self.load_program(program_id).await?;
        let partner = self
            .store
            .get_partner(&program.partner_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "Partner",
                id: program.partner_id.clone(),
            })?;
        if partner.sponsor_contact_id != actor_id {
            return Err(DomainError::Unauthorized(format!(
                "{actor_id} is not the sponsor contact for this program"
            )));
        }

        let mut checkpoint = self.load_checkpoint(program_id, number).await?;
        if checkpoint.status != CheckpointStatus::Ready {
            return Err(DomainError::InvalidState(format!(
                "Checkpoint {number} is {}, expected ready",
                checkpoint.status.as_str()
            )));
        }

        // Defense in depth: even a ready checkpoint may not complete out of
        // order. The trigger-time ordering check should make this
        // unreachable.
        for earlier in self
            .store
            .checkpoints_for(program_id)
            .await?
            .iter()
            .filter(|c| c.number < number)
        {
            if earlier.status != CheckpointStatus::Completed {
                return Err(DomainError::InvalidState(format!(
                    "Checkpoint {} must be completed first",
                    earlier.number
                )));
            }
        }

        checkpoint.status = CheckpointStatus::Completed;
        checkpoint.acknowledged_by = Some(actor_id.to_string());
        checkpoint.acknowledged_at = Some(Utc::now());

        let written = self
            .store
            .update_checkpoint_if(&checkpoint, CheckpointStatus::Ready)
            .await?;
        if !written {
            return Err(DomainError::InvalidState(format!(
                "Checkpoint {number} was modified concurrently"
            )));
        }

        if let Some(status) = checkpoint.kind.program_status_on_completion() {
            program.status = status;
            program.updated_at = Utc::now();
            self.store.update_program(&program).await?;
        }

        info!(%program_id, number, "checkpoint acknowledged");
        if self.config.notifications.enabled
            && self.config.notifications.notify_checkpoint_completed
        {
            dispatch_best_effort(
                &*self.notifier,
                ProgramEvent::CheckpointCompleted {
                    program_id,
                    number,
                    kind: checkpoint.kind,
                    acknowledged_by: actor_id.to_string(),
                },
            )
            .await;
        }

        Ok(checkpoint)
    }

    /// Read-only overview of a program's checkpoints, derived entirely from
    /// the stored rows.
    pub async fn status(&self, program_id: ProgramId) -> CoreResult<CheckpointOverview> {
        self.load_program(program_id).await?;
        let checkpoints = self.store.checkpoints_for(program_id).await?;
        Ok(CheckpointOverview::derive(checkpoints))
    }

    /// Update the free-text notes on a checkpoint (any status).
    ///
    /// Goes through the store's notes-only patch rather than a full-row
    /// write, so a concurrent trigger or acknowledgment can never be undone
    /// by a notes edit.
    pub async fn update_notes(
        &self,
        program_id: ProgramId,
        number: u8,
        admin_notes: Option<String>,
        sponsor_notes: Option<String>,
    ) -> CoreResult<Checkpoint> {
        self.load_program(program_id).await?;
        self.store
            .update_checkpoint_notes(program_id, number, admin_notes, sponsor_notes)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "Checkpoint",
                id: format!("{program_id}#{number}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::RecordingNotifier;
    use crate::metrics::{MetricsSnapshot, ProgramMetrics};
    use crate::program::{
        DurationWindow, GeographicScope, Partner, ProgramStatus, RollupCounters, SchoolAssignment,
    };
    use crate::store::{MemoryRoster, MemoryStore, StudentRecord};
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        roster: Arc<MemoryRoster>,
        notifier: Arc<RecordingNotifier>,
        machine: CheckpointMachine<MemoryStore, MemoryRoster>,
        program_id: ProgramId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let roster = Arc::new(MemoryRoster::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let machine = CheckpointMachine::new(
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

        let program_id = Uuid::new_v4();
        let now = Utc::now();
        let program = Program {
            id: program_id,
            name: "Readiness 2026".into(),
            partner_id: "partner-1".into(),
            scope: GeographicScope::default(),
            window: DurationWindow {
                starts_on: now,
                ends_on: now + chrono::Duration::days(180),
            },
            status: ProgramStatus::Draft,
            counters: RollupCounters::default(),
            published_reports: vec![],
            created_by: "admin-1".into(),
            created_at: now,
            updated_at: now,
        };
        store.insert_program(&program).await.unwrap();
        for checkpoint in Checkpoint::initial_set(program_id) {
            store.insert_checkpoint(&checkpoint).await.unwrap();
        }
        store
            .put_metrics(&ProgramMetrics::empty(program_id))
            .await
            .unwrap();
        store
            .insert_assignment(&SchoolAssignment::new(program_id, "sch-1", 120))
            .await
            .unwrap();

        Fixture {
            store,
            roster,
            notifier,
            machine,
            program_id,
        }
    }

    #[tokio::test]
    async fn trigger_first_checkpoint_captures_snapshot() {
        let f = fixture().await;

        let check = f.machine.can_trigger(f.program_id, 1).await.unwrap();
        assert!(check.allowed);

        let checkpoint = f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Ready);
        assert_eq!(checkpoint.triggered_by.as_deref(), Some("admin-1"));
        // Covered-sum fallback: no live roster, stored 120
        let snapshot = checkpoint.snapshot.unwrap();
        assert_eq!(snapshot.reach.students_onboarded, 120);

        // Stored rollup was overwritten with the same figures
        let stored = f.store.get_metrics(f.program_id).await.unwrap().unwrap();
        assert_eq!(stored.snapshot.reach.students_onboarded, 120);

        let events = f.notifier.recorded().await;
        assert!(matches!(
            events.as_slice(),
            [ProgramEvent::CheckpointReady { number: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn double_trigger_fails_and_keeps_snapshot() {
        let f = fixture().await;
        let first = f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();

        // Roster changes between the two calls
        f.roster.add_student(StudentRecord::new("st-1", "sch-1")).await;

        let err = f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let stored = f.store.get_checkpoint(f.program_id, 1).await.unwrap().unwrap();
        assert_eq!(stored.snapshot, first.snapshot);
    }

    #[tokio::test]
    async fn out_of_order_trigger_is_blocked_with_reason() {
        let f = fixture().await;

        let check = f.machine.can_trigger(f.program_id, 3).await.unwrap();
        assert!(!check.allowed);
        assert_eq!(
            check.reason.as_deref(),
            Some("Checkpoint 2 must be completed first")
        );

        let err = f.machine.trigger(f.program_id, 3, "admin-1").await.unwrap_err();
        assert!(err.to_string().contains("Checkpoint 2 must be completed first"));

        // No state change
        let stored = f.store.get_checkpoint(f.program_id, 3).await.unwrap().unwrap();
        assert_eq!(stored.status, CheckpointStatus::Pending);
    }

    #[tokio::test]
    async fn acknowledge_advances_program_status() {
        let f = fixture().await;
        f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();

        let checkpoint = f
            .machine
            .acknowledge(f.program_id, 1, "sponsor-1")
            .await
            .unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Completed);
        assert_eq!(checkpoint.acknowledged_by.as_deref(), Some("sponsor-1"));

        let program = f.store.get_program(f.program_id).await.unwrap().unwrap();
        assert_eq!(program.status, ProgramStatus::Approved);

        // Checkpoint 2 is not auto-readied
        let overview = f.machine.status(f.program_id).await.unwrap();
        assert_eq!(overview.completed_count, 1);
        assert_eq!(overview.current, None);
        assert_eq!(overview.next, Some(2));
    }

    #[tokio::test]
    async fn acknowledge_requires_sponsor_contact() {
        let f = fixture().await;
        f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();

        let err = f
            .machine
            .acknowledge(f.program_id, 1, "intruder")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn acknowledge_requires_ready_state() {
        let f = fixture().await;
        let err = f
            .machine
            .acknowledge(f.program_id, 1, "sponsor-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn acknowledge_out_of_order_fails_even_if_marked_ready() {
        let f = fixture().await;
        // Force checkpoint 3 to ready behind the machine's back
        let mut cp3 = f.store.get_checkpoint(f.program_id, 3).await.unwrap().unwrap();
        cp3.status = CheckpointStatus::Ready;
        assert!(f
            .store
            .update_checkpoint_if(&cp3, CheckpointStatus::Pending)
            .await
            .unwrap());

        let err = f
            .machine
            .acknowledge(f.program_id, 3, "sponsor-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be completed first"));
    }

    #[tokio::test]
    async fn extension_checkpoint_leaves_program_status_alone() {
        let f = fixture().await;
        for number in 1..=4 {
            f.machine.trigger(f.program_id, number, "admin-1").await.unwrap();
            f.machine
                .acknowledge(f.program_id, number, "sponsor-1")
                .await
                .unwrap();
        }
        f.machine.trigger(f.program_id, 5, "admin-1").await.unwrap();
        f.machine
            .acknowledge(f.program_id, 5, "sponsor-1")
            .await
            .unwrap();

        let program = f.store.get_program(f.program_id).await.unwrap().unwrap();
        // Checkpoint 4 set Completed; checkpoint 5 must not change it
        assert_eq!(program.status, ProgramStatus::Completed);

        let overview = f.machine.status(f.program_id).await.unwrap();
        assert_eq!(overview.completed_count, 5);
        assert_eq!(overview.next, None);
    }

    #[tokio::test]
    async fn trigger_missing_program_is_not_found() {
        let f = fixture().await;
        let err = f.machine.can_trigger(Uuid::new_v4(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_checkpoint_number_is_a_validation_error() {
        let f = fixture().await;
        let err = f.machine.can_trigger(f.program_id, 6).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn notes_update_does_not_touch_status() {
        let f = fixture().await;
        let checkpoint = f
            .machine
            .update_notes(f.program_id, 2, Some("kickoff scheduled".into()), None)
            .await
            .unwrap();
        assert_eq!(checkpoint.admin_notes.as_deref(), Some("kickoff scheduled"));
        assert_eq!(checkpoint.status, CheckpointStatus::Pending);
    }

    #[tokio::test]
    async fn notes_update_cannot_regress_a_ready_checkpoint() {
        let f = fixture().await;
        f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();

        let updated = f
            .machine
            .update_notes(f.program_id, 1, Some("reviewed on site".into()), None)
            .await
            .unwrap();
        assert_eq!(updated.status, CheckpointStatus::Ready);
        assert!(updated.snapshot.is_some());

        // Stored row keeps the transition fields the trigger wrote
        let stored = f
            .store
            .get_checkpoint(f.program_id, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CheckpointStatus::Ready);
        assert!(stored.snapshot.is_some());
        assert!(stored.triggered_at.is_some());
        assert_eq!(stored.admin_notes.as_deref(), Some("reviewed on site"));
    }

    #[tokio::test]
    async fn notes_update_missing_checkpoint_is_not_found() {
        let f = fixture().await;
        let err = f
            .machine
            .update_notes(f.program_id, 6, Some("stray".into()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_trigger() {
        let f = fixture().await;
        let machine = CheckpointMachine::new(
            f.store.clone(),
            f.roster.clone(),
            Arc::new(crate::events::FailingNotifier),
            EngineConfig::default(),
        );
        let checkpoint = machine.trigger(f.program_id, 1, "admin-1").await.unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Ready);
    }

    #[tokio::test]
    async fn empty_snapshot_on_trigger_uses_previous_rollup() {
        let f = fixture().await;
        // Seed the stored rollup with a known-good number and zero out the
        // assignment's covered count.
        let mut seeded = MetricsSnapshot::empty();
        seeded.reach.students_onboarded = 90;
        f.store
            .put_metrics(&ProgramMetrics {
                program_id: f.program_id,
                snapshot: seeded,
            })
            .await
            .unwrap();
        let mut assignment = f
            .store
            .get_assignment(f.program_id, "sch-1")
            .await
            .unwrap()
            .unwrap();
        assignment.students_covered = 0;
        f.store.update_assignment(&assignment).await.unwrap();

        let checkpoint = f.machine.trigger(f.program_id, 1, "admin-1").await.unwrap();
        assert_eq!(
            checkpoint.snapshot.unwrap().reach.students_onboarded,
            90
        );
    }
}
