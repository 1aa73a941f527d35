//! Domain events and the notification seam
//!
//! State transitions emit [`ProgramEvent`]s; actual delivery (email, socket
//! push) lives behind [`Notifier`] and is strictly best-effort. A dispatch
//! failure is logged and swallowed; it must never fail the state transition
//! that produced the event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::checkpoint::CheckpointKind;
use crate::error::NotifyError;
use crate::metrics::ComputedBy;
use crate::program::{ProgramId, ProgramStatus};

/// Events emitted by the engine's state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgramEvent {
    /// A program was created for a sponsoring partner
    ProgramCreated {
        program_id: ProgramId,
        partner_id: String,
    },

    /// A checkpoint became ready and awaits sponsor acknowledgment
    CheckpointReady {
        program_id: ProgramId,
        number: u8,
        kind: CheckpointKind,
        triggered_by: String,
    },

    /// A checkpoint was acknowledged by the sponsor contact
    CheckpointCompleted {
        program_id: ProgramId,
        number: u8,
        kind: CheckpointKind,
        acknowledged_by: String,
    },

    /// Schools were assigned (partial success is success)
    SchoolsAssigned {
        program_id: ProgramId,
        assigned: u32,
        skipped: u32,
    },

    /// Program-level status changed
    StatusChanged {
        program_id: ProgramId,
        status: ProgramStatus,
    },

    /// Metrics were recomputed and stored
    MetricsRefreshed {
        program_id: ProgramId,
        computed_by: ComputedBy,
    },

    /// A report was published for the program
    ReportPublished {
        program_id: ProgramId,
        report_type: String,
    },
}

impl ProgramEvent {
    /// Program this event belongs to
    pub fn program_id(&self) -> ProgramId {
        match self {
            Self::ProgramCreated { program_id, .. }
            | Self::CheckpointReady { program_id, .. }
            | Self::CheckpointCompleted { program_id, .. }
            | Self::SchoolsAssigned { program_id, .. }
            | Self::StatusChanged { program_id, .. }
            | Self::MetricsRefreshed { program_id, .. }
            | Self::ReportPublished { program_id, .. } => *program_id,
        }
    }
}

/// Fire-and-forget delivery channel for domain events
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch an event toward its recipients
    async fn dispatch(&self, event: ProgramEvent) -> Result<(), NotifyError>;
}

/// Dispatch an event, logging and swallowing any delivery failure
pub async fn dispatch_best_effort(notifier: &dyn Notifier, event: ProgramEvent) {
    let program_id = event.program_id();
    if let Err(e) = notifier.dispatch(event).await {
        warn!(%program_id, "notification dispatch failed: {e}");
    }
}

/// Notifier that drops every event (embedders without a delivery channel)
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn dispatch(&self, _event: ProgramEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that records dispatched events for inspection in tests
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProgramEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything dispatched so far
    pub async fn recorded(&self) -> Vec<ProgramEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, event: ProgramEvent) -> Result<(), NotifyError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Notifier that always fails; used to prove dispatch failures are swallowed
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn dispatch(&self, _event: ProgramEvent) -> Result<(), NotifyError> {
        Err(NotifyError::DispatchFailed("channel unavailable".into()))
    }
}
