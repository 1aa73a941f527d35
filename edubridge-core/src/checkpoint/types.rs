//! Checkpoint types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::program::{ProgramId, ProgramStatus};

/// Number of checkpoints in every program lifecycle
pub const CHECKPOINT_COUNT: u8 = 5;

/// Fixed checkpoint kinds, bound to checkpoint numbers 1–5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    ProgramApproval,
    OnboardingConfirmation,
    MidProgramReview,
    CompletionReview,
    ExtensionRenewal,
}

impl CheckpointKind {
    /// Kind bound to a checkpoint number (1-based)
    pub fn for_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::ProgramApproval),
            2 => Some(Self::OnboardingConfirmation),
            3 => Some(Self::MidProgramReview),
            4 => Some(Self::CompletionReview),
            5 => Some(Self::ExtensionRenewal),
            _ => None,
        }
    }

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProgramApproval => "program_approval",
            Self::OnboardingConfirmation => "onboarding_confirmation",
            Self::MidProgramReview => "mid_program_review",
            Self::CompletionReview => "completion_review",
            Self::ExtensionRenewal => "extension_renewal",
        }
    }

    /// Program-level status reached when this checkpoint completes.
    ///
    /// Checkpoint 5 (extension/renewal) does not move the program status.
    pub fn program_status_on_completion(&self) -> Option<ProgramStatus> {
        match self {
            Self::ProgramApproval => Some(ProgramStatus::Approved),
            Self::OnboardingConfirmation => Some(ProgramStatus::ImplementationInProgress),
            Self::MidProgramReview => Some(ProgramStatus::MidProgramReviewCompleted),
            Self::CompletionReview => Some(ProgramStatus::Completed),
            Self::ExtensionRenewal => None,
        }
    }
}

/// Per-checkpoint progression state, one-way: pending → ready → completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Ready,
    Completed,
}

impl CheckpointStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Completed => "completed",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One of the five approval gates of a program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub program_id: ProgramId,
    /// 1-based position in the fixed sequence
    pub number: u8,
    pub kind: CheckpointKind,
    pub status: CheckpointStatus,
    pub triggered_by: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Metrics captured at trigger time; immutable afterwards
    pub snapshot: Option<MetricsSnapshot>,
    pub admin_notes: Option<String>,
    pub sponsor_notes: Option<String>,
}

impl Checkpoint {
    /// Create a pending checkpoint for the given slot.
    ///
    /// Returns `None` for numbers outside 1–5; checkpoints only exist as the
    /// fixed set created with the program.
    pub fn new(program_id: ProgramId, number: u8) -> Option<Self> {
        let kind = CheckpointKind::for_number(number)?;
        Some(Self {
            program_id,
            number,
            kind,
            status: CheckpointStatus::Pending,
            triggered_by: None,
            triggered_at: None,
            acknowledged_by: None,
            acknowledged_at: None,
            snapshot: None,
            admin_notes: None,
            sponsor_notes: None,
        })
    }

    /// The full pending set created atomically with a program
    pub fn initial_set(program_id: ProgramId) -> Vec<Self> {
        (1..=CHECKPOINT_COUNT)
            .filter_map(|n| Self::new(program_id, n))
            .collect()
    }
}

/// Result of a trigger precondition check.
///
/// Invariant violations are reported here as a reason string, never as a
/// fault: admin UIs need the reason to explain a disabled button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl TriggerCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Derived view over a program's checkpoint list.
///
/// Everything here is computed from the stored rows on read; there is no
/// separate counter to keep in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointOverview {
    /// All five checkpoints, ordered by number
    pub checkpoints: Vec<Checkpoint>,
    /// Number of the checkpoint currently `ready`, if any
    pub current: Option<u8>,
    /// Number of the next `pending` checkpoint, if any
    pub next: Option<u8>,
    pub completed_count: u8,
}

impl CheckpointOverview {
    /// Derive the overview from stored checkpoint rows (assumed ordered)
    pub fn derive(checkpoints: Vec<Checkpoint>) -> Self {
        let current = checkpoints
            .iter()
            .find(|c| c.status == CheckpointStatus::Ready)
            .map(|c| c.number);
        let next = checkpoints
            .iter()
            .find(|c| c.status == CheckpointStatus::Pending)
            .map(|c| c.number);
        let completed_count = checkpoints
            .iter()
            .filter(|c| c.status == CheckpointStatus::Completed)
            .count() as u8;
        Self {
            checkpoints,
            current,
            next,
            completed_count,
        }
    }
}
