//! Program lifecycle: types and controller

pub mod service;
pub mod types;

pub use service::{AssignmentOutcome, ProgramService};
pub use types::{
    DurationWindow, GeographicScope, Partner, Program, ProgramDraft, ProgramId, ProgramPatch,
    ProgramStatus, PublishedReport, RollupCounters, SchoolAssignment, SchoolStatus,
};
