//! Checkpoint state machine: types and transitions

pub mod machine;
pub mod types;

pub use machine::CheckpointMachine;
pub use types::{
    Checkpoint, CheckpointKind, CheckpointOverview, CheckpointStatus, TriggerCheck,
    CHECKPOINT_COUNT,
};
