//! Persistence seams and the in-memory reference implementation

pub mod memory;
pub mod traits;

pub use memory::{MemoryRoster, MemoryStore};
pub use traits::{
    ActivityRecord, DataStore, RosterSource, SchoolFilter, SchoolOrganization, StudentRecord,
};
