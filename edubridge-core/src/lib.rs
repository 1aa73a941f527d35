//! edubridge-core: program lifecycle and readiness metrics engine
//!
//! This crate is the core of a CSR-sponsored education-program platform:
//!
//! - **Program lifecycle** - [`ProgramService`] for creation, school
//!   assignment, status overrides, and cascade deletion
//! - **Checkpoint state machine** - [`CheckpointMachine`] driving the five
//!   fixed approval gates (pending → ready → completed) with strict ordering
//! - **Metrics snapshots** - [`metrics::compute_for_program`] rolling up
//!   reach, engagement, readiness-pillar, and recognition figures with
//!   explicit fallback precedence
//! - **Projections** - [`projection::dashboard_view`] and
//!   [`projection::report_table`], the single computed view behind
//!   dashboards and generated documents
//! - **Seams** - [`DataStore`], [`RosterSource`], [`Notifier`], and
//!   [`projection::DocumentRenderer`] for the external collaborators
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use edubridge_core::config::EngineConfig;
//! use edubridge_core::events::NullNotifier;
//! use edubridge_core::program::{ProgramService, ProgramDraft};
//! use edubridge_core::store::{MemoryRoster, MemoryStore};
//!
//! # async fn example(draft: ProgramDraft) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let roster = Arc::new(MemoryRoster::new());
//! let service = ProgramService::new(
//!     store,
//!     roster,
//!     Arc::new(NullNotifier),
//!     EngineConfig::default(),
//! );
//!
//! let program = service.create("admin-1", draft).await?;
//! println!("created program {}", program.id);
//! # Ok(())
//! # }
//! ```
//!
//! Data flows one direction: roster records → snapshot computer →
//! checkpoint/program state → projections. Projections never write back.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod program;
pub mod projection;
pub mod store;

// Re-export key types for convenience
pub use checkpoint::{Checkpoint, CheckpointMachine, CheckpointOverview, CheckpointStatus};
pub use config::EngineConfig;
pub use error::{CoreResult, DomainError, ErrorKind, StoreError};
pub use events::{Notifier, NullNotifier, ProgramEvent};
pub use metrics::{MetricsSnapshot, PillarLevel, ProgramMetrics};
pub use program::{Program, ProgramService, ProgramStatus};
pub use store::{DataStore, MemoryRoster, MemoryStore, RosterSource};
