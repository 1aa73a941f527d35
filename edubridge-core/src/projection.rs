//! Dashboard and report projections
//!
//! Read-only views assembled from the stored program, its checkpoint
//! overview, and the stored metrics rollup. Dashboards and generated
//! documents both consume these structures, so for the same program at the
//! same instant their figures are numerically identical by construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::CheckpointOverview;
use crate::metrics::{MetricsSnapshot, PillarLevel, ProgramMetrics, PILLARS};
use crate::program::{Program, ProgramId, ProgramStatus};

/// One readiness row, in catalog display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessRow {
    pub pillar_id: String,
    pub display_name: String,
    pub level: PillarLevel,
}

/// Program header shown at the top of dashboards and documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramOverview {
    pub program_id: ProgramId,
    pub name: String,
    pub partner_id: String,
    pub status: ProgramStatus,
    pub checkpoints_completed: u8,
    pub current_checkpoint: Option<u8>,
    pub next_checkpoint: Option<u8>,
}

/// The single computed view behind dashboards and downloadable documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub overview: ProgramOverview,
    pub metrics: MetricsSnapshot,
    pub readiness: Vec<ReadinessRow>,
}

/// Assemble the dashboard view from stored state
pub fn dashboard_view(
    program: &Program,
    checkpoints: &CheckpointOverview,
    metrics: &ProgramMetrics,
) -> DashboardView {
    let readiness = PILLARS
        .iter()
        .map(|pillar| ReadinessRow {
            pillar_id: pillar.id.to_string(),
            display_name: pillar.display_name.to_string(),
            level: metrics.snapshot.pillar_level(pillar.id),
        })
        .collect();

    DashboardView {
        overview: ProgramOverview {
            program_id: program.id,
            name: program.name.clone(),
            partner_id: program.partner_id.clone(),
            status: program.status,
            checkpoints_completed: checkpoints.completed_count,
            current_checkpoint: checkpoints.current,
            next_checkpoint: checkpoints.next,
        },
        metrics: metrics.snapshot.clone(),
        readiness,
    }
}

/// Flat tabular form of a [`DashboardView`] for spreadsheet export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Flatten a dashboard view into metric/value rows
pub fn report_table(view: &DashboardView) -> ReportTable {
    let mut rows = vec![
        vec![
            "Students onboarded".to_string(),
            view.metrics.reach.students_onboarded.to_string(),
        ],
        vec![
            "Schools assigned".to_string(),
            view.metrics.reach.schools_assigned.to_string(),
        ],
        vec![
            "Regions covered".to_string(),
            view.metrics.reach.regions.len().to_string(),
        ],
        vec![
            "Active students".to_string(),
            view.metrics.engagement.active_students.to_string(),
        ],
        vec![
            "Engagement rate (%)".to_string(),
            format!("{:.1}", view.metrics.engagement.engagement_rate_pct),
        ],
        vec![
            "Certificates issued".to_string(),
            view.metrics.recognition.certificates_issued.to_string(),
        ],
        vec![
            "Kits in progress".to_string(),
            view.metrics.recognition.kits_in_progress.to_string(),
        ],
        vec![
            "Badges awarded".to_string(),
            view.metrics.recognition.badges_awarded.to_string(),
        ],
        vec![
            "Completion rate (%)".to_string(),
            view.metrics.recognition.completion_rate_pct.to_string(),
        ],
    ];
    for row in &view.readiness {
        rows.push(vec![
            format!("Readiness: {}", row.display_name),
            row.level.as_str().to_string(),
        ]);
    }

    ReportTable {
        title: view.overview.name.clone(),
        columns: vec!["Metric".to_string(), "Value".to_string()],
        rows,
    }
}

/// Output format of a generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Paginated document (PDF-class)
    Paginated,
    /// Tabular spreadsheet (Excel-class)
    Spreadsheet,
}

/// Errors from an external document renderer
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// External document renderer. Receives the same computed structures the
/// dashboard uses; rendering itself is out of scope for the engine.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        view: &DashboardView,
        format: DocumentFormat,
    ) -> Result<Vec<u8>, RenderError>;
}
