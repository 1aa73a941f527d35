//! Metrics snapshot computation
//!
//! Produces a single consistent point-in-time rollup from the assigned-school
//! set, the external roster/activity records, and the previously stored
//! rollup (fallback only). Each fallback chain is isolated in its own pure
//! function so it is independently testable; [`compute_snapshot`] is
//! deterministic given its inputs and never mutates source records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::pillars::{self, PillarLevel, PillarSource, PILLARS};
use super::types::{
    ComputedBy, EngagementMetrics, MetricsSnapshot, ProgramMetrics, ReachMetrics,
    RecognitionMetrics,
};
use crate::error::{CoreResult, DomainError};
use crate::program::{ProgramId, SchoolAssignment};
use crate::store::{
    ActivityRecord, DataStore, RosterSource, SchoolOrganization, StudentRecord,
};

/// Everything [`compute_snapshot`] reads
#[derive(Debug)]
pub struct SnapshotInputs<'a> {
    /// Assignment rows for the program
    pub assignments: &'a [SchoolAssignment],
    /// Live roster records matched to the assigned schools
    pub students: &'a [StudentRecord],
    /// Activity records matched to the assigned schools
    pub activities: &'a [ActivityRecord],
    /// Resolved organization records for the assigned schools
    pub organizations: &'a [SchoolOrganization],
    /// Previously stored snapshot, used only as fallback
    pub previous: Option<&'a MetricsSnapshot>,
    pub computed_by: ComputedBy,
    pub computed_at: DateTime<Utc>,
}

/// Three-tier student-count fallback.
///
/// Live roster count wins; a zero live count falls back to the stored
/// per-school `students_covered` sum; if that is also zero, the previous
/// snapshot's value stands. Roster linkage can be incomplete for legacy
/// schools, and a previously-known-good number must never regress to zero
/// because of a transient join failure.
pub fn resolve_student_count(live: u64, covered_sum: u64, previous: u64) -> u64 {
    if live > 0 {
        live
    } else if covered_sum > 0 {
        covered_sum
    } else {
        previous
    }
}

/// Engagement is recomputed only when live roster data exists; otherwise the
/// stored figures carry forward unchanged. Absence of data is not evidence of
/// zero engagement.
pub fn resolve_engagement(
    students: &[StudentRecord],
    previous: Option<&EngagementMetrics>,
) -> EngagementMetrics {
    if students.is_empty() {
        return previous.cloned().unwrap_or_default();
    }
    let active = students.iter().filter(|s| s.active).count() as u64;
    EngagementMetrics {
        active_students: active,
        engagement_rate_pct: active as f64 / students.len() as f64 * 100.0,
    }
}

/// Continuity rule for pillar levels: a fresh `NoData` does not displace a
/// previously stored Medium/High level. Sponsor-facing displays favor
/// continuity over strict recency; this is a deliberate policy, not a bug.
pub fn resolve_pillar(fresh: PillarLevel, previous: PillarLevel) -> PillarLevel {
    match (fresh, previous) {
        (PillarLevel::NoData, PillarLevel::Medium | PillarLevel::High) => previous,
        _ => fresh,
    }
}

/// Average of a per-student sub-score field; `None` when no student carries it
fn roster_aggregate_score(students: &[StudentRecord], score_field: &str) -> Option<f64> {
    let values: Vec<f64> = students
        .iter()
        .filter_map(|s| s.scores.get(score_field).copied())
        .filter(|v| !v.is_nan())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Fraction of matched students with any activity of the given kind, as a
/// percentage; `None` when there are no matched students.
///
/// Only activity rows for students present in the matched roster count:
/// legacy activity data can reference students with no roster row, and those
/// must not inflate the fraction past what the roster supports.
fn activity_coverage_score(
    students: &[StudentRecord],
    activities: &[ActivityRecord],
    activity_kind: &str,
) -> Option<f64> {
    if students.is_empty() {
        return None;
    }
    let roster: BTreeSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let covered: BTreeSet<&str> = activities
        .iter()
        .filter(|a| a.kind == activity_kind)
        .map(|a| a.student_id.as_str())
        .filter(|id| roster.contains(id))
        .collect();
    Some(covered.len() as f64 / students.len() as f64 * 100.0)
}

fn compute_recognition(
    students: &[StudentRecord],
    activities: &[ActivityRecord],
) -> RecognitionMetrics {
    let certificates_issued = students
        .iter()
        .map(|s| s.certificates_delivered as u64)
        .sum();
    let kits_in_progress = students.iter().map(|s| s.kits_in_progress as u64).sum();
    let badges_awarded = activities
        .iter()
        .filter_map(|a| a.badge.as_deref().map(|b| (a.student_id.as_str(), b)))
        .collect::<BTreeSet<_>>()
        .len() as u64;
    let completion_rate_pct = if students.is_empty() {
        0
    } else {
        let completers = students.iter().filter(|s| s.completed).count();
        (completers as f64 / students.len() as f64 * 100.0).round() as u32
    };
    RecognitionMetrics {
        certificates_issued,
        kits_in_progress,
        badges_awarded,
        completion_rate_pct,
    }
}

/// Distinct non-empty city/district values among the resolved organizations
fn regions_covered(organizations: &[SchoolOrganization]) -> Vec<String> {
    organizations
        .iter()
        .flat_map(|org| [org.city.as_deref(), org.district.as_deref()])
        .flatten()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compute a fresh snapshot from the given inputs.
///
/// Pure: same inputs, same output. Callers decide whether and where the
/// result is persisted.
pub fn compute_snapshot(inputs: &SnapshotInputs<'_>) -> MetricsSnapshot {
    let live_count = inputs.students.len() as u64;
    let covered_sum: u64 = inputs.assignments.iter().map(|a| a.students_covered).sum();
    let previous_count = inputs
        .previous
        .map(|p| p.reach.students_onboarded)
        .unwrap_or(0);

    let reach = ReachMetrics {
        students_onboarded: resolve_student_count(live_count, covered_sum, previous_count),
        schools_assigned: inputs.assignments.len() as u32,
        regions: regions_covered(inputs.organizations),
    };

    let engagement = resolve_engagement(inputs.students, inputs.previous.map(|p| &p.engagement));

    let readiness = PILLARS
        .iter()
        .map(|pillar| {
            let score = match pillar.source {
                PillarSource::RosterAggregate { score_field } => {
                    roster_aggregate_score(inputs.students, score_field)
                }
                PillarSource::ActivityCoverage { activity_kind } => {
                    activity_coverage_score(inputs.students, inputs.activities, activity_kind)
                }
            };
            let fresh = pillars::classify(score);
            let previous = inputs
                .previous
                .map(|p| p.pillar_level(pillar.id))
                .unwrap_or(PillarLevel::NoData);
            (pillar.id.to_string(), resolve_pillar(fresh, previous))
        })
        .collect();

    MetricsSnapshot {
        reach,
        engagement,
        readiness,
        recognition: compute_recognition(inputs.students, inputs.activities),
        computed_at: Some(inputs.computed_at),
        computed_by: inputs.computed_by,
    }
}

/// Gather inputs for a program and run [`compute_snapshot`].
///
/// Reads assignments and the previous rollup from the store and the live
/// records from the roster source. Does not persist anything.
pub async fn compute_for_program(
    store: &dyn DataStore,
    roster: &dyn RosterSource,
    program_id: ProgramId,
    computed_by: ComputedBy,
) -> CoreResult<MetricsSnapshot> {
    if store.get_program(program_id).await?.is_none() {
        return Err(DomainError::program_not_found(program_id));
    }

    let assignments = store.assignments_for(program_id).await?;
    let school_ids: Vec<String> = assignments.iter().map(|a| a.school_id.clone()).collect();

    let students = roster.students_for(&school_ids).await?;
    let activities = roster.activities_for(&school_ids).await?;
    let organizations = roster.organizations_for(&school_ids).await?;
    let previous = store.get_metrics(program_id).await?;

    Ok(compute_snapshot(&SnapshotInputs {
        assignments: &assignments,
        students: &students,
        activities: &activities,
        organizations: &organizations,
        previous: previous.as_ref().map(|m| &m.snapshot),
        computed_by,
        computed_at: Utc::now(),
    }))
}

/// Persist a snapshot as the program's stored rollup (overwrite, not append)
pub async fn store_snapshot(
    store: &dyn DataStore,
    program_id: ProgramId,
    snapshot: MetricsSnapshot,
) -> CoreResult<MetricsSnapshot> {
    store
        .put_metrics(&ProgramMetrics {
            program_id,
            snapshot: snapshot.clone(),
        })
        .await?;
    Ok(snapshot)
}
