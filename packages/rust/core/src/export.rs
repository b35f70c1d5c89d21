//! `export_all`, `export_shortlist`, and `finalize`.
//!
//! Every sink is independent: a failing sink records an `Export` error and
//! leaves its output unset, and the run continues.

use std::path::Path;

use hireflow_shared::{Candidate, CandidateId, HireflowError, RowSet, RunConfig, RunId};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::graph::StageName;
use crate::pipeline::{StageContext, StageResult};
use crate::retry::call_with_policy;
use crate::state::{ErrorKind, Outputs, PipelineState, RunError, RunStatus};

pub const ALL_CANDIDATES_HEADERS: [&str; 10] = [
    "Candidate ID",
    "Name",
    "Email",
    "Phone",
    "Skills",
    "Experience (years)",
    "Enrichment Source",
    "Score",
    "Status",
    "Rationale",
];

pub const SHORTLIST_HEADERS: [&str; 9] = [
    "Candidate ID",
    "Name",
    "Email",
    "Score",
    "Interview Date",
    "Interview Time",
    "Duration (min)",
    "Calendar Event",
    "Rationale",
];

fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.1}")).unwrap_or_default()
}

/// `shortlisted`, `rejected`, or `unscored`.
pub fn candidate_status(state: &PipelineState, id: CandidateId) -> &'static str {
    if state.shortlisted.contains(&id) {
        "shortlisted"
    } else if state.rejected.contains(&id) {
        "rejected"
    } else {
        "unscored"
    }
}

/// Every candidate, extraction order.
pub fn all_candidates_rows(state: &PipelineState) -> RowSet {
    let mut rows = RowSet::new(ALL_CANDIDATES_HEADERS);
    for c in &state.candidates {
        rows.push(vec![
            c.id.to_string(),
            c.name.clone(),
            c.contact.email.clone().unwrap_or_default(),
            c.contact.phone.clone().unwrap_or_default(),
            c.skills.join(", "),
            c.experience_years.to_string(),
            c.enrichment.source.to_string(),
            format_score(c.score),
            candidate_status(state, c.id).to_string(),
            c.rationale.clone().unwrap_or_default(),
        ]);
    }
    rows
}

fn shortlist_row(c: &Candidate) -> Vec<String> {
    let (date, time, duration, link) = match &c.scheduling {
        Some(s) => (
            s.slot.start.format("%Y-%m-%d").to_string(),
            s.slot.start.format("%H:%M").to_string(),
            s.slot.duration_minutes.to_string(),
            s.link.clone(),
        ),
        None => Default::default(),
    };
    vec![
        c.id.to_string(),
        c.name.clone(),
        c.contact.email.clone().unwrap_or_default(),
        format_score(c.score),
        date,
        time,
        duration,
        link,
        c.rationale.clone().unwrap_or_default(),
    ]
}

/// Shortlisted candidates only, with slot and link when scheduled.
pub fn shortlist_rows(state: &PipelineState) -> RowSet {
    let mut rows = RowSet::new(SHORTLIST_HEADERS);
    for c in state.shortlisted_candidates() {
        rows.push(shortlist_row(c));
    }
    rows
}

fn export_error(stage: StageName, sink: &str, e: &HireflowError) -> RunError {
    RunError::new(stage, ErrorKind::Export, format!("{sink}: {e}"))
}

async fn create_sheet(ctx: &StageContext<'_>, title: &str, rows: &RowSet) -> hireflow_shared::Result<String> {
    let exporter = &ctx.caps.table_exporter;
    call_with_policy(&ctx.options.call_policy, exporter.name(), || {
        exporter.create_sheet(title, rows)
    })
    .await
}

#[instrument(skip_all, fields(stage = "export_all", candidates = state.candidates.len()))]
pub(crate) async fn export_all(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let rows = all_candidates_rows(&state);
    let title = format!("All Candidates {}", state.stamp());

    match create_sheet(ctx, &title, &rows).await {
        Ok(url) => {
            info!(%url, rows = rows.len(), "exported all candidates");
            state.outputs.all_candidates_sheet_url = Some(url);
        }
        Err(e) => {
            warn!(error = %e, "all-candidates export failed");
            state.record(export_error(StageName::ExportAll, ctx.caps.table_exporter.name(), &e));
        }
    }
    Ok(state)
}

#[instrument(skip_all, fields(stage = "export_shortlist", shortlisted = state.shortlisted.len()))]
pub(crate) async fn export_shortlist(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let rows = shortlist_rows(&state);
    let stamp = state.stamp();
    let title = format!("Interview Schedule {stamp}");

    match create_sheet(ctx, &title, &rows).await {
        Ok(url) => {
            info!(%url, rows = rows.len(), "exported interview sheet");
            state.outputs.interview_sheet_url = Some(url);
        }
        Err(e) => {
            warn!(error = %e, "interview sheet export failed");
            state.record(export_error(
                StageName::ExportShortlist,
                ctx.caps.table_exporter.name(),
                &e,
            ));
        }
    }

    let csv = &ctx.caps.flat_file_exporter;
    let path = ctx
        .options
        .output_dir
        .join(format!("scheduled_interviews_{stamp}.csv"));
    let written = call_with_policy(&ctx.options.call_policy, csv.name(), || {
        csv.write_csv(&path, &rows)
    })
    .await;
    match written {
        Ok(path) => {
            info!(path = %path.display(), "wrote interview csv");
            state.outputs.csv_path = Some(path);
        }
        Err(e) => {
            warn!(error = %e, "interview csv export failed");
            state.record(export_error(StageName::ExportShortlist, csv.name(), &e));
        }
    }
    Ok(state)
}

/// Final JSON snapshot of the run.
#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    run_id: RunId,
    started_at: String,
    status: RunStatus,
    config: &'a RunConfig,
    candidates: &'a [Candidate],
    shortlisted: &'a [CandidateId],
    rejected: &'a [CandidateId],
    scheduled: &'a [CandidateId],
    outputs: &'a Outputs,
    errors: &'a [RunError],
}

fn render_snapshot(state: &PipelineState, outputs: &Outputs) -> hireflow_shared::Result<String> {
    let snapshot = Snapshot {
        run_id: state.run_id,
        started_at: state.started_at.to_rfc3339(),
        status: RunStatus::Complete,
        config: &state.config,
        candidates: &state.candidates,
        shortlisted: &state.shortlisted,
        rejected: &state.rejected,
        scheduled: &state.scheduled,
        outputs,
        errors: &state.errors,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

async fn write_snapshot(path: &Path, body: String) -> hireflow_shared::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HireflowError::io(parent, e))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| HireflowError::io(path, e))
}

#[instrument(skip_all, fields(stage = "finalize"))]
pub(crate) async fn finalize(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let path = ctx
        .options
        .output_dir
        .join(format!("candidates_{}.json", state.stamp()));

    let mut outputs = state.outputs.clone();
    outputs.json_path = Some(path.clone());

    let written = match render_snapshot(&state, &outputs) {
        Ok(body) => write_snapshot(&path, body).await,
        Err(e) => Err(e),
    };
    match written {
        Ok(()) => {
            info!(path = %path.display(), "wrote run snapshot");
            state.outputs = outputs;
        }
        Err(e) => {
            warn!(error = %e, "run snapshot could not be written");
            state.record(RunError::new(StageName::Finalize, ErrorKind::Export, e.to_string()));
        }
    }
    Ok(state)
}
