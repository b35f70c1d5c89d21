//! The state threaded through every pipeline stage.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hireflow_shared::{Candidate, CandidateId, RawItem, RunConfig, RunId};
use serde::Serialize;

use crate::graph::StageName;
use crate::router::Route;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy of recorded run errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid run configuration (fatal).
    Config,
    /// A required capability is unreachable at run start (fatal).
    Connectivity,
    Parse,
    /// Both enrichment paths failed for a candidate.
    EnrichmentUnavailable,
    Score,
    Scheduling,
    Export,
}

impl ErrorKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config | Self::Connectivity)
    }
}

/// One recorded error. Never deduplicated or dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunError {
    pub stage: StageName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<CandidateId>,
    pub kind: ErrorKind,
    pub message: String,
}

impl RunError {
    pub fn new(stage: StageName, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            candidate_id: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_candidate(
        stage: StageName,
        candidate_id: CandidateId,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            candidate_id: Some(candidate_id),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.candidate_id {
            Some(id) => write!(f, "[{}] {}: {}", self.stage, id, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Locations of everything the run published.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_candidates_sheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_sheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    pub calendar_links: Vec<String>,
}

/// The run's working memory. Each stage consumes a snapshot and returns the next.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub config: RunConfig,
    pub raw_items: Vec<RawItem>,
    pub candidates: Vec<Candidate>,
    pub shortlisted: Vec<CandidateId>,
    pub rejected: Vec<CandidateId>,
    pub scheduled: Vec<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    pub outputs: Outputs,
    pub errors: Vec<RunError>,
    pub status: RunStatus,
}

impl PipelineState {
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            config,
            raw_items: Vec::new(),
            candidates: Vec::new(),
            shortlisted: Vec::new(),
            rejected: Vec::new(),
            scheduled: Vec::new(),
            route: None,
            outputs: Outputs::default(),
            errors: Vec::new(),
            status: RunStatus::Running,
        }
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Shortlisted candidates in extraction order.
    pub fn shortlisted_candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates
            .iter()
            .filter(|c| self.shortlisted.contains(&c.id))
    }

    /// Timestamp used in artifact names.
    pub fn stamp(&self) -> String {
        self.started_at.format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn record(&mut self, error: RunError) {
        self.errors.push(error);
    }
}
