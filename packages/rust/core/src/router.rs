//! The single branch point of the stage graph.

use serde::Serialize;

use crate::state::PipelineState;

/// Outcome of the post-scoring branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Schedule,
    Skip,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Schedule` iff at least one candidate is shortlisted.
pub fn route(state: &PipelineState) -> Route {
    if state.shortlisted.is_empty() {
        Route::Skip
    } else {
        Route::Schedule
    }
}
