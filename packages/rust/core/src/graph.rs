//! The static stage graph: one predicate-guarded edge, all others unconditional.

use serde::{Deserialize, Serialize};

use crate::router::{self, Route};
use crate::state::PipelineState;

/// Pipeline stages, in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingest,
    Parse,
    Enrich,
    Score,
    Schedule,
    ExportAll,
    ExportShortlist,
    Finalize,
}

impl StageName {
    pub const ALL: [StageName; 8] = [
        Self::Ingest,
        Self::Parse,
        Self::Enrich,
        Self::Score,
        Self::Schedule,
        Self::ExportAll,
        Self::ExportShortlist,
        Self::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Parse => "parse",
            Self::Enrich => "enrich",
            Self::Score => "score",
            Self::Schedule => "schedule",
            Self::ExportAll => "export_all",
            Self::ExportShortlist => "export_shortlist",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing edge of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Always(StageName),
    /// Chosen by [`router::route`] over the state after the stage ran.
    Routed {
        schedule: StageName,
        skip: StageName,
    },
    End,
}

/// Directed stage graph executed by the engine.
#[derive(Debug, Clone)]
pub struct StageGraph {
    entry: StageName,
    edges: Vec<(StageName, Edge)>,
}

impl StageGraph {
    /// `ingest → parse → enrich → score → [route] → schedule? → export_all → export_shortlist → finalize`
    pub fn standard() -> Self {
        use StageName::*;
        Self {
            entry: Ingest,
            edges: vec![
                (Ingest, Edge::Always(Parse)),
                (Parse, Edge::Always(Enrich)),
                (Enrich, Edge::Always(Score)),
                (
                    Score,
                    Edge::Routed {
                        schedule: Schedule,
                        skip: ExportAll,
                    },
                ),
                (Schedule, Edge::Always(ExportAll)),
                (ExportAll, Edge::Always(ExportShortlist)),
                (ExportShortlist, Edge::Always(Finalize)),
                (Finalize, Edge::End),
            ],
        }
    }

    pub fn entry(&self) -> StageName {
        self.entry
    }

    pub fn edge(&self, from: StageName) -> Edge {
        self.edges
            .iter()
            .find(|(stage, _)| *stage == from)
            .map(|(_, edge)| *edge)
            .unwrap_or(Edge::End)
    }

    /// Resolve the successor of `from`. Also returns the route when the edge
    /// was predicate-guarded.
    pub fn next(&self, from: StageName, state: &PipelineState) -> (Option<StageName>, Option<Route>) {
        match self.edge(from) {
            Edge::Always(to) => (Some(to), None),
            Edge::Routed { schedule, skip } => {
                let chosen = router::route(state);
                let to = match chosen {
                    Route::Schedule => schedule,
                    Route::Skip => skip,
                };
                (Some(to), Some(chosen))
            }
            Edge::End => (None, None),
        }
    }

    /// Render the graph as text: the linear chain, then each edge.
    pub fn render(&self) -> String {
        let mut chain = Vec::new();
        let mut current = Some(self.entry);
        while let Some(stage) = current {
            match self.edge(stage) {
                Edge::Always(to) => {
                    chain.push(stage.to_string());
                    current = Some(to);
                }
                Edge::Routed { schedule, skip } => {
                    chain.push(stage.to_string());
                    chain.push("[route]".to_string());
                    chain.push(format!("{schedule}?"));
                    current = Some(skip);
                }
                Edge::End => {
                    chain.push(stage.to_string());
                    current = None;
                }
            }
        }

        let mut out = chain.join(" → ");
        out.push_str("\n\n");
        for (stage, edge) in &self.edges {
            match edge {
                Edge::Always(to) => out.push_str(&format!("  {stage:<17} ──▶ {to}\n")),
                Edge::Routed { schedule, skip } => {
                    out.push_str(&format!(
                        "  {stage:<17} ──▶ {schedule}   when shortlisted > 0\n"
                    ));
                    out.push_str(&format!("  {:<17} ──▶ {skip}   otherwise\n", ""));
                }
                Edge::End => out.push_str(&format!("  {stage:<17} ──▶ END\n")),
            }
        }
        out
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use hireflow_shared::{CandidateId, RunConfig};

    use super::*;

    fn state() -> PipelineState {
        PipelineState::new(RunConfig::new(false, 5, 5.0).unwrap())
    }

    fn walk(graph: &StageGraph, state: &PipelineState) -> Vec<StageName> {
        let mut visited = Vec::new();
        let mut current = Some(graph.entry());
        while let Some(stage) = current {
            visited.push(stage);
            current = graph.next(stage, state).0;
        }
        visited
    }

    #[test]
    fn skip_route_bypasses_schedule() {
        use StageName::*;
        let graph = StageGraph::standard();
        assert_eq!(
            walk(&graph, &state()),
            vec![Ingest, Parse, Enrich, Score, ExportAll, ExportShortlist, Finalize]
        );
    }

    #[test]
    fn schedule_route_converges_at_export_all() {
        let graph = StageGraph::standard();
        let mut s = state();
        s.shortlisted.push(CandidateId(1));
        assert_eq!(walk(&graph, &s), StageName::ALL.to_vec());

        let (next, route) = graph.next(StageName::Score, &s);
        assert_eq!(next, Some(StageName::Schedule));
        assert_eq!(route, Some(Route::Schedule));
        assert_eq!(graph.next(StageName::Schedule, &s).0, Some(StageName::ExportAll));
    }

    #[test]
    fn only_score_is_routed() {
        let graph = StageGraph::standard();
        let routed: Vec<StageName> = StageName::ALL
            .into_iter()
            .filter(|s| matches!(graph.edge(*s), Edge::Routed { .. }))
            .collect();
        assert_eq!(routed, vec![StageName::Score]);
    }

    #[test]
    fn render_marks_routed_edge() {
        let text = StageGraph::standard().render();
        assert!(text.starts_with(
            "ingest → parse → enrich → score → [route] → schedule? → export_all → export_shortlist → finalize"
        ));
        assert!(text.contains("when shortlisted > 0"));
        assert!(text.contains("END"));
    }
}
