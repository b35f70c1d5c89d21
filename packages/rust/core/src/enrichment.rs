//! Dual-strategy enrichment: primary profile capability with a best-effort fallback.
//!
//! Per candidate:
//! 1. If the primary capability's precondition holds, call it (bounded by the
//!    call policy).
//! 2. On any primary failure, or when the precondition is absent, call the
//!    fallback.
//! 3. Tag the result `primary`, `fallback`, or `none` (both failed).

use std::sync::Arc;

use hireflow_adapters::{FallbackEnricher, ProfileEnricher};
use hireflow_shared::{Candidate, Enrichment, EnrichmentSource};
use tracing::{debug, info, instrument, warn};

use crate::fanout::fan_out;
use crate::graph::StageName;
use crate::pipeline::{StageContext, StageResult};
use crate::retry::{CallPolicy, call_with_policy};
use crate::state::{ErrorKind, PipelineState, RunError};

/// Result of enriching one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOutcome {
    pub enrichment: Enrichment,
    /// Why the primary path was not used, when it wasn't.
    pub primary_skipped: Option<String>,
    /// Set only when both paths failed.
    pub error: Option<String>,
}

/// The single place that decides which enrichment path a candidate takes.
#[derive(Clone)]
pub struct DualStrategyEnricher {
    primary: Option<Arc<dyn ProfileEnricher>>,
    fallback: Arc<dyn FallbackEnricher>,
    policy: CallPolicy,
}

impl DualStrategyEnricher {
    pub fn new(
        primary: Option<Arc<dyn ProfileEnricher>>,
        fallback: Arc<dyn FallbackEnricher>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    /// Enrich one candidate. Never fails; the outcome carries the path taken.
    pub async fn enrich(&self, candidate: &Candidate) -> EnrichmentOutcome {
        let primary_skipped = match &self.primary {
            Some(primary) if primary.precondition(candidate) => {
                let result =
                    call_with_policy(&self.policy, primary.name(), || primary.enrich_primary(candidate))
                        .await;
                match result {
                    Ok(fields) => {
                        return EnrichmentOutcome {
                            enrichment: Enrichment {
                                source: EnrichmentSource::Primary,
                                fields,
                            },
                            primary_skipped: None,
                            error: None,
                        };
                    }
                    Err(e) => format!("{} failed: {e}", primary.name()),
                }
            }
            Some(primary) => format!("{} precondition absent", primary.name()),
            None => "no primary enricher configured".to_string(),
        };
        debug!(candidate_id = %candidate.id, reason = %primary_skipped, "using fallback enrichment");

        let result = call_with_policy(&self.policy, self.fallback.name(), || {
            self.fallback.enrich_fallback(candidate)
        })
        .await;
        match result {
            Ok(fields) => EnrichmentOutcome {
                enrichment: Enrichment {
                    source: EnrichmentSource::Fallback,
                    fields,
                },
                primary_skipped: Some(primary_skipped),
                error: None,
            },
            Err(e) => {
                let message = format!("{primary_skipped}; {} failed: {e}", self.fallback.name());
                EnrichmentOutcome {
                    enrichment: Enrichment::default(),
                    primary_skipped: Some(primary_skipped),
                    error: Some(message),
                }
            }
        }
    }
}

/// Enrich every candidate. A failure for one candidate never affects others.
#[instrument(skip_all, fields(stage = "enrich", candidates = state.candidates.len()))]
pub(crate) async fn enrich(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let enricher = DualStrategyEnricher::new(
        ctx.caps.primary_enricher.clone(),
        ctx.caps.fallback_enricher.clone(),
        ctx.options.call_policy,
    );
    let total = state.candidates.len();

    let results = fan_out(state.candidates.clone(), ctx.options.concurrency, |candidate| {
        let enricher = enricher.clone();
        async move { enricher.enrich(&candidate).await }
    })
    .await;

    let mut errors = Vec::new();
    for (index, (candidate, result)) in state.candidates.iter_mut().zip(results).enumerate() {
        ctx.progress.candidate_done(StageName::Enrich, index + 1, total);
        match result {
            Ok(outcome) => {
                if let Some(message) = outcome.error {
                    warn!(candidate_id = %candidate.id, error = %message, "candidate left unenriched");
                    errors.push(RunError::for_candidate(
                        StageName::Enrich,
                        candidate.id,
                        ErrorKind::EnrichmentUnavailable,
                        message,
                    ));
                }
                candidate.enrichment = outcome.enrichment;
            }
            Err(panic) => {
                warn!(candidate_id = %candidate.id, error = %panic, "enrichment worker failed");
                candidate.enrichment = Enrichment::default();
                errors.push(RunError::for_candidate(
                    StageName::Enrich,
                    candidate.id,
                    ErrorKind::EnrichmentUnavailable,
                    panic,
                ));
            }
        }
    }

    let primary = state
        .candidates
        .iter()
        .filter(|c| c.enrichment.source == EnrichmentSource::Primary)
        .count();
    info!(primary, fallback = total - primary - errors.len(), failed = errors.len(), "enrichment complete");
    state.errors.extend(errors);
    Ok(state)
}
