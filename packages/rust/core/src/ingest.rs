//! `ingest` and `parse` stages.

use std::collections::HashSet;
use std::sync::Arc;

use hireflow_adapters::Source;
use hireflow_shared::{Candidate, CandidateId, HireflowError, RawItem};
use tracing::{debug, info, instrument, warn};

use crate::fanout::fan_out;
use crate::graph::StageName;
use crate::pipeline::{Fatal, StageContext, StageResult};
use crate::retry::call_with_policy;
use crate::state::{ErrorKind, PipelineState, RunError};

async fn fetch_from(
    source: &Arc<dyn Source>,
    max_items: usize,
    ctx: &StageContext<'_>,
) -> hireflow_shared::Result<Vec<RawItem>> {
    call_with_policy(&ctx.options.call_policy, source.name(), || {
        source.fetch(max_items)
    })
    .await
}

/// Keep the first occurrence of each content hash, up to `budget` new items.
/// Returns the kept items and how many duplicates were skipped.
fn take_unique(
    items: Vec<RawItem>,
    seen: &mut HashSet<String>,
    budget: usize,
) -> (Vec<RawItem>, usize) {
    let mut kept = Vec::new();
    let mut duplicates = 0;
    for item in items {
        if kept.len() == budget {
            break;
        }
        if seen.insert(item.content_hash.clone()) {
            kept.push(item);
        } else {
            debug!(origin = %item.origin, "dropping duplicate resume");
            duplicates += 1;
        }
    }
    (kept, duplicates)
}

/// Read the inbox until `budget` unique items are collected or it runs dry.
/// Each pass re-reads from the start with a limit widened by the duplicates
/// seen so far.
async fn read_inbox(
    inbox: &Arc<dyn Source>,
    seen: &mut HashSet<String>,
    budget: usize,
    ctx: &StageContext<'_>,
) -> hireflow_shared::Result<Vec<RawItem>> {
    let mut limit = budget;
    loop {
        let items = fetch_from(inbox, limit, ctx).await?;
        let exhausted = items.len() < limit;
        let mut pass_seen = seen.clone();
        let (kept, duplicates) = take_unique(items, &mut pass_seen, budget);
        if kept.len() == budget || exhausted || duplicates == 0 {
            *seen = pass_seen;
            return Ok(kept);
        }
        debug!(limit, duplicates, "widening inbox read past duplicates");
        limit = budget + duplicates;
    }
}

fn connectivity_failure(state: PipelineState, source: &str, e: HireflowError) -> StageResult {
    let error = RunError::new(
        StageName::Ingest,
        ErrorKind::Connectivity,
        format!("{source}: {e}"),
    );
    Err(Box::new(Fatal { state, error }))
}

/// Fetch raw items: remote source first (when enabled), then the local
/// inbox. De-duplicated by content hash before counting against
/// `max_items`.
#[instrument(skip_all, fields(stage = "ingest", source_enabled = state.config.source_enabled()))]
pub(crate) async fn ingest(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let max_items = state.config.max_items() as usize;
    let mut seen = HashSet::new();
    let mut raw_items = Vec::new();

    if state.config.source_enabled() {
        let Some(source) = &ctx.caps.source else {
            let error = RunError::new(
                StageName::Ingest,
                ErrorKind::Config,
                "source_enabled is set but no remote source is configured",
            );
            return Err(Box::new(Fatal { state, error }));
        };
        match fetch_from(source, max_items, ctx).await {
            Ok(items) => {
                let fetched = items.len();
                let (kept, _) = take_unique(items, &mut seen, max_items);
                info!(source = source.name(), fetched, unique = kept.len(), "fetched remote items");
                raw_items.extend(kept);
            }
            Err(e) => return connectivity_failure(state, source.name(), e),
        }
    }

    let remaining = max_items.saturating_sub(raw_items.len());
    if remaining > 0 {
        let inbox = &ctx.caps.inbox;
        match read_inbox(inbox, &mut seen, remaining, ctx).await {
            Ok(kept) => {
                info!(source = inbox.name(), count = kept.len(), "read local items");
                raw_items.extend(kept);
            }
            Err(e) => return connectivity_failure(state, inbox.name(), e),
        }
    }

    info!(count = raw_items.len(), "ingest complete");
    state.raw_items = raw_items;
    Ok(state)
}

/// Parse each raw item. Successful parses receive sequential ids in
/// raw-item order; failures are recorded and dropped.
#[instrument(skip_all, fields(stage = "parse", items = state.raw_items.len()))]
pub(crate) async fn parse(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let parser = ctx.caps.parser.clone();
    let policy = ctx.options.call_policy;
    let total = state.raw_items.len();

    let results = fan_out(state.raw_items.clone(), ctx.options.concurrency, |item| {
        let parser = parser.clone();
        async move {
            let parsed =
                call_with_policy(&policy, parser.name(), || parser.parse(&item)).await;
            (item, parsed)
        }
    })
    .await;

    let mut next_id = 1u32;
    let mut candidates = Vec::with_capacity(total);
    for (index, result) in results.into_iter().enumerate() {
        ctx.progress.candidate_done(StageName::Parse, index + 1, total);
        let origin = state.raw_items[index].origin.clone();
        match result {
            Ok((item, Ok(parsed))) => {
                let id = CandidateId(next_id);
                next_id += 1;
                debug!(candidate_id = %id, name = %parsed.name, "parsed resume");
                candidates.push(Candidate::from_parsed(id, parsed, item.origin));
            }
            Ok((_, Err(e))) => {
                warn!(%origin, error = %e, "resume could not be parsed");
                state.record(RunError::new(
                    StageName::Parse,
                    ErrorKind::Parse,
                    format!("{origin}: {e}"),
                ));
            }
            Err(panic) => {
                warn!(%origin, error = %panic, "parse worker failed");
                state.record(RunError::new(
                    StageName::Parse,
                    ErrorKind::Parse,
                    format!("{origin}: {panic}"),
                ));
            }
        }
    }

    info!(candidates = candidates.len(), failed = total - candidates.len(), "parse complete");
    state.candidates = candidates;
    Ok(state)
}
