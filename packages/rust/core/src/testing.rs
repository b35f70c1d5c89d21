//! Deterministic capability doubles shared by the core tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hireflow_adapters::{
    FallbackEnricher, FlatFileExporter, InferredProfileEnricher, ProfileEnricher, Scheduler,
    Scorer, Source, TableExporter, TextResumeParser,
};
use hireflow_shared::{
    Candidate, CandidateId, Contact, EnrichmentFields, HireflowError, InterviewSlot, RawItem,
    Result, RowSet, RunConfig, ScheduledEvent, ScoreCriteria, ScoreOutcome,
};
use uuid::Uuid;

use crate::pipeline::{Capabilities, Pipeline, PipelineOptions, SilentProgress};
use crate::report::FinalReport;
use crate::retry::CallPolicy;
use crate::state::PipelineState;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn raw_text(text: &str) -> RawItem {
    RawItem::new("test", "resume.txt", "text/plain", text.as_bytes().to_vec())
}

/// A parseable plain-text resume for `name`.
pub fn raw_resume(name: &str) -> RawItem {
    let handle = name.to_lowercase().replace(' ', ".");
    raw_text(&format!(
        "{name}\nEmail: {handle}@example.com\nSkills: Python, SQL\n4 years of experience\n"
    ))
}

pub fn candidate_with_profile(id: u32, profile_url: Option<&str>) -> Candidate {
    Candidate {
        id: CandidateId(id),
        name: format!("Candidate {id}"),
        contact: Contact {
            email: Some(format!("c{id}@example.com")),
            phone: None,
        },
        skills: vec!["Python".into()],
        experience_years: 3,
        resume_source_ref: format!("test:{id}"),
        profile_url: profile_url.map(str::to_string),
        current_role: None,
        company: None,
        location: None,
        enrichment: Default::default(),
        score: None,
        rationale: None,
        scheduling: None,
    }
}

pub fn candidate_with_score(id: u32, score: Option<f64>) -> Candidate {
    let mut c = candidate_with_profile(id, None);
    c.score = score;
    c.rationale = score.map(|s| format!("scored {s}"));
    c
}

pub fn state_with(candidates: Vec<Candidate>) -> PipelineState {
    let mut state = PipelineState::new(RunConfig::new(false, 10, 5.0).unwrap());
    state.candidates = candidates;
    state
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub struct VecSource {
    items: Vec<RawItem>,
    fail: bool,
}

impl VecSource {
    pub fn new(items: Vec<RawItem>) -> Arc<Self> {
        Arc::new(Self { items, fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            items: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl Source for VecSource {
    async fn fetch(&self, max_items: usize) -> Result<Vec<RawItem>> {
        if self.fail {
            return Err(HireflowError::connectivity("vec source", "HTTP 401"));
        }
        Ok(self.items.iter().take(max_items).cloned().collect())
    }

    fn name(&self) -> &str {
        "vec source"
    }
}

// ---------------------------------------------------------------------------
// Enrichers
// ---------------------------------------------------------------------------

pub enum PrimaryBehavior {
    Succeed,
    Unavailable,
    Hang,
}

/// Precondition: the candidate has any profile URL.
pub struct FakePrimary {
    behavior: PrimaryBehavior,
    calls: AtomicUsize,
}

impl FakePrimary {
    pub fn new(behavior: PrimaryBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileEnricher for FakePrimary {
    fn precondition(&self, candidate: &Candidate) -> bool {
        candidate.profile_url.is_some()
    }

    async fn enrich_primary(&self, candidate: &Candidate) -> Result<EnrichmentFields> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            PrimaryBehavior::Succeed => {
                let mut fields = EnrichmentFields::new();
                fields.insert("profile_url".into(), candidate.profile_url.clone().unwrap_or_default());
                fields.insert("profile_verified".into(), "true".into());
                Ok(fields)
            }
            PrimaryBehavior::Unavailable => Err(HireflowError::Unavailable("no profile data".into())),
            PrimaryBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(EnrichmentFields::new())
            }
        }
    }

    fn name(&self) -> &str {
        "fake primary"
    }
}

pub struct FakeFallback {
    fail: bool,
}

impl FakeFallback {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl FallbackEnricher for FakeFallback {
    async fn enrich_fallback(&self, candidate: &Candidate) -> Result<EnrichmentFields> {
        if self.fail {
            return Err(HireflowError::Unavailable("fallback offline".into()));
        }
        let mut fields = EnrichmentFields::new();
        fields.insert("headline".into(), candidate.name.clone());
        Ok(fields)
    }

    fn name(&self) -> &str {
        "fake fallback"
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores by candidate name. Unknown names fail; the name `Panic` panics.
pub struct ScriptedScorer {
    scores: HashMap<String, f64>,
}

impl ScriptedScorer {
    pub fn new(scores: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        })
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn score(&self, candidate: &Candidate, _criteria: &ScoreCriteria) -> Result<ScoreOutcome> {
        if candidate.name == "Panic" {
            panic!("scorer blew up on {}", candidate.id);
        }
        match self.scores.get(&candidate.name) {
            Some(score) => Ok(ScoreOutcome {
                score: *score,
                rationale: format!("scripted {score}"),
            }),
            None => Err(HireflowError::Rejected(format!("no script for {}", candidate.name))),
        }
    }

    fn name(&self) -> &str {
        "scripted scorer"
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct CountingScheduler {
    fail_for: Vec<String>,
    calls: AtomicUsize,
}

impl CountingScheduler {
    pub fn new(fail_for: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scheduler for CountingScheduler {
    async fn create_event(&self, candidate: &Candidate, slot: &InterviewSlot) -> Result<ScheduledEvent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.contains(&candidate.name) {
            return Err(HireflowError::Rejected("calendar refused the event".into()));
        }
        Ok(ScheduledEvent {
            event_id: format!("evt-{}", candidate.id),
            link: format!("https://cal.test/{}/{}", candidate.id, slot.start.format("%Y%m%d%H%M")),
        })
    }

    fn name(&self) -> &str {
        "counting scheduler"
    }
}

// ---------------------------------------------------------------------------
// Exporters
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSheets {
    fail: bool,
    sheets: Mutex<Vec<(String, RowSet)>>,
}

impl RecordingSheets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn titles(&self) -> Vec<String> {
        self.sheets.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// The last sheet whose title starts with `prefix`.
    pub fn sheet(&self, prefix: &str) -> Option<RowSet> {
        self.sheets
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t.starts_with(prefix))
            .map(|(_, rows)| rows.clone())
    }
}

#[async_trait]
impl TableExporter for RecordingSheets {
    async fn create_sheet(&self, title: &str, rows: &RowSet) -> Result<String> {
        if self.fail {
            return Err(HireflowError::Rejected("sheets quota exceeded".into()));
        }
        let mut sheets = self.sheets.lock().unwrap();
        sheets.push((title.to_string(), rows.clone()));
        Ok(format!("https://sheets.test/{}", sheets.len()))
    }

    fn name(&self) -> &str {
        "recording sheets"
    }
}

#[derive(Default)]
pub struct RecordingCsv {
    fail: bool,
    written: Mutex<Vec<(PathBuf, RowSet)>>,
}

impl RecordingCsv {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn written(&self) -> Vec<(PathBuf, RowSet)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlatFileExporter for RecordingCsv {
    async fn write_csv(&self, path: &Path, rows: &RowSet) -> Result<PathBuf> {
        if self.fail {
            return Err(HireflowError::io(path, std::io::Error::other("disk full")));
        }
        self.written.lock().unwrap().push((path.to_path_buf(), rows.clone()));
        Ok(path.to_path_buf())
    }

    fn name(&self) -> &str {
        "recording csv"
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A pipeline wired to in-memory doubles plus the real parser and fallback.
pub struct Harness {
    pub source: Option<Arc<VecSource>>,
    pub inbox: Arc<VecSource>,
    pub primary: Option<Arc<FakePrimary>>,
    pub scorer: Arc<ScriptedScorer>,
    pub scheduler: Arc<CountingScheduler>,
    pub sheets: Arc<RecordingSheets>,
    pub csv: Arc<RecordingCsv>,
    pub output_dir: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            source: None,
            inbox: VecSource::new(Vec::new()),
            primary: None,
            scorer: ScriptedScorer::new(&[]),
            scheduler: CountingScheduler::new(&[]),
            sheets: RecordingSheets::new(),
            csv: RecordingCsv::new(),
            output_dir: std::env::temp_dir().join(format!("hireflow_core_{}", Uuid::now_v7())),
        }
    }

    pub fn with_inbox(mut self, items: Vec<RawItem>) -> Self {
        self.inbox = VecSource::new(items);
        self
    }

    pub fn with_source(mut self, source: Arc<VecSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_primary(mut self) -> Self {
        self.primary = Some(FakePrimary::new(PrimaryBehavior::Succeed));
        self
    }

    pub fn with_scores(mut self, scores: &[(&str, f64)]) -> Self {
        self.scorer = ScriptedScorer::new(scores);
        self
    }

    pub fn with_scheduler_failing_for(mut self, names: &[&str]) -> Self {
        self.scheduler = CountingScheduler::new(names);
        self
    }

    pub fn with_sheets(mut self, sheets: Arc<RecordingSheets>) -> Self {
        self.sheets = sheets;
        self
    }

    pub fn with_csv(mut self, csv: Arc<RecordingCsv>) -> Self {
        self.csv = csv;
        self
    }

    pub fn pipeline(&self) -> Pipeline {
        let caps = Capabilities {
            source: self.source.clone().map(|s| s as Arc<dyn Source>),
            inbox: self.inbox.clone(),
            parser: Arc::new(TextResumeParser::new()),
            primary_enricher: self.primary.clone().map(|p| p as Arc<dyn ProfileEnricher>),
            fallback_enricher: Arc::new(InferredProfileEnricher),
            scorer: self.scorer.clone(),
            scheduler: self.scheduler.clone(),
            table_exporter: self.sheets.clone(),
            flat_file_exporter: self.csv.clone(),
        };
        let options = PipelineOptions {
            concurrency: 3,
            call_policy: CallPolicy {
                timeout: Duration::from_secs(2),
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            },
            output_dir: self.output_dir.clone(),
            ..PipelineOptions::default()
        };
        Pipeline::new(caps, options)
    }

    pub async fn run(&self, config: RunConfig) -> FinalReport {
        self.pipeline().run(config, &SilentProgress).await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.output_dir);
    }
}
