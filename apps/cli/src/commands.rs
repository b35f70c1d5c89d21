//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use hireflow_adapters::{
    CalendarApiScheduler, ChatCompletionParser, ChatCompletionScorer, CsvFileExporter,
    DirectoryInbox, FallbackEnricher, FallbackScorer, HeuristicScorer, HttpFeedSource,
    IcsFileScheduler, InferredProfileEnricher, LocalSheetExporter, ProfileApiEnricher,
    ProfileEnricher, ResumeParser, Scheduler, Scorer, SheetsApiExporter, Source, TableExporter,
    TextResumeParser, build_client,
};
use hireflow_core::{
    Capabilities, FinalReport, Pipeline, PipelineOptions, ProgressReporter, StageGraph, StageName,
};
use hireflow_shared::{
    AppConfig, RunConfig, expand_home, init_config, load_config, load_config_from, read_secret,
    render_config, validate_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// hireflow: screen, score, and schedule candidates.
#[derive(Parser)]
#[command(
    name = "hireflow",
    version,
    about = "Run resumes through parsing, enrichment, scoring, scheduling, and export.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.hireflow/hireflow.toml.
    #[arg(long, env = "HIREFLOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which scorer to use.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum ScorerChoice {
    /// Chat model when its API key is set, heuristic otherwise.
    #[default]
    Auto,
    Heuristic,
    Chat,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the candidate pipeline once.
    Run(RunArgs),

    /// Print the stage graph.
    Graph,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Fetch from the remote resume feed before reading the inbox.
    #[arg(long, conflicts_with = "no_source")]
    pub source: bool,

    /// Only read the local inbox.
    #[arg(long)]
    pub no_source: bool,

    /// Maximum number of resumes to ingest.
    #[arg(long)]
    pub max_items: Option<u32>,

    /// Minimum score (0–10, inclusive) for the shortlist.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Local resume directory.
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// Where CSV/JSON artifacts and local sheets are written.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Scoring backend. Model-backed resume parsing follows the same choice.
    #[arg(long, value_enum, default_value_t = ScorerChoice::Auto)]
    pub scorer: ScorerChoice,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hireflow=info",
        1 => "hireflow=debug",
        _ => "hireflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_ref(), &args).await,
        Command::Graph => cmd_graph(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_ref()),
        },
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// CLI flags override file values.
fn run_config(config: &AppConfig, args: &RunArgs) -> Result<RunConfig> {
    let source_enabled = if args.source {
        true
    } else if args.no_source {
        false
    } else {
        config.run.source_enabled
    };
    Ok(RunConfig::new(
        source_enabled,
        args.max_items.unwrap_or(config.run.max_items),
        args.threshold.unwrap_or(config.run.score_threshold),
    )?)
}

// ---------------------------------------------------------------------------
// Capability wiring
// ---------------------------------------------------------------------------

/// The chat model key for this run, if the chosen scorer allows the model.
fn chat_key(config: &AppConfig, choice: ScorerChoice) -> Result<Option<String>> {
    let env = &config.scoring.api_key_env;
    Ok(match choice {
        ScorerChoice::Heuristic => None,
        ScorerChoice::Chat => Some(validate_api_key(env, "Scoring")?),
        ScorerChoice::Auto => read_secret(env),
    })
}

fn build_scorer(config: &AppConfig, client: &Client, key: Option<&str>) -> Arc<dyn Scorer> {
    let scoring = &config.scoring;
    match key {
        Some(key) => {
            info!(model = %scoring.model, "using chat-completion scorer with heuristic fallback");
            let chat = ChatCompletionScorer::new(
                client.clone(),
                scoring.endpoint.clone(),
                scoring.model.clone(),
                key,
            );
            Arc::new(FallbackScorer::new(Arc::new(chat)))
        }
        None => {
            info!("using heuristic scorer");
            Arc::new(HeuristicScorer)
        }
    }
}

fn build_parser(
    config: &AppConfig,
    client: &Client,
    key: Option<&str>,
) -> Result<Arc<dyn ResumeParser>> {
    let text = TextResumeParser::with_profile_host(&config.enrichment.profile_host)?;
    let parser: Arc<dyn ResumeParser> = match key {
        Some(key) if config.parsing.use_chat_model => {
            info!(model = %config.scoring.model, "using chat-model resume parser");
            Arc::new(ChatCompletionParser::new(
                client.clone(),
                config.scoring.endpoint.clone(),
                config.scoring.model.clone(),
                key,
                text,
            ))
        }
        _ => Arc::new(text),
    };
    Ok(parser)
}

fn build_capabilities(
    config: &AppConfig,
    args: &RunArgs,
    output_dir: &std::path::Path,
) -> Result<Capabilities> {
    let client = build_client(Duration::from_secs(config.pipeline.call_timeout_secs))?;
    let key = chat_key(config, args.scorer)?;

    let source: Option<Arc<dyn Source>> = match &config.source.feed_url {
        Some(url) => Some(Arc::new(HttpFeedSource::new(
            client.clone(),
            url,
            read_secret(&config.source.feed_token_env),
        )?)),
        None => None,
    };
    let inbox_dir = args
        .inbox
        .clone()
        .unwrap_or_else(|| expand_home(&config.source.inbox_dir));

    let primary_enricher: Option<Arc<dyn ProfileEnricher>> = match &config.enrichment.profile_api_url {
        Some(url) => Some(Arc::new(ProfileApiEnricher::new(
            client.clone(),
            url,
            read_secret(&config.enrichment.api_key_env),
            config.enrichment.profile_host.clone(),
        )?)),
        None => None,
    };
    let fallback_enricher: Arc<dyn FallbackEnricher> = Arc::new(InferredProfileEnricher);

    let scheduler: Arc<dyn Scheduler> = match &config.scheduling.calendar_url {
        Some(url) => Arc::new(CalendarApiScheduler::new(
            client.clone(),
            url,
            read_secret(&config.scheduling.calendar_token_env),
        )?),
        None => Arc::new(IcsFileScheduler::new(expand_home(&config.scheduling.ics_dir))),
    };

    let table_exporter: Arc<dyn TableExporter> = match &config.export.sheets_url {
        Some(url) => Arc::new(SheetsApiExporter::new(
            client.clone(),
            url,
            read_secret(&config.export.sheets_token_env),
        )?),
        None => Arc::new(LocalSheetExporter::new(output_dir)),
    };

    Ok(Capabilities {
        source,
        inbox: Arc::new(DirectoryInbox::new(inbox_dir)),
        parser: build_parser(config, &client, key.as_deref())?,
        primary_enricher,
        fallback_enricher,
        scorer: build_scorer(config, &client, key.as_deref()),
        scheduler,
        table_exporter,
        flat_file_exporter: Arc::new(CsvFileExporter),
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&PathBuf>, args: &RunArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let run_config = run_config(&config, args)?;

    let mut options = PipelineOptions::from_config(&config)?;
    if let Some(dir) = &args.output_dir {
        options.output_dir = dir.clone();
    }
    let caps = build_capabilities(&config, args, &options.output_dir)?;

    info!(
        source_enabled = run_config.source_enabled(),
        max_items = run_config.max_items(),
        threshold = run_config.score_threshold(),
        "starting run"
    );

    let reporter = CliProgress::new();
    let report = Pipeline::new(caps, options).run(run_config, &reporter).await;

    print_report(&report);

    if report.exit_code() != 0 {
        let reason = report
            .errors
            .last()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown error".into());
        return Err(eyre!("pipeline run {} failed: {reason}", report.run_id));
    }
    Ok(())
}

fn print_report(report: &FinalReport) {
    let c = &report.counts;
    let route = report.route.map(|r| r.to_string()).unwrap_or_else(|| "-".into());

    println!();
    println!("  Run {} {}", report.run_id, report.status);
    println!("  Resumes:     {}", c.raw_items);
    println!("  Candidates:  {}", c.candidates);
    println!(
        "  Enriched:    {} primary, {} fallback, {} none",
        c.enriched_primary, c.enriched_fallback, c.unenriched
    );
    println!("  Scored:      {}", c.scored);
    println!("  Shortlisted: {}", c.shortlisted);
    println!("  Rejected:    {}", c.rejected);
    println!("  Scheduled:   {} (route: {route})", c.scheduled);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());

    let outputs = &report.outputs;
    if let Some(url) = &outputs.all_candidates_sheet_url {
        println!("  All candidates:     {url}");
    }
    if let Some(url) = &outputs.interview_sheet_url {
        println!("  Interview schedule: {url}");
    }
    if let Some(path) = &outputs.csv_path {
        println!("  Interview CSV:      {}", path.display());
    }
    if let Some(path) = &outputs.json_path {
        println!("  Snapshot:           {}", path.display());
    }
    for link in &outputs.calendar_links {
        println!("  Event:              {link}");
    }

    if !report.errors.is_empty() {
        println!();
        println!("  Errors ({}):", report.errors.len());
        for error in &report.errors {
            println!("    {error}");
        }
    }
    println!();
}

fn cmd_graph() -> Result<()> {
    print!("{}", StageGraph::standard().render());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = resolve_config(path)?;
    println!("{}", render_config(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageName) {
        self.spinner.set_message(stage.to_string());
    }

    fn candidate_done(&self, stage: StageName, current: usize, total: usize) {
        self.spinner.set_message(format!("{stage} [{current}/{total}]"));
    }

    fn done(&self, _report: &FinalReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["hireflow", "run"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn flags_override_file_values() {
        let config = AppConfig::default();
        let rc = run_config(&config, &args(&["--source", "--max-items", "3", "--threshold", "7.5"]))
            .unwrap();
        assert!(rc.source_enabled());
        assert_eq!(rc.max_items(), 3);
        assert_eq!(rc.score_threshold(), 7.5);
    }

    #[test]
    fn file_values_apply_without_flags() {
        let mut config = AppConfig::default();
        config.run.source_enabled = true;
        config.run.max_items = 7;
        let rc = run_config(&config, &args(&[])).unwrap();
        assert!(rc.source_enabled());
        assert_eq!(rc.max_items(), 7);

        let rc = run_config(&config, &args(&["--no-source"])).unwrap();
        assert!(!rc.source_enabled());
    }

    #[test]
    fn invalid_threshold_is_rejected_before_running() {
        let config = AppConfig::default();
        assert!(run_config(&config, &args(&["--threshold", "11"])).is_err());
        assert!(run_config(&config, &args(&["--max-items", "0"])).is_err());
    }

    #[test]
    fn source_flags_conflict() {
        assert!(Cli::try_parse_from(["hireflow", "run", "--source", "--no-source"]).is_err());
    }

    #[test]
    fn default_wiring_uses_local_adapters() {
        let config = AppConfig::default();
        let dir = std::env::temp_dir().join("hireflow_cli_wiring");
        let caps = build_capabilities(&config, &args(&["--scorer", "heuristic"]), &dir).unwrap();
        assert!(caps.source.is_none());
        assert!(caps.primary_enricher.is_none());
        assert_eq!(caps.scorer.name(), "heuristic scorer");
        assert_eq!(caps.parser.name(), "text parser");
        assert_eq!(caps.scheduler.name(), "ics scheduler");
    }

    #[test]
    fn chat_key_wires_model_backed_adapters() {
        let config = AppConfig::default();
        let client = build_client(Duration::from_secs(5)).unwrap();

        let scorer = build_scorer(&config, &client, Some("sk-test"));
        assert_eq!(scorer.name(), "chat scorer with heuristic fallback");
        let parser = build_parser(&config, &client, Some("sk-test")).unwrap();
        assert_eq!(parser.name(), "chat parser");

        let mut offline = AppConfig::default();
        offline.parsing.use_chat_model = false;
        let parser = build_parser(&offline, &client, Some("sk-test")).unwrap();
        assert_eq!(parser.name(), "text parser");
    }

    #[test]
    fn heuristic_choice_never_reads_the_key() {
        let config = AppConfig::default();
        assert!(chat_key(&config, ScorerChoice::Heuristic).unwrap().is_none());
    }
}
