//! Application configuration for hireflow.
//!
//! User config lives at `~/.hireflow/hireflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HireflowError, Result};
use crate::types::ScoreCriteria;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hireflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hireflow";

// ---------------------------------------------------------------------------
// Config structs (matching hireflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-run defaults.
    #[serde(default)]
    pub run: RunSection,

    /// Engine tuning.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Scoring criteria.
    #[serde(default)]
    pub criteria: ScoreCriteria,

    /// Where resumes come from.
    #[serde(default)]
    pub source: SourceSection,

    /// Primary enrichment settings.
    #[serde(default)]
    pub enrichment: EnrichmentSection,

    /// Resume parsing settings.
    #[serde(default)]
    pub parsing: ParsingSection,

    /// Scoring model settings.
    #[serde(default)]
    pub scoring: ScoringSection,

    /// Interview slot planning and calendar settings.
    #[serde(default)]
    pub scheduling: SchedulingSection,

    /// Spreadsheet export settings.
    #[serde(default)]
    pub export: ExportSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Fetch from the remote resume feed before reading the local inbox.
    /// Requires `[source] feed_url`.
    #[serde(default)]
    pub source_enabled: bool,

    /// Maximum number of raw items ingested per run.
    #[serde(default = "default_max_items")]
    pub max_items: u32,

    /// Inclusive shortlist threshold on the 0–10 scale.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            source_enabled: false,
            max_items: default_max_items(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_items() -> u32 {
    10
}
fn default_score_threshold() -> f64 {
    5.0
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Maximum concurrent per-candidate work units inside a stage.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Deadline for a single capability call attempt.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Directory receiving the CSV and JSON artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_call_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_output_dir() -> String {
    "~/hireflow-output".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Local directory scanned for resume files on every run.
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: String,

    /// Remote resume feed endpoint. Unset means no remote source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,

    /// Name of the env var holding the feed bearer token.
    #[serde(default = "default_feed_token_env")]
    pub feed_token_env: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            feed_url: None,
            feed_token_env: default_feed_token_env(),
        }
    }
}

fn default_inbox_dir() -> String {
    "~/hireflow-inbox".into()
}
fn default_feed_token_env() -> String {
    "HIREFLOW_FEED_TOKEN".into()
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Profile data API. Unset means every candidate takes the fallback path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_api_url: Option<String>,

    /// Host a profile URL must belong to for the primary path to apply.
    #[serde(default = "default_profile_host")]
    pub profile_host: String,

    /// Name of the env var holding the profile API key.
    #[serde(default = "default_profile_api_key_env")]
    pub api_key_env: String,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            profile_api_url: None,
            profile_host: default_profile_host(),
            api_key_env: default_profile_api_key_env(),
        }
    }
}

fn default_profile_host() -> String {
    "linkedin.com".into()
}
fn default_profile_api_key_env() -> String {
    "HIREFLOW_PROFILE_API_KEY".into()
}

/// `[parsing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingSection {
    /// Parse text and PDF resumes with the `[scoring]` chat model when its
    /// key is set. JSON resumes never go to the model.
    #[serde(default = "default_true")]
    pub use_chat_model: bool,
}

impl Default for ParsingSection {
    fn default() -> Self {
        Self {
            use_chat_model: true,
        }
    }
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSection {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_scoring_endpoint")]
    pub endpoint: String,

    /// Model name sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the scoring API key. When the variable
    /// is unset the offline heuristic scorer is used.
    #[serde(default = "default_scoring_api_key_env")]
    pub api_key_env: String,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            endpoint: default_scoring_endpoint(),
            model: default_model(),
            api_key_env: default_scoring_api_key_env(),
        }
    }
}

fn default_scoring_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_scoring_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}

/// `[scheduling]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSection {
    /// Length of one interview slot.
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,

    /// First bookable hour (inclusive).
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,

    /// End of business hours (exclusive).
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,

    /// Skip Saturdays and Sundays.
    #[serde(default = "default_true")]
    pub skip_weekends: bool,

    /// Calendar API endpoint. Unset means events are written as `.ics` files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_url: Option<String>,

    /// Name of the env var holding the calendar API token.
    #[serde(default = "default_calendar_token_env")]
    pub calendar_token_env: String,

    /// Directory for `.ics` files when no calendar API is configured.
    #[serde(default = "default_ics_dir")]
    pub ics_dir: String,
}

impl Default for SchedulingSection {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            day_start_hour: default_day_start_hour(),
            day_end_hour: default_day_end_hour(),
            skip_weekends: true,
            calendar_url: None,
            calendar_token_env: default_calendar_token_env(),
            ics_dir: default_ics_dir(),
        }
    }
}

fn default_duration_minutes() -> u32 {
    45
}
fn default_day_start_hour() -> u32 {
    9
}
fn default_day_end_hour() -> u32 {
    18
}
fn default_calendar_token_env() -> String {
    "HIREFLOW_CALENDAR_TOKEN".into()
}
fn default_ics_dir() -> String {
    "~/hireflow-output/invites".into()
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    /// Spreadsheet API endpoint. Unset means sheets are written locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheets_url: Option<String>,

    /// Name of the env var holding the spreadsheet API token.
    #[serde(default = "default_sheets_token_env")]
    pub sheets_token_env: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            sheets_url: None,
            sheets_token_env: default_sheets_token_env(),
        }
    }
}

fn default_sheets_token_env() -> String {
    "HIREFLOW_SHEETS_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Validated, immutable configuration of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunConfig {
    source_enabled: bool,
    max_items: u32,
    score_threshold: f64,
}

impl RunConfig {
    /// Build a run configuration, rejecting malformed values eagerly.
    pub fn new(source_enabled: bool, max_items: u32, score_threshold: f64) -> Result<Self> {
        if max_items == 0 {
            return Err(HireflowError::config("max_items must be at least 1"));
        }
        if !score_threshold.is_finite() {
            return Err(HireflowError::config("score_threshold must be a finite number"));
        }
        if !(0.0..=10.0).contains(&score_threshold) {
            return Err(HireflowError::config(format!(
                "score_threshold must be within [0, 10], got {score_threshold}"
            )));
        }
        Ok(Self {
            source_enabled,
            max_items,
            score_threshold,
        })
    }

    pub fn source_enabled(&self) -> bool {
        self.source_enabled
    }

    pub fn max_items(&self) -> u32 {
        self.max_items
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }
}

impl TryFrom<&AppConfig> for RunConfig {
    type Error = HireflowError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.run.source_enabled,
            config.run.max_items,
            config.run.score_threshold,
        )
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hireflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HireflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hireflow/hireflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HireflowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HireflowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HireflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = render_config(&AppConfig::default())?;

    std::fs::write(&path, content).map_err(|e| HireflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Serialize a config to pretty TOML.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| HireflowError::config(e.to_string()))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Read a secret from the env var named in config. Unset or empty is `None`.
pub fn read_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that the env var named in config is set and non-empty.
pub fn validate_api_key(var_name: &str, what: &str) -> Result<String> {
    read_secret(var_name).ok_or_else(|| {
        HireflowError::config(format!(
            "{what} credentials not found. Set the {var_name} environment variable."
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = render_config(&config).expect("serialize default config");
        assert!(toml_str.contains("score_threshold"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("required_skills"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = render_config(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.run.max_items, 10);
        assert_eq!(parsed.pipeline.max_retries, 3);
        assert_eq!(parsed.scheduling.duration_minutes, 45);
        assert_eq!(parsed.criteria.min_experience_years, 2);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[run]
score_threshold = 7.5

[source]
feed_url = "https://feed.example.com/resumes"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.run.score_threshold, 7.5);
        assert!(!config.run.source_enabled);
        assert_eq!(
            config.source.feed_url.as_deref(),
            Some("https://feed.example.com/resumes")
        );
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.enrichment.profile_host, "linkedin.com");
        assert!(config.parsing.use_chat_model);
    }

    #[test]
    fn run_config_from_app_config() {
        let app = AppConfig::default();
        let run = RunConfig::try_from(&app).expect("valid defaults");
        assert!(!run.source_enabled());
        assert_eq!(run.max_items(), 10);
        assert_eq!(run.score_threshold(), 5.0);
    }

    #[test]
    fn run_config_rejects_malformed_values() {
        assert!(matches!(
            RunConfig::new(true, 0, 5.0),
            Err(HireflowError::Config { .. })
        ));
        assert!(RunConfig::new(true, 5, f64::NAN).is_err());
        assert!(RunConfig::new(true, 5, f64::INFINITY).is_err());
        assert!(RunConfig::new(true, 5, -0.1).is_err());
        assert!(RunConfig::new(true, 5, 10.5).is_err());
        assert!(RunConfig::new(false, 1, 0.0).is_ok());
        assert!(RunConfig::new(false, 1, 10.0).is_ok());
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/out"), PathBuf::from("/tmp/out"));
        assert!(!expand_home("~/out").to_string_lossy().starts_with('~'));
    }

    #[test]
    fn api_key_validation() {
        // Use a unique env var name to avoid interfering with other tests
        let result = validate_api_key("HF_TEST_NONEXISTENT_KEY_12345", "Scoring");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("credentials not found")
        );
    }
}
