//! Capability interfaces and built-in adapters for external collaborators.
//!
//! This crate provides:
//! - [`capability`]: the narrow async traits the pipeline engine consumes
//! - [`source`]: resume sources (local inbox, remote HTTP feed)
//! - [`parser`]: text, JSON, PDF and chat-model resume parsing
//! - [`enricher`]: profile API enrichment and offline inference fallback
//! - [`scorer`]: heuristic and chat-completion scoring, with fallback
//! - [`scheduler`]: `.ics` file and calendar API event creation
//! - [`exporter`]: table (local sheet, sheets API) and CSV export

pub mod capability;
mod chat;
pub mod enricher;
pub mod exporter;
mod http;
pub mod parser;
pub mod scheduler;
pub mod scorer;
pub mod source;

pub use capability::{
    FallbackEnricher, FlatFileExporter, ProfileEnricher, ResumeParser, Scheduler, Scorer, Source,
    TableExporter,
};
pub use enricher::{InferredProfileEnricher, ProfileApiEnricher, career_level};
pub use exporter::{CsvFileExporter, LocalSheetExporter, SheetsApiExporter, to_csv};
pub use http::build_client;
pub use parser::{ChatCompletionParser, TextResumeParser};
pub use scheduler::{CalendarApiScheduler, IcsFileScheduler};
pub use scorer::{ChatCompletionScorer, FallbackScorer, HeuristicScorer};
pub use source::{DirectoryInbox, HttpFeedSource};
