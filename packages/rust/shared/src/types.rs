//! Core domain types for hireflow runs.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// CandidateId
// ---------------------------------------------------------------------------

/// Identifier assigned once, at extraction, in raw-item order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C-{:04}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RawItem
// ---------------------------------------------------------------------------

/// An opaque resume payload as delivered by a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Where the item came from (`feed:<id>` or a file path).
    pub origin: String,
    /// Original file name, used for media-type sniffing and reporting.
    pub file_name: String,
    /// Declared media type (`text/plain`, `application/json`, `application/pdf` …).
    pub media_type: String,
    /// Raw bytes.
    #[serde(skip)]
    pub content: Vec<u8>,
    /// SHA-256 of `content`, hex encoded.
    pub content_hash: String,
    /// When the source received the item, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl RawItem {
    pub fn new(
        origin: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        let content_hash = content_hash(&content);
        Self {
            origin: origin.into(),
            file_name: file_name.into(),
            media_type: media_type.into(),
            content,
            content_hash,
            received_at: None,
        }
    }

    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }
}

/// SHA-256 hex digest of a byte slice.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Guess a media type from a file extension.
pub fn media_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => "application/json",
        "md" => "text/markdown",
        "pdf" => "application/pdf",
        _ => "text/plain",
    }
}

// ---------------------------------------------------------------------------
// ParsedResume / Candidate
// ---------------------------------------------------------------------------

/// Contact channels extracted from a resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }
}

/// Structured fields a parser extracts from one raw item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResume {
    pub name: String,
    pub contact: Contact,
    pub skills: Vec<String>,
    pub experience_years: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Which enrichment path produced a candidate's fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    Primary,
    Fallback,
    #[default]
    None,
}

impl EnrichmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for EnrichmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrichment key/value pairs, ordered by key.
pub type EnrichmentFields = BTreeMap<String, String>;

/// Enrichment attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub source: EnrichmentSource,
    #[serde(default)]
    pub fields: EnrichmentFields,
}

/// A bookable interview slot in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSlot {
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
}

impl InterviewSlot {
    pub fn end(&self) -> NaiveDateTime {
        self.start + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// What a scheduler returns for a created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event_id: String,
    pub link: String,
}

/// Scheduling data attached to a shortlisted candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduling {
    pub event_id: String,
    pub link: String,
    pub slot: InterviewSlot,
}

/// One applicant moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub contact: Contact,
    pub skills: Vec<String>,
    pub experience_years: u32,
    /// Origin of the raw item this candidate was parsed from.
    pub resume_source_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub enrichment: Enrichment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<Scheduling>,
}

impl Candidate {
    /// Create a candidate from parsed fields. Downstream fields start empty.
    pub fn from_parsed(id: CandidateId, parsed: ParsedResume, source_ref: impl Into<String>) -> Self {
        Self {
            id,
            name: parsed.name,
            contact: parsed.contact,
            skills: parsed.skills,
            experience_years: parsed.experience_years,
            resume_source_ref: source_ref.into(),
            profile_url: parsed.profile_url,
            current_role: parsed.current_role,
            company: parsed.company,
            location: parsed.location,
            enrichment: Enrichment::default(),
            score: None,
            rationale: None,
            scheduling: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Criteria a candidate is scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCriteria {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_required_skills")]
    pub required_skills: Vec<String>,
    #[serde(default = "default_preferred_skills")]
    pub preferred_skills: Vec<String>,
    #[serde(default = "default_min_experience_years")]
    pub min_experience_years: u32,
    #[serde(default = "default_values")]
    pub values: Vec<String>,
}

impl Default for ScoreCriteria {
    fn default() -> Self {
        Self {
            role: default_role(),
            required_skills: default_required_skills(),
            preferred_skills: default_preferred_skills(),
            min_experience_years: default_min_experience_years(),
            values: default_values(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_role() -> String {
    "AI/Software Professional".into()
}
fn default_required_skills() -> Vec<String> {
    strings(&[
        "python",
        "machine learning",
        "ai",
        "data science",
        "software engineering",
        "algorithms",
    ])
}
fn default_preferred_skills() -> Vec<String> {
    strings(&[
        "react",
        "node.js",
        "leadership",
        "cloud computing",
        "project management",
        "deep learning",
        "nlp",
        "computer vision",
    ])
}
fn default_min_experience_years() -> u32 {
    2
}
fn default_values() -> Vec<String> {
    strings(&[
        "innovation",
        "impact",
        "collaboration",
        "continuous learning",
    ])
}

/// A scorer's verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub score: f64,
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// RowSet
// ---------------------------------------------------------------------------

/// A header row plus data rows, handed to table and flat-file exporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn candidate_id_display() {
        assert_eq!(CandidateId(7).to_string(), "C-0007");
        assert_eq!(CandidateId(12345).to_string(), "C-12345");
    }

    #[test]
    fn raw_item_hashes_content() {
        let a = RawItem::new("inbox/a.txt", "a.txt", "text/plain", b"Jane Doe".to_vec());
        let b = RawItem::new("feed:9", "b.txt", "text/plain", b"Jane Doe".to_vec());
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn media_type_sniffing() {
        assert_eq!(media_type_for("cv.PDF"), "application/pdf");
        assert_eq!(media_type_for("cv.json"), "application/json");
        assert_eq!(media_type_for("cv.md"), "text/markdown");
        assert_eq!(media_type_for("README"), "text/plain");
    }

    #[test]
    fn enrichment_source_serializes_snake_case() {
        let json = serde_json::to_string(&EnrichmentSource::Fallback).expect("serialize");
        assert_eq!(json, "\"fallback\"");
        assert_eq!(EnrichmentSource::default(), EnrichmentSource::None);
    }

    #[test]
    fn candidate_serialization() {
        let parsed = ParsedResume {
            name: "Ada Lovelace".into(),
            contact: Contact {
                email: Some("ada@example.com".into()),
                phone: None,
            },
            skills: vec!["python".into()],
            experience_years: 4,
            ..Default::default()
        };
        let mut candidate = Candidate::from_parsed(CandidateId(1), parsed, "inbox/ada.txt");
        candidate.score = Some(7.5);

        let json = serde_json::to_string_pretty(&candidate).expect("serialize");
        let back: Candidate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, candidate);
        assert!(!json.contains("scheduling"));
    }

    #[test]
    fn slot_end_adds_duration() {
        let start = chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid date");
        let slot = InterviewSlot {
            start,
            duration_minutes: 45,
        };
        assert_eq!(slot.end().format("%H:%M").to_string(), "09:45");
    }

    #[test]
    fn default_criteria() {
        let criteria = ScoreCriteria::default();
        assert_eq!(criteria.required_skills.len(), 6);
        assert_eq!(criteria.preferred_skills.len(), 8);
        assert_eq!(criteria.min_experience_years, 2);
    }
}
