//! Resume parsing.
//!
//! [`TextResumeParser`] handles JSON resumes and plain-text/Markdown
//! resumes with pattern matching. [`ChatCompletionParser`] asks a chat model
//! for structured fields and falls back to the text parser when the model
//! fails. PDF payloads are reduced to their text layer first.

use std::sync::LazyLock;

use async_trait::async_trait;
use hireflow_shared::{Contact, HireflowError, ParsedResume, RawItem, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::capability::ResumeParser;
use crate::chat::{ChatClient, extract_json_object};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+|\b)\d[\d \t().-]{7,}\d\b").expect("valid regex")
});

static DEFAULT_PROFILE_RE: LazyLock<Regex> =
    LazyLock::new(|| profile_regex(DEFAULT_PROFILE_HOST).expect("valid regex"));

static YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\+?\s*(?:years?|yrs?)\b").expect("valid regex")
});

static SKILLS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:[#*-]+\s*)?(?:technical\s+)?skills\s*:?\s*(.*)$").expect("valid regex")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(role|title|company|location)\s*:\s*(.+)$").expect("valid regex")
});

const DEFAULT_PROFILE_HOST: &str = "linkedin.com";

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

fn profile_regex(host: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?i)(?:https?://)?(?:[a-z0-9-]+\.)*{}/[^\s)>\]]+",
        regex::escape(host.trim())
    ))
}

/// Phone-shaped matches need enough digits to dial and must not be a run of
/// years such as `2019 - 2023`.
fn looks_like_phone(candidate: &str) -> bool {
    let groups: Vec<&str> = candidate
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .collect();
    let digits: usize = groups.iter().map(|g| g.len()).sum();
    let year_run = groups
        .iter()
        .all(|g| g.len() == 4 && (g.starts_with("19") || g.starts_with("20")));
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) && !year_run
}

fn find_phone(text: &str) -> Option<String> {
    PHONE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|m| looks_like_phone(m))
        .map(String::from)
}

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// Concatenate the text layer of every page, one block per line.
pub(crate) fn extract_pdf_text(bytes: &[u8], file_name: &str) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| HireflowError::parse(format!("{file_name}: unreadable PDF: {e}")))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => debug!(file_name, page_num, error = %e, "skipping page without text"),
        }
    }

    if text.trim().is_empty() {
        return Err(HireflowError::parse(format!(
            "{file_name}: PDF has no extractable text"
        )));
    }
    Ok(text)
}

fn is_pdf(item: &RawItem) -> bool {
    item.media_type == "application/pdf" || item.content.starts_with(b"%PDF")
}

/// Decode a raw item to text, returning the media type to parse it as.
fn item_text(item: &RawItem) -> Result<(String, &str)> {
    if is_pdf(item) {
        return Ok((extract_pdf_text(&item.content, &item.file_name)?, "text/plain"));
    }
    let text = std::str::from_utf8(&item.content).map_err(|_| {
        HireflowError::parse(format!("{}: content is not valid UTF-8", item.file_name))
    })?;
    Ok((text.to_string(), item.media_type.as_str()))
}

fn is_json(text: &str, media_type: &str) -> bool {
    media_type == "application/json" || text.trim_start().starts_with('{')
}

fn validated(parsed: ParsedResume) -> Result<ParsedResume> {
    if parsed.name.is_empty() {
        return Err(HireflowError::parse("no candidate name found"));
    }
    if parsed.contact.is_empty() {
        return Err(HireflowError::parse(format!(
            "no contact details found for {}",
            parsed.name
        )));
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// TextResumeParser
// ---------------------------------------------------------------------------

/// Parses JSON resumes and plain-text/Markdown resumes.
#[derive(Debug, Clone)]
pub struct TextResumeParser {
    profile_re: Regex,
}

impl Default for TextResumeParser {
    fn default() -> Self {
        Self {
            profile_re: DEFAULT_PROFILE_RE.clone(),
        }
    }
}

impl TextResumeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognize profile links on `host` (and its subdomains) instead of the
    /// default professional network.
    pub fn with_profile_host(host: &str) -> Result<Self> {
        let profile_re = profile_regex(host)
            .map_err(|e| HireflowError::config(format!("invalid profile_host {host:?}: {e}")))?;
        Ok(Self { profile_re })
    }

    /// Parse already-decoded resume text.
    pub fn parse_text(&self, text: &str, media_type: &str) -> Result<ParsedResume> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(HireflowError::parse("resume is empty"));
        }

        let parsed = if is_json(trimmed, media_type) {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| HireflowError::parse(format!("invalid JSON resume: {e}")))?;
            from_json(&value)?
        } else {
            self.read_text(trimmed)
        };
        validated(parsed)
    }
}

#[async_trait]
impl ResumeParser for TextResumeParser {
    async fn parse(&self, item: &RawItem) -> Result<ParsedResume> {
        let (text, media_type) = item_text(item)?;
        self.parse_text(&text, media_type)
    }

    fn name(&self) -> &str {
        "text parser"
    }
}

// ---------------------------------------------------------------------------
// ChatCompletionParser
// ---------------------------------------------------------------------------

/// Extracts resume fields with an OpenAI-compatible chat model.
///
/// JSON resumes skip the model. A failed call or an answer without a usable
/// name and contact falls back to [`TextResumeParser`] for that item.
pub struct ChatCompletionParser {
    chat: ChatClient,
    fallback: TextResumeParser,
}

impl ChatCompletionParser {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        fallback: TextResumeParser,
    ) -> Self {
        Self {
            chat: ChatClient::new(client, endpoint, model, api_key),
            fallback,
        }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Extract the candidate's details from this resume and answer with one JSON object only:\n\
             {{\"full_name\": \"\", \"email\": \"\", \"phone\": \"\", \"location\": \"\", \
             \"current_role\": \"\", \"company\": \"\", \"years_of_experience\": 0, \
             \"skills\": [], \"linkedin_url\": \"\"}}\n\
             Use empty strings or empty arrays for anything the resume does not state.\n\n\
             Resume:\n{text}"
        )
    }

    async fn ask_model(&self, text: &str) -> Result<ParsedResume> {
        let content = self.chat.complete(self.name(), Self::prompt(text), 0.1).await?;
        let value = extract_json_object(&content)?;
        validated(from_json(&value)?)
    }
}

#[async_trait]
impl ResumeParser for ChatCompletionParser {
    #[instrument(skip_all, fields(file_name = %item.file_name, model = %self.chat.model()))]
    async fn parse(&self, item: &RawItem) -> Result<ParsedResume> {
        let (text, media_type) = item_text(item)?;
        if is_json(&text, media_type) {
            return self.fallback.parse_text(&text, media_type);
        }
        if text.trim().is_empty() {
            return Err(HireflowError::parse("resume is empty"));
        }

        match self.ask_model(&text).await {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!(error = %e, "model parse failed, using text parser");
                self.fallback.parse_text(&text, media_type)
            }
        }
    }

    fn name(&self) -> &str {
        "chat parser"
    }
}

// ---------------------------------------------------------------------------
// JSON resumes
// ---------------------------------------------------------------------------

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn from_json(value: &Value) -> Result<ParsedResume> {
    if !value.is_object() {
        return Err(HireflowError::parse("JSON resume must be an object"));
    }

    let skills = match value.get("skills") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(list)) => split_list(list),
        _ => Vec::new(),
    };

    let experience_years = ["years_of_experience", "experience_years"]
        .iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u32),
            Value::String(s) => first_number(s),
            _ => None,
        })
        .unwrap_or(0);

    Ok(ParsedResume {
        name: str_field(value, &["full_name", "name"]).unwrap_or_default(),
        contact: Contact {
            email: str_field(value, &["email"]),
            phone: str_field(value, &["phone"]),
        },
        skills,
        experience_years,
        profile_url: str_field(value, &["linkedin_url", "profile_url"]),
        current_role: str_field(value, &["current_role", "title"]),
        company: str_field(value, &["company"]),
        location: str_field(value, &["location"]),
    })
}

// ---------------------------------------------------------------------------
// Text resumes
// ---------------------------------------------------------------------------

impl TextResumeParser {
    fn read_text(&self, text: &str) -> ParsedResume {
        let name = text
            .lines()
            .map(|l| l.trim().trim_start_matches('#').trim())
            .find(|l| !l.is_empty())
            .filter(|l| !EMAIL_RE.is_match(l))
            .unwrap_or_default()
            .to_string();

        let skills = SKILLS_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| split_list(m.as_str()))
            .find(|list| !list.is_empty())
            .unwrap_or_default();

        let mut current_role = None;
        let mut company = None;
        let mut location = None;
        for cap in FIELD_RE.captures_iter(text) {
            let value = cap[2].trim().to_string();
            match cap[1].to_ascii_lowercase().as_str() {
                "role" | "title" => current_role = current_role.or(Some(value)),
                "company" => company = company.or(Some(value)),
                _ => location = location.or(Some(value)),
            }
        }

        ParsedResume {
            name,
            contact: Contact {
                email: EMAIL_RE.find(text).map(|m| m.as_str().to_string()),
                phone: find_phone(text),
            },
            skills,
            experience_years: YEARS_RE
                .captures(text)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0),
            profile_url: self.profile_re.find(text).map(|m| {
                let url = m.as_str().trim_end_matches(['.', ',', ';']);
                if url.starts_with("http") {
                    url.to_string()
                } else {
                    format!("https://{url}")
                }
            }),
            current_role,
            company,
            location,
        }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split([',', ';', '|', '•'])
        .map(|s| s.trim().trim_matches('.').trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn first_number(s: &str) -> Option<u32> {
    s.split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse().ok())
}
