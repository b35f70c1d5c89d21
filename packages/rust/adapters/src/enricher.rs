//! Profile enrichment: a profile-data API (primary) and offline inference (fallback).

use async_trait::async_trait;
use hireflow_shared::{Candidate, EnrichmentFields, HireflowError, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::capability::{FallbackEnricher, ProfileEnricher};
use crate::http::{check_status, read_json, send_error};

/// Skills that mark a profile as AI-focused when inferring an industry.
const AI_SKILLS: &[&str] = &[
    "ai",
    "machine learning",
    "deep learning",
    "nlp",
    "computer vision",
    "data science",
];

// ---------------------------------------------------------------------------
// ProfileApiEnricher
// ---------------------------------------------------------------------------

/// Looks up a candidate's public profile through a profile-data API.
pub struct ProfileApiEnricher {
    client: Client,
    api_url: Url,
    api_key: Option<String>,
    profile_host: String,
}

impl ProfileApiEnricher {
    pub fn new(
        client: Client,
        api_url: &str,
        api_key: Option<String>,
        profile_host: impl Into<String>,
    ) -> Result<Self> {
        let api_url = Url::parse(api_url).map_err(|e| {
            HireflowError::config(format!("invalid profile_api_url {api_url:?}: {e}"))
        })?;
        Ok(Self {
            client,
            api_url,
            api_key,
            profile_host: profile_host.into(),
        })
    }

    fn profile_url(&self, candidate: &Candidate) -> Option<Url> {
        let raw = candidate.profile_url.as_deref()?;
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?;
        let matches = host == self.profile_host || host.ends_with(&format!(".{}", self.profile_host));
        matches.then_some(url)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ProfileEnricher for ProfileApiEnricher {
    fn precondition(&self, candidate: &Candidate) -> bool {
        self.profile_url(candidate).is_some()
    }

    #[instrument(skip_all, fields(candidate_id = %candidate.id))]
    async fn enrich_primary(&self, candidate: &Candidate) -> Result<EnrichmentFields> {
        let Some(profile_url) = self.profile_url(candidate) else {
            return Err(HireflowError::Unavailable(format!(
                "no {} profile reference",
                self.profile_host
            )));
        };

        let mut request = self
            .client
            .get(self.api_url.as_str())
            .query(&[("url", profile_url.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;
        let body: Value = read_json(self.name(), response).await?;

        let profile = body
            .get("data")
            .or_else(|| body.get("profile"))
            .unwrap_or(&body);
        let Some(object) = profile.as_object().filter(|o| !o.is_empty()) else {
            return Err(HireflowError::Unavailable("profile API returned no data".into()));
        };

        let mut fields: EnrichmentFields = object
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (format!("profile_{k}"), s)))
            .collect();

        let profile_email = object
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_lowercase);
        let candidate_email = candidate.contact.email.as_deref().map(str::to_lowercase);
        let verified = matches!((&profile_email, &candidate_email), (Some(p), Some(c)) if p == c);

        fields.insert("profile_url".into(), profile_url.to_string());
        fields.insert("profile_verified".into(), verified.to_string());
        debug!(verified, field_count = fields.len(), "profile enrichment succeeded");
        Ok(fields)
    }

    fn name(&self) -> &str {
        "profile API"
    }
}

// ---------------------------------------------------------------------------
// InferredProfileEnricher
// ---------------------------------------------------------------------------

/// Career level bucket for a number of years of experience.
pub fn career_level(years: u32) -> &'static str {
    match years {
        0..=1 => "Junior",
        2..=4 => "Mid-level",
        5..=9 => "Senior",
        _ => "Executive",
    }
}

/// Synthesizes profile fields from data the candidate already carries.
///
/// Deterministic and offline; never fails for input-format reasons.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferredProfileEnricher;

impl InferredProfileEnricher {
    pub fn infer(candidate: &Candidate) -> EnrichmentFields {
        let level = career_level(candidate.experience_years);
        let role = candidate
            .current_role
            .clone()
            .unwrap_or_else(|| "Professional".to_string());
        let top_skills: Vec<&str> = candidate.skills.iter().take(5).map(String::as_str).collect();
        let competencies: Vec<&str> = candidate.skills.iter().take(10).map(String::as_str).collect();

        let ai_focused = candidate
            .skills
            .iter()
            .any(|s| AI_SKILLS.contains(&s.to_lowercase().as_str()));
        let industry = if ai_focused {
            "Artificial Intelligence"
        } else if candidate.skills.is_empty() {
            "General"
        } else {
            "Software Development"
        };

        let headline = if top_skills.is_empty() {
            format!("{level} {role}")
        } else {
            format!("{level} {role} | {}", top_skills.join(" · "))
        };

        let mut summary = format!(
            "{level} {} with {} years of experience",
            role.to_lowercase(),
            candidate.experience_years
        );
        if let Some(company) = &candidate.company {
            summary.push_str(&format!(", currently at {company}"));
        }
        if !top_skills.is_empty() {
            summary.push_str(&format!(", skilled in {}", top_skills.join(", ")));
        }
        summary.push('.');

        let value = match top_skills.first() {
            Some(skill) => format!("Brings {level} {skill} expertise to {industry} teams"),
            None => format!("Brings {level} experience to {industry} teams"),
        };

        let mut fields = EnrichmentFields::new();
        fields.insert("headline".into(), headline);
        fields.insert("industry".into(), industry.into());
        fields.insert("summary".into(), summary);
        fields.insert("key_competencies".into(), competencies.join(", "));
        fields.insert("career_level".into(), level.into());
        fields.insert("professional_value".into(), value);
        fields
    }
}

#[async_trait]
impl FallbackEnricher for InferredProfileEnricher {
    async fn enrich_fallback(&self, candidate: &Candidate) -> Result<EnrichmentFields> {
        Ok(Self::infer(candidate))
    }

    fn name(&self) -> &str {
        "inferred profile"
    }
}
