//! Candidate scoring: an offline heuristic, an OpenAI-compatible chat model,
//! and a wrapper that falls back from the latter to the former.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hireflow_shared::{Candidate, HireflowError, Result, ScoreCriteria, ScoreOutcome};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::capability::Scorer;
use crate::chat::{ChatClient, extract_json_object};

const REQUIRED_SKILL_POINTS: f64 = 1.5;
const PREFERRED_SKILL_POINTS: f64 = 0.8;
// Per year of experience, not per listed job.
const EXPERIENCE_YEAR_POINTS: f64 = 0.5;
const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// HeuristicScorer
// ---------------------------------------------------------------------------

/// Skill-overlap scoring that needs no external service.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

fn lowered(items: &[String]) -> BTreeSet<String> {
    items.iter().map(|s| s.trim().to_lowercase()).collect()
}

fn list_or_none(items: &[&String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl HeuristicScorer {
    pub fn evaluate(candidate: &Candidate, criteria: &ScoreCriteria) -> ScoreOutcome {
        let skills = lowered(&candidate.skills);
        let required = lowered(&criteria.required_skills);
        let preferred = lowered(&criteria.preferred_skills);

        let required_matches: Vec<&String> = skills.intersection(&required).collect();
        let preferred_matches: Vec<&String> = skills.intersection(&preferred).collect();

        let raw = required_matches.len() as f64 * REQUIRED_SKILL_POINTS
            + preferred_matches.len() as f64 * PREFERRED_SKILL_POINTS
            + f64::from(candidate.experience_years) * EXPERIENCE_YEAR_POINTS;
        let score = ((raw * 10.0).round() / 10.0).min(MAX_SCORE);

        let rationale = format!(
            "Matched {}/{} required skills ({}), {}/{} preferred skills ({}), with {} years of experience{}.",
            required_matches.len(),
            required.len(),
            list_or_none(&required_matches),
            preferred_matches.len(),
            preferred.len(),
            list_or_none(&preferred_matches),
            candidate.experience_years,
            if candidate.experience_years < criteria.min_experience_years {
                format!(" (below the {} year minimum)", criteria.min_experience_years)
            } else {
                String::new()
            },
        );

        ScoreOutcome { score, rationale }
    }
}

#[async_trait]
impl Scorer for HeuristicScorer {
    async fn score(&self, candidate: &Candidate, criteria: &ScoreCriteria) -> Result<ScoreOutcome> {
        Ok(Self::evaluate(candidate, criteria))
    }

    fn name(&self) -> &str {
        "heuristic scorer"
    }
}

// ---------------------------------------------------------------------------
// ChatCompletionScorer
// ---------------------------------------------------------------------------

/// Scores through an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionScorer {
    chat: ChatClient,
}

impl ChatCompletionScorer {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            chat: ChatClient::new(client, endpoint, model, api_key),
        }
    }

    fn prompt(candidate: &Candidate, criteria: &ScoreCriteria) -> Result<String> {
        let criteria_json = serde_json::to_string_pretty(criteria)?;
        let candidate_json = serde_json::to_string_pretty(&json!({
            "name": candidate.name,
            "skills": candidate.skills,
            "experience_years": candidate.experience_years,
            "current_role": candidate.current_role,
            "company": candidate.company,
            "enrichment": candidate.enrichment.fields,
        }))?;
        Ok(format!(
            "Evaluate the candidate against these hiring criteria:\n{criteria_json}\n\n\
             Candidate:\n{candidate_json}\n\n\
             Answer with JSON only: {{\"score\": <0-10>, \"rationale\": \"<one paragraph>\"}}"
        ))
    }
}

/// Extract `{score, rationale}` from a model answer.
pub(crate) fn parse_answer(content: &str) -> Result<ScoreOutcome> {
    let value = extract_json_object(content)?;

    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| HireflowError::Rejected("model answer has no numeric score".into()))?;

    let rationale = value
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(ScoreOutcome { score, rationale })
}

#[async_trait]
impl Scorer for ChatCompletionScorer {
    #[instrument(skip_all, fields(candidate_id = %candidate.id, model = %self.chat.model()))]
    async fn score(&self, candidate: &Candidate, criteria: &ScoreCriteria) -> Result<ScoreOutcome> {
        let content = self
            .chat
            .complete(self.name(), Self::prompt(candidate, criteria)?, 0.3)
            .await?;
        let outcome = parse_answer(&content)?;
        debug!(score = outcome.score, "model scored candidate");
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "chat scorer"
    }
}

// ---------------------------------------------------------------------------
// FallbackScorer
// ---------------------------------------------------------------------------

/// Tries a primary scorer and falls back to the heuristic when it fails.
///
/// Retryable primary failures get `retries` more attempts with exponential
/// backoff before the fallback is used. Anything else falls back at once.
pub struct FallbackScorer {
    primary: Arc<dyn Scorer>,
    fallback: HeuristicScorer,
    retries: u32,
    base_delay: Duration,
}

impl FallbackScorer {
    pub fn new(primary: Arc<dyn Scorer>) -> Self {
        Self {
            primary,
            fallback: HeuristicScorer,
            retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, retries: u32, base_delay: Duration) -> Self {
        self.retries = retries;
        self.base_delay = base_delay;
        self
    }

    async fn try_primary(&self, candidate: &Candidate, criteria: &ScoreCriteria) -> Result<ScoreOutcome> {
        let mut attempt = 0;
        loop {
            match self.primary.score(candidate, criteria).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let backoff = self.base_delay * 2u32.saturating_pow(attempt);
                    let delay = e
                        .retry_after_ms()
                        .map(Duration::from_millis)
                        .map_or(backoff, |hint| hint.max(backoff));
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying primary scorer");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Scorer for FallbackScorer {
    async fn score(&self, candidate: &Candidate, criteria: &ScoreCriteria) -> Result<ScoreOutcome> {
        match self.try_primary(candidate, criteria).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(
                    candidate_id = %candidate.id,
                    primary = self.primary.name(),
                    error = %e,
                    "primary scoring failed, using heuristic"
                );
                self.fallback.score(candidate, criteria).await
            }
        }
    }

    fn name(&self) -> &str {
        "chat scorer with heuristic fallback"
    }
}

#[cfg(test)]
mod tests {
    use hireflow_shared::{CandidateId, Contact, ParsedResume};

    use super::*;
    use crate::http::build_client;

    fn candidate(skills: &[&str], years: u32) -> Candidate {
        Candidate::from_parsed(
            CandidateId(3),
            ParsedResume {
                name: "Linus".into(),
                contact: Contact {
                    email: Some("linus@example.com".into()),
                    phone: None,
                },
                skills: skills.iter().map(|s| s.to_string()).collect(),
                experience_years: years,
                ..Default::default()
            },
            "inbox/linus.txt",
        )
    }

    #[test]
    fn heuristic_formula() {
        let criteria = ScoreCriteria::default();
        // 2 required (3.0) + 1 preferred (0.8) + 3 years (1.5) = 5.3
        let outcome =
            HeuristicScorer::evaluate(&candidate(&["Python", "AI", "React", "Go"], 3), &criteria);
        assert!((outcome.score - 5.3).abs() < 1e-9);
        assert!(outcome.rationale.contains("2/6 required"));
        assert!(outcome.rationale.contains("1/8 preferred"));
    }

    #[test]
    fn heuristic_caps_at_ten() {
        let criteria = ScoreCriteria::default();
        let all: Vec<&str> = vec![
            "python",
            "machine learning",
            "ai",
            "data science",
            "software engineering",
            "algorithms",
        ];
        let outcome = HeuristicScorer::evaluate(&candidate(&all, 20), &criteria);
        assert_eq!(outcome.score, 10.0);
    }

    #[test]
    fn heuristic_notes_missing_experience() {
        let outcome = HeuristicScorer::evaluate(&candidate(&[], 1), &ScoreCriteria::default());
        assert_eq!(outcome.score, 0.5);
        assert!(outcome.rationale.contains("below the 2 year minimum"));
        assert!(outcome.rationale.contains("(none)"));
    }

    #[test]
    fn parse_answer_tolerates_fences() {
        let outcome =
            parse_answer("```json\n{\"score\": 8.7, \"rationale\": \"Strong ML.\"}\n```").unwrap();
        assert_eq!(outcome.score, 8.7);
        assert_eq!(outcome.rationale, "Strong ML.");

        let outcome = parse_answer("Sure! {\"score\": \"6\"}").unwrap();
        assert_eq!(outcome.score, 6.0);
        assert!(outcome.rationale.is_empty());

        assert!(parse_answer("no json here").is_err());
        assert!(parse_answer("{\"rationale\": \"x\"}").is_err());
    }

    #[tokio::test]
    async fn chat_scorer_calls_endpoint() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .and(wiremock::matchers::header("Authorization", "Bearer sk-test"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "{\"score\": 9.2, \"rationale\": \"Great fit\"}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scorer = ChatCompletionScorer::new(
            build_client(Duration::from_secs(5)).unwrap(),
            format!("{}/v1/chat/completions", server.uri()),
            "test-model",
            "sk-test",
        );
        let outcome = scorer
            .score(&candidate(&["python"], 4), &ScoreCriteria::default())
            .await
            .unwrap();
        assert_eq!(outcome.score, 9.2);
        assert_eq!(outcome.rationale, "Great fit");
    }

    #[tokio::test]
    async fn chat_scorer_rate_limit_is_retryable() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let scorer = ChatCompletionScorer::new(
            build_client(Duration::from_secs(5)).unwrap(),
            server.uri(),
            "test-model",
            "sk-test",
        );
        let err = scorer
            .score(&candidate(&[], 1), &ScoreCriteria::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    fn chat_scorer(server: &wiremock::MockServer) -> Arc<dyn Scorer> {
        Arc::new(ChatCompletionScorer::new(
            build_client(Duration::from_secs(5)).unwrap(),
            server.uri(),
            "test-model",
            "sk-test",
        ))
    }

    #[tokio::test]
    async fn model_outage_falls_back_to_heuristic() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let scorer = FallbackScorer::new(chat_scorer(&server))
            .with_retries(1, Duration::from_millis(5));
        let c = candidate(&["Python", "AI", "React", "Go"], 3);
        let outcome = scorer.score(&c, &ScoreCriteria::default()).await.unwrap();

        let expected = HeuristicScorer::evaluate(&c, &ScoreCriteria::default());
        assert_eq!(outcome.score, expected.score);
        assert_eq!(outcome.rationale, expected.rationale);
    }

    #[tokio::test]
    async fn malformed_answer_falls_back_without_retry() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "I'd rather not say." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scorer = FallbackScorer::new(chat_scorer(&server))
            .with_retries(3, Duration::from_millis(5));
        let outcome = scorer
            .score(&candidate(&[], 1), &ScoreCriteria::default())
            .await
            .unwrap();
        assert_eq!(outcome.score, 0.5);
    }

    #[tokio::test]
    async fn healthy_model_answer_is_kept() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "{\"score\": 7.5, \"rationale\": \"Solid\"}" } }]
            })))
            .mount(&server)
            .await;

        let outcome = FallbackScorer::new(chat_scorer(&server))
            .score(&candidate(&[], 1), &ScoreCriteria::default())
            .await
            .unwrap();
        assert_eq!(outcome.score, 7.5);
        assert_eq!(outcome.rationale, "Solid");
    }
}
