//! Interview event creation: local `.ics` invites or a calendar HTTP API.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use hireflow_shared::{Candidate, HireflowError, InterviewSlot, Result, ScheduledEvent};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::capability::Scheduler;
use crate::http::{check_status, read_json, send_error};

const ICS_DATE_FORMAT: &str = "%Y%m%dT%H%M%S";

fn event_summary(candidate: &Candidate) -> String {
    format!("Interview with {}", candidate.name)
}

fn event_description(candidate: &Candidate) -> String {
    let mut lines = vec![format!("Candidate: {} ({})", candidate.name, candidate.id)];
    if let Some(score) = candidate.score {
        lines.push(format!("Score: {score:.1}/10"));
    }
    if let Some(rationale) = &candidate.rationale {
        lines.push(format!("Rationale: {rationale}"));
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// IcsFileScheduler
// ---------------------------------------------------------------------------

/// Writes one RFC 5545 invite per event into a directory.
pub struct IcsFileScheduler {
    dir: PathBuf,
}

impl IcsFileScheduler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Escape a TEXT value per RFC 5545 §3.3.11.
fn escape_ics(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn format_local(at: NaiveDateTime) -> String {
    at.format(ICS_DATE_FORMAT).to_string()
}

pub(crate) fn render_ics(event_id: &str, candidate: &Candidate, slot: &InterviewSlot) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//hireflow//interview scheduler//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{event_id}@hireflow"),
        format!("DTSTAMP:{}Z", Utc::now().format(ICS_DATE_FORMAT)),
        format!("DTSTART:{}", format_local(slot.start)),
        format!("DTEND:{}", format_local(slot.end())),
        format!("SUMMARY:{}", escape_ics(&event_summary(candidate))),
        format!("DESCRIPTION:{}", escape_ics(&event_description(candidate))),
    ];
    if let Some(email) = &candidate.contact.email {
        lines.push(format!(
            "ATTENDEE;CN={}:mailto:{email}",
            escape_ics(&candidate.name)
        ));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

#[async_trait]
impl Scheduler for IcsFileScheduler {
    #[instrument(skip_all, fields(candidate_id = %candidate.id, start = %slot.start))]
    async fn create_event(
        &self,
        candidate: &Candidate,
        slot: &InterviewSlot,
    ) -> Result<ScheduledEvent> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HireflowError::io(&self.dir, e))?;

        let event_id = Uuid::now_v7().to_string();
        let file_name = format!(
            "interview_{}_{}.ics",
            candidate.id,
            slot.start.format("%Y%m%d_%H%M")
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, render_ics(&event_id, candidate, slot))
            .await
            .map_err(|e| HireflowError::io(&path, e))?;

        let absolute = std::path::absolute(&path).map_err(|e| HireflowError::io(&path, e))?;
        let link = Url::from_file_path(&absolute)
            .map_err(|()| HireflowError::validation(format!("not a file URL: {}", absolute.display())))?;

        debug!(path = %absolute.display(), "wrote invite");
        Ok(ScheduledEvent {
            event_id,
            link: link.to_string(),
        })
    }

    fn name(&self) -> &str {
        "ics scheduler"
    }
}

// ---------------------------------------------------------------------------
// CalendarApiScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
    #[serde(alias = "htmlLink", alias = "url")]
    link: String,
}

/// Creates events through a calendar HTTP API.
pub struct CalendarApiScheduler {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl CalendarApiScheduler {
    pub fn new(client: Client, endpoint: &str, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| HireflowError::config(format!("invalid calendar_url {endpoint:?}: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl Scheduler for CalendarApiScheduler {
    #[instrument(skip_all, fields(candidate_id = %candidate.id, start = %slot.start))]
    async fn create_event(
        &self,
        candidate: &Candidate,
        slot: &InterviewSlot,
    ) -> Result<ScheduledEvent> {
        let attendees: Vec<&str> = candidate.contact.email.iter().map(String::as_str).collect();
        let body = json!({
            "summary": event_summary(candidate),
            "description": event_description(candidate),
            "start": slot.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "end": slot.end().format("%Y-%m-%dT%H:%M:%S").to_string(),
            "attendees": attendees,
        });

        let mut request = self.client.post(self.endpoint.as_str()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;
        let created: CreatedEvent = read_json(self.name(), response).await?;

        Ok(ScheduledEvent {
            event_id: created.id,
            link: created.link,
        })
    }

    fn name(&self) -> &str {
        "calendar API"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use hireflow_shared::{CandidateId, Contact, ParsedResume};

    use super::*;
    use crate::http::build_client;

    fn candidate() -> Candidate {
        let mut c = Candidate::from_parsed(
            CandidateId(2),
            ParsedResume {
                name: "Barbara Liskov".into(),
                contact: Contact {
                    email: Some("barbara@example.com".into()),
                    phone: None,
                },
                ..Default::default()
            },
            "inbox/barbara.txt",
        );
        c.score = Some(9.2);
        c.rationale = Some("Strong fit, great abstractions".into());
        c
    }

    fn slot() -> InterviewSlot {
        InterviewSlot {
            start: NaiveDate::from_ymd_opt(2026, 3, 3)
                .and_then(|d| d.and_hms_opt(9, 45, 0))
                .unwrap(),
            duration_minutes: 45,
        }
    }

    #[test]
    fn ics_rendering() {
        let ics = render_ics("evt-1", &candidate(), &slot());
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20260303T094500\r\n"));
        assert!(ics.contains("DTEND:20260303T103000\r\n"));
        assert!(ics.contains("Strong fit\\, great abstractions"));
        assert!(ics.contains("ATTENDEE;CN=Barbara Liskov:mailto:barbara@example.com"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[tokio::test]
    async fn ics_scheduler_writes_file() {
        let dir = std::env::temp_dir().join(format!("hf-ics-{}", Uuid::now_v7()));
        let scheduler = IcsFileScheduler::new(&dir);

        let event = scheduler.create_event(&candidate(), &slot()).await.unwrap();
        assert!(event.link.starts_with("file://"));
        let written = dir.join("interview_C-0002_20260303_0945.ics");
        assert!(written.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn calendar_api_creates_event() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/events"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc123",
                "htmlLink": "https://calendar.example.com/e/abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scheduler = CalendarApiScheduler::new(
            build_client(Duration::from_secs(5)).unwrap(),
            &format!("{}/events", server.uri()),
            Some("tok".into()),
        )
        .unwrap();
        let event = scheduler.create_event(&candidate(), &slot()).await.unwrap();
        assert_eq!(event.event_id, "abc123");
        assert_eq!(event.link, "https://calendar.example.com/e/abc123");
    }

    #[tokio::test]
    async fn calendar_api_error_is_reported() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let scheduler =
            CalendarApiScheduler::new(build_client(Duration::from_secs(5)).unwrap(), &server.uri(), None)
                .unwrap();
        let err = scheduler.create_event(&candidate(), &slot()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
