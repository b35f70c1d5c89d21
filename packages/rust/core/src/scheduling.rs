//! Interview slot planning and the conditional `schedule` stage.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use hireflow_shared::{HireflowError, InterviewSlot, Result, SchedulingSection, Scheduling};
use tracing::{debug, info, instrument, warn};

use crate::fanout::fan_out;
use crate::graph::StageName;
use crate::pipeline::{StageContext, StageResult};
use crate::retry::call_with_policy;
use crate::state::{ErrorKind, PipelineState, RunError};

/// Consecutive business-hour slots starting the day after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    duration_minutes: u32,
    day_start_hour: u32,
    day_end_hour: u32,
    skip_weekends: bool,
    /// Overrides "today" when set.
    anchor: Option<NaiveDate>,
}

impl SlotPlan {
    pub fn new(
        duration_minutes: u32,
        day_start_hour: u32,
        day_end_hour: u32,
        skip_weekends: bool,
    ) -> Result<Self> {
        if duration_minutes == 0 {
            return Err(HireflowError::config("scheduling.duration_minutes must be > 0"));
        }
        if day_end_hour > 24 || day_start_hour >= day_end_hour {
            return Err(HireflowError::config(format!(
                "scheduling hours must satisfy start < end <= 24 (got {day_start_hour}..{day_end_hour})"
            )));
        }
        if (day_end_hour - day_start_hour) * 60 < duration_minutes {
            return Err(HireflowError::config(format!(
                "a {duration_minutes} minute slot does not fit between {day_start_hour}:00 and {day_end_hour}:00"
            )));
        }
        Ok(Self {
            duration_minutes,
            day_start_hour,
            day_end_hour,
            skip_weekends,
            anchor: None,
        })
    }

    /// Plan as if the run happened on `today`.
    pub fn starting_on(mut self, today: NaiveDate) -> Self {
        self.anchor = Some(today);
        self
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    fn is_bookable(&self, day: NaiveDate) -> bool {
        !(self.skip_weekends && matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
    }

    /// The first `count` slots after `today` (or the anchor, if set).
    pub fn slots(&self, count: usize, today: NaiveDate) -> Vec<InterviewSlot> {
        let mut slots = Vec::with_capacity(count);
        let mut day = self.anchor.unwrap_or(today) + Duration::days(1);
        let length = Duration::minutes(i64::from(self.duration_minutes));

        while slots.len() < count {
            if !self.is_bookable(day) {
                day += Duration::days(1);
                continue;
            }
            let open = day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.day_start_hour));
            let close = day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.day_end_hour));
            let mut start = open;
            while start + length <= close && slots.len() < count {
                slots.push(InterviewSlot {
                    start,
                    duration_minutes: self.duration_minutes,
                });
                start += length;
            }
            day += Duration::days(1);
        }
        slots
    }
}

impl Default for SlotPlan {
    fn default() -> Self {
        Self {
            duration_minutes: 45,
            day_start_hour: 9,
            day_end_hour: 18,
            skip_weekends: true,
            anchor: None,
        }
    }
}

impl TryFrom<&SchedulingSection> for SlotPlan {
    type Error = HireflowError;

    fn try_from(section: &SchedulingSection) -> Result<Self> {
        Self::new(
            section.duration_minutes,
            section.day_start_hour,
            section.day_end_hour,
            section.skip_weekends,
        )
    }
}

/// Create one event per shortlisted candidate. Slots are assigned in
/// shortlist order before any call is made.
#[instrument(skip_all, fields(stage = "schedule", shortlisted = state.shortlisted.len()))]
pub(crate) async fn schedule(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let today = state.started_at.with_timezone(&Local).date_naive();
    let shortlisted: Vec<_> = state.shortlisted_candidates().cloned().collect();
    let slots = ctx.options.slot_plan.slots(shortlisted.len(), today);
    let total = shortlisted.len();

    let scheduler = ctx.caps.scheduler.clone();
    let policy = ctx.options.call_policy;
    let work: Vec<_> = shortlisted.into_iter().zip(slots).collect();

    let results = fan_out(work.clone(), ctx.options.concurrency, |(candidate, slot)| {
        let scheduler = scheduler.clone();
        async move {
            call_with_policy(&policy, scheduler.name(), || {
                scheduler.create_event(&candidate, &slot)
            })
            .await
        }
    })
    .await;

    let mut scheduled = Vec::new();
    let mut links = Vec::new();
    for (index, ((candidate, slot), result)) in work.into_iter().zip(results).enumerate() {
        ctx.progress.candidate_done(StageName::Schedule, index + 1, total);
        let outcome = match result {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic),
        };
        match outcome {
            Ok(event) => {
                debug!(candidate_id = %candidate.id, start = %slot.start, link = %event.link, "interview scheduled");
                if let Some(c) = state.candidates.iter_mut().find(|c| c.id == candidate.id) {
                    c.scheduling = Some(Scheduling {
                        event_id: event.event_id,
                        link: event.link.clone(),
                        slot,
                    });
                }
                scheduled.push(candidate.id);
                links.push(event.link);
            }
            Err(message) => {
                warn!(candidate_id = %candidate.id, error = %message, "scheduling failed");
                state.record(RunError::for_candidate(
                    StageName::Schedule,
                    candidate.id,
                    ErrorKind::Scheduling,
                    message,
                ));
            }
        }
    }

    info!(scheduled = scheduled.len(), failed = total - scheduled.len(), "scheduling complete");
    state.scheduled = scheduled;
    state.outputs.calendar_links = links;
    Ok(state)
}
