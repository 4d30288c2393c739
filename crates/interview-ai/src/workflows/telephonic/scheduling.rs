use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::context::InterviewContext;
use super::domain::{ApplicationId, Interview, InterviewId, InterviewStatus, NewInterview};
use super::error::{InterviewError, ItemError};
use super::integrations::EventKind;
use super::tasks::EmailTask;

pub const DEFAULT_TIMEZONE: &str = "UTC";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub application_id: ApplicationId,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub send_notification: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkScheduleReport {
    pub scheduled_count: usize,
    pub failed_count: usize,
    pub errors: Vec<ItemError>,
    pub interviews: Vec<InterviewId>,
}

/// Creates and (re)schedules interviews.
pub struct SchedulingManager {
    context: InterviewContext,
}

impl SchedulingManager {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub fn schedule(&self, request: ScheduleRequest) -> Result<Interview, InterviewError> {
        let ctx = &self.context;
        let application = ctx.require_application(&request.application_id)?;
        let now = ctx.now();
        ensure_future(request.scheduled_at, now)?;

        let settings = ctx.settings().settings_for(&application.job_id)?;
        let duration = validated_duration(request.duration_minutes)?
            .unwrap_or(settings.default_duration_minutes);
        let timezone = request
            .timezone
            .filter(|zone| !zone.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        let mut interview = match ctx.interviews.interview_for_application(&application.id)? {
            Some(existing)
                if !matches!(
                    existing.status,
                    InterviewStatus::Cancelled | InterviewStatus::NoShow
                ) =>
            {
                existing
            }
            _ => ctx.interviews.create_interview(
                NewInterview {
                    application_id: application.id.clone(),
                    job_id: application.job_id.clone(),
                    current_stage: application.current_stage.clone(),
                    duration_minutes: duration,
                    timezone: timezone.clone(),
                },
                now,
            )?,
        };
        if !interview.status.can_transition_to(InterviewStatus::Scheduled) {
            return Err(InterviewError::InvalidState(format!(
                "Interview cannot be scheduled (status: {})",
                interview.status
            )));
        }

        interview.status = InterviewStatus::Scheduled;
        interview.scheduled_at = Some(request.scheduled_at);
        interview.duration_minutes = duration;
        interview.timezone = timezone;
        interview.reminder_sent = false;
        if let Some(notes) = request.notes.as_deref() {
            interview.append_notes(notes);
        }
        interview.updated_at = now;
        let mut interview = ctx.interviews.save_interview(interview)?;
        info!(
            interview_id = %interview.id,
            application_id = %application.id,
            scheduled_at = %request.scheduled_at,
            "interview scheduled"
        );

        let mut flags_changed = false;
        if request.send_notification
            && ctx.notify(
                &application.candidate_id,
                EventKind::InterviewScheduled,
                json!({
                    "interview_id": interview.id,
                    "scheduled_at": request.scheduled_at,
                    "duration_minutes": duration,
                    "timezone": interview.timezone,
                }),
            )
        {
            interview.notification_sent = true;
            flags_changed = true;
        }
        if request.send_email
            && ctx.enqueue_email(EmailTask::InterviewScheduled {
                interview_id: interview.id.clone(),
                candidate_id: application.candidate_id.clone(),
                scheduled_at: request.scheduled_at,
                duration_minutes: duration,
                timezone: interview.timezone.clone(),
            })
        {
            interview.email_sent = true;
            flags_changed = true;
        }
        if flags_changed {
            interview = ctx.interviews.save_interview(interview)?;
        }
        Ok(interview)
    }

    /// Schedules each item on its own; one failure never stops the rest.
    pub fn bulk_schedule(&self, requests: Vec<ScheduleRequest>) -> BulkScheduleReport {
        let mut report = BulkScheduleReport::default();
        for request in requests {
            let application_id = request.application_id.clone();
            match self.schedule(request) {
                Ok(interview) => {
                    report.scheduled_count += 1;
                    report.interviews.push(interview.id);
                }
                Err(err) => {
                    warn!(application_id = %application_id, error = %err, "bulk schedule item rejected");
                    report.failed_count += 1;
                    report.errors.push(ItemError {
                        application_id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            scheduled = report.scheduled_count,
            failed = report.failed_count,
            "bulk schedule finished"
        );
        report
    }

    pub fn reschedule(
        &self,
        interview_id: &InterviewId,
        request: RescheduleRequest,
    ) -> Result<Interview, InterviewError> {
        let ctx = &self.context;
        let mut interview = ctx.require_interview(interview_id)?;
        if !matches!(
            interview.status,
            InterviewStatus::Scheduled | InterviewStatus::NotScheduled
        ) {
            return Err(InterviewError::InvalidState(format!(
                "Only scheduled interviews can be rescheduled (status: {})",
                interview.status
            )));
        }
        let now = ctx.now();
        ensure_future(request.scheduled_at, now)?;

        let previous = interview.scheduled_at;
        interview.status = InterviewStatus::Scheduled;
        interview.scheduled_at = Some(request.scheduled_at);
        if let Some(duration) = validated_duration(request.duration_minutes)? {
            interview.duration_minutes = duration;
        }
        if let Some(zone) = request.timezone.filter(|zone| !zone.trim().is_empty()) {
            interview.timezone = zone;
        }
        if let Some(notes) = request.notes.as_deref() {
            interview.append_notes(notes);
        }
        interview.reminder_sent = false;
        interview.updated_at = now;
        let interview = ctx.interviews.save_interview(interview)?;
        info!(
            interview_id = %interview.id,
            previous = ?previous,
            scheduled_at = %request.scheduled_at,
            "interview rescheduled"
        );

        if let Ok(application) = ctx.require_application(&interview.application_id) {
            ctx.notify(
                &application.candidate_id,
                EventKind::InterviewRescheduled,
                json!({
                    "interview_id": interview.id,
                    "scheduled_at": request.scheduled_at,
                    "duration_minutes": interview.duration_minutes,
                    "timezone": interview.timezone,
                }),
            );
        }
        Ok(interview)
    }
}

fn ensure_future(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), InterviewError> {
    if scheduled_at <= now {
        return Err(InterviewError::Validation(
            "Scheduled time must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn validated_duration(minutes: Option<u32>) -> Result<Option<u32>, InterviewError> {
    match minutes {
        Some(0) => Err(InterviewError::Validation(
            "Duration must be at least one minute".to_string(),
        )),
        other => Ok(other),
    }
}
