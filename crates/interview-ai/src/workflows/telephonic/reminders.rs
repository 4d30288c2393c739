use chrono::Duration;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::context::InterviewContext;
use super::error::InterviewError;
use super::integrations::EventKind;
use super::tasks::EmailTask;

/// Widest reminder window a sweep accepts.
pub const MAX_REMINDER_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub due: usize,
    pub sent: usize,
    /// Claimed by a concurrent sweep first.
    pub skipped: usize,
}

/// Periodic reminder for interviews starting soon. Safe to run concurrently: each reminder
/// is claimed before it is dispatched.
pub struct ReminderSweep {
    context: InterviewContext,
}

impl ReminderSweep {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub fn send_due_reminders(&self, hours_before: i64) -> Result<ReminderReport, InterviewError> {
        if !(0..=MAX_REMINDER_HOURS).contains(&hours_before) {
            return Err(InterviewError::Validation(format!(
                "Reminder window must be between 0 and {MAX_REMINDER_HOURS} hours"
            )));
        }
        let ctx = &self.context;
        let now = ctx.now();
        let until = Duration::try_hours(hours_before)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| {
                InterviewError::Validation("Reminder window is out of range".to_string())
            })?;
        let due = ctx.interviews.upcoming_for_reminder(now, until)?;

        let mut report = ReminderReport {
            due: due.len(),
            ..ReminderReport::default()
        };
        for interview in due {
            if !ctx.interviews.mark_reminder_sent(&interview.id)? {
                report.skipped += 1;
                continue;
            }
            let application = match ctx.require_application(&interview.application_id) {
                Ok(application) => application,
                Err(err) => {
                    warn!(interview_id = %interview.id, error = %err, "reminder claimed but candidate unknown");
                    continue;
                }
            };
            let Some(scheduled_at) = interview.scheduled_at else {
                continue;
            };
            ctx.notify(
                &application.candidate_id,
                EventKind::InterviewReminder,
                json!({
                    "interview_id": interview.id,
                    "scheduled_at": scheduled_at,
                    "timezone": interview.timezone,
                }),
            );
            ctx.enqueue_email(EmailTask::InterviewReminder {
                interview_id: interview.id.clone(),
                candidate_id: application.candidate_id,
                scheduled_at,
            });
            report.sent += 1;
        }

        if report.due > 0 {
            info!(
                due = report.due,
                sent = report.sent,
                skipped = report.skipped,
                "reminder sweep finished"
            );
        }
        Ok(report)
    }
}
