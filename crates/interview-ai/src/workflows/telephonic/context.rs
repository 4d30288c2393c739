use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::clock::Clock;
use super::domain::{
    ApplicationId, ApplicationSnapshot, Interview, InterviewId, JobContext, JobId, UserId,
};
use super::error::InterviewError;
use super::integrations::{
    EventKind, NotificationEvent, NotificationHub, RecordingStorage, Scorer, Transcriber,
};
use super::repository::{ApplicationGateway, InterviewRepository};
use super::settings::SettingsStore;
use super::tasks::{BackgroundTask, EmailTask, TaskQueue};

/// Collaborators shared by every component of the round. Built once at startup.
#[derive(Clone)]
pub struct InterviewContext {
    pub interviews: Arc<dyn InterviewRepository>,
    pub applications: Arc<dyn ApplicationGateway>,
    pub storage: Arc<dyn RecordingStorage>,
    pub transcriber: Arc<dyn Transcriber>,
    pub scorer: Arc<dyn Scorer>,
    pub notifications: Arc<dyn NotificationHub>,
    pub tasks: Arc<dyn TaskQueue>,
    pub clock: Arc<dyn Clock>,
}

impl InterviewContext {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(Arc::clone(&self.interviews), Arc::clone(&self.clock))
    }

    /// Fire-and-forget push. Returns whether the hub accepted the event.
    pub(crate) fn notify(&self, user: &UserId, kind: EventKind, payload: Value) -> bool {
        match self
            .notifications
            .broadcast(user, NotificationEvent { kind, payload })
        {
            Ok(()) => true,
            Err(err) => {
                warn!(user = %user, event = kind.label(), error = %err, "notification dropped");
                false
            }
        }
    }

    /// Queues an email. Returns whether the queue accepted it.
    pub(crate) fn enqueue_email(&self, email: EmailTask) -> bool {
        let kind = email.label();
        match self.tasks.enqueue(BackgroundTask::Email(email)) {
            Ok(()) => true,
            Err(err) => {
                warn!(email = kind, error = %err, "email not queued");
                false
            }
        }
    }

    pub(crate) fn require_interview(&self, id: &InterviewId) -> Result<Interview, InterviewError> {
        self.interviews
            .interview(id)?
            .ok_or_else(InterviewError::interview_not_found)
    }

    pub(crate) fn require_application(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationSnapshot, InterviewError> {
        self.applications
            .application(id)?
            .ok_or_else(|| InterviewError::NotFound("Application not found".to_string()))
    }

    pub(crate) fn require_job(&self, id: &JobId) -> Result<JobContext, InterviewError> {
        self.applications
            .job(id)?
            .ok_or_else(|| InterviewError::NotFound("Job not found".to_string()))
    }
}
