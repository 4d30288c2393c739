use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, CallSession, Interview, InterviewId,
    InterviewStatus, JobContext, JobId, ManualOverride, NewInterview, PerformanceResult,
    ProcessingStatus, SelectionStage, SessionId, StageId, StageStatus, Transcription,
};
use super::settings::InterviewSettings;

/// Persistence for the interview aggregate and everything hanging off it.
///
/// Every interview write goes through [`InterviewRepository::save_interview`], which rejects
/// the write with [`RepositoryError::StaleWrite`] when the stored version moved on since the
/// caller read it.
pub trait InterviewRepository: Send + Sync {
    fn interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError>;
    /// Most recently created interview for the application, terminal or not.
    fn interview_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Interview>, RepositoryError>;
    fn interviews_for_job(
        &self,
        job_id: &JobId,
        status: Option<InterviewStatus>,
    ) -> Result<Vec<Interview>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] while a non-terminal interview exists for the
    /// same application.
    fn create_interview(
        &self,
        interview: NewInterview,
        now: DateTime<Utc>,
    ) -> Result<Interview, RepositoryError>;
    fn save_interview(&self, interview: Interview) -> Result<Interview, RepositoryError>;

    /// Compare-and-swap on the status column.
    fn update_interview_status(
        &self,
        id: &InterviewId,
        expected: InterviewStatus,
        next: InterviewStatus,
        now: DateTime<Utc>,
    ) -> Result<Interview, RepositoryError> {
        let mut interview = self
            .interview(id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("interview {id}")))?;
        if interview.status != expected {
            return Err(RepositoryError::StaleWrite {
                entity: "interview",
                id: id.to_string(),
            });
        }
        interview.status = next;
        interview.updated_at = now;
        self.save_interview(interview)
    }

    fn create_call_session(&self, session: CallSession) -> Result<CallSession, RepositoryError>;
    fn call_session(&self, id: &SessionId) -> Result<Option<CallSession>, RepositoryError>;
    fn call_session_for_interview(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<CallSession>, RepositoryError>;
    fn save_call_session(&self, session: CallSession) -> Result<CallSession, RepositoryError>;

    /// Insert or replace the transcription of an interview.
    fn save_transcription(
        &self,
        transcription: Transcription,
    ) -> Result<Transcription, RepositoryError>;
    fn transcription(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<Transcription>, RepositoryError>;
    fn update_transcription_status(
        &self,
        interview_id: &InterviewId,
        status: ProcessingStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transcription, RepositoryError>;

    /// Insert or replace the AI portion of a result; a stored manual override survives.
    fn save_performance_result(
        &self,
        result: PerformanceResult,
    ) -> Result<PerformanceResult, RepositoryError>;
    fn performance_result(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<PerformanceResult>, RepositoryError>;
    fn update_manual_score(
        &self,
        interview_id: &InterviewId,
        manual: ManualOverride,
    ) -> Result<PerformanceResult, RepositoryError>;

    /// Scheduled interviews starting within `[from, until]` whose reminder has not gone out.
    fn upcoming_for_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Interview>, RepositoryError>;
    /// Flips `reminder_sent` to true. Returns `false` when it was already set.
    fn mark_reminder_sent(&self, id: &InterviewId) -> Result<bool, RepositoryError>;

    fn settings_for_job(&self, job_id: &JobId)
        -> Result<Option<InterviewSettings>, RepositoryError>;
    /// Persists defaults unless settings already exist, returning whatever is stored.
    fn create_default_settings(
        &self,
        job_id: &JobId,
        now: DateTime<Utc>,
    ) -> Result<InterviewSettings, RepositoryError>;
    fn update_settings(
        &self,
        settings: InterviewSettings,
    ) -> Result<InterviewSettings, RepositoryError>;
}

/// Read/patch access to the hiring pipeline records this round does not own.
pub trait ApplicationGateway: Send + Sync {
    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationSnapshot>, RepositoryError>;
    fn update_application_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        stage_status: StageStatus,
    ) -> Result<(), RepositoryError>;
    fn job(&self, id: &JobId) -> Result<Option<JobContext>, RepositoryError>;
    /// Active stages of the job's selection process, ordered by `order`.
    fn active_stages(&self, job_id: &JobId) -> Result<Vec<SelectionStage>, RepositoryError>;
    /// Closes the history record of `from_stage`, opens one on `to_stage`, and points the
    /// application at `to_stage` with a pending stage status.
    fn advance_stage(&self, step: StageAdvance) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAdvance {
    pub application_id: ApplicationId,
    pub from_stage: StageId,
    pub to_stage: StageId,
    pub feedback: Option<String>,
    pub at: DateTime<Utc>,
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("{entity} {id} was modified concurrently")]
    StaleWrite { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
