//! Process-local store backing both repository traits. Used by the API service until a
//! database adapter exists, by the demo, and by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, CallSession, Interview, InterviewId,
    InterviewStatus, JobContext, JobId, ManualOverride, NewInterview, PerformanceResult,
    ProcessingStatus, SelectionStage, SessionId, StageHistory, StageStatus, Transcription,
};
use super::repository::{ApplicationGateway, InterviewRepository, RepositoryError, StageAdvance};
use super::settings::InterviewSettings;

#[derive(Default)]
pub struct InMemoryInterviewStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    sequence: u64,
    interviews: BTreeMap<InterviewId, Interview>,
    sessions: HashMap<SessionId, CallSession>,
    transcriptions: HashMap<InterviewId, Transcription>,
    results: HashMap<InterviewId, PerformanceResult>,
    settings: HashMap<JobId, InterviewSettings>,
    applications: HashMap<ApplicationId, ApplicationSnapshot>,
    jobs: HashMap<JobId, JobContext>,
    stages: Vec<SelectionStage>,
    history: Vec<StageHistory>,
}

impl InMemoryInterviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("interview store lock poisoned".to_string()))
    }

    pub fn insert_job(&self, job: JobContext) -> Result<(), RepositoryError> {
        self.lock()?.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn insert_application(&self, application: ApplicationSnapshot) -> Result<(), RepositoryError> {
        self.lock()?
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    /// Drops an application, as when the candidate withdraws from the job.
    pub fn remove_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationSnapshot>, RepositoryError> {
        Ok(self.lock()?.applications.remove(application_id))
    }

    pub fn insert_stage(&self, stage: SelectionStage) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.stages.retain(|existing| existing.id != stage.id);
        state.stages.push(stage);
        Ok(())
    }

    pub fn stage_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<StageHistory>, RepositoryError> {
        Ok(self
            .lock()?
            .history
            .iter()
            .filter(|record| record.application_id == *application_id)
            .cloned()
            .collect())
    }
}

impl InterviewRepository for InMemoryInterviewStore {
    fn interview(&self, id: &InterviewId) -> Result<Option<Interview>, RepositoryError> {
        Ok(self.lock()?.interviews.get(id).cloned())
    }

    fn interview_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Interview>, RepositoryError> {
        Ok(self
            .lock()?
            .interviews
            .values()
            .filter(|interview| interview.application_id == *application_id)
            .max_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .cloned())
    }

    fn interviews_for_job(
        &self,
        job_id: &JobId,
        status: Option<InterviewStatus>,
    ) -> Result<Vec<Interview>, RepositoryError> {
        let mut interviews: Vec<Interview> = self
            .lock()?
            .interviews
            .values()
            .filter(|interview| interview.job_id == *job_id)
            .filter(|interview| status.map_or(true, |status| interview.status == status))
            .cloned()
            .collect();
        interviews.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        Ok(interviews)
    }

    fn create_interview(
        &self,
        interview: NewInterview,
        now: DateTime<Utc>,
    ) -> Result<Interview, RepositoryError> {
        let mut state = self.lock()?;
        let active = state.interviews.values().any(|existing| {
            existing.application_id == interview.application_id && !existing.status.is_terminal()
        });
        if active {
            return Err(RepositoryError::Conflict(format!(
                "active interview for application {}",
                interview.application_id
            )));
        }

        state.sequence += 1;
        let record = Interview {
            id: InterviewId::new(format!("int-{:06}", state.sequence)),
            application_id: interview.application_id,
            job_id: interview.job_id,
            current_stage: interview.current_stage,
            status: InterviewStatus::NotScheduled,
            scheduled_at: None,
            duration_minutes: interview.duration_minutes,
            timezone: interview.timezone,
            started_at: None,
            ended_at: None,
            actual_duration_seconds: None,
            conducted_by: None,
            notification_sent: false,
            email_sent: false,
            reminder_sent: false,
            notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.interviews.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn save_interview(&self, mut interview: Interview) -> Result<Interview, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .interviews
            .get_mut(&interview.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("interview {}", interview.id)))?;
        if stored.version != interview.version {
            return Err(RepositoryError::StaleWrite {
                entity: "interview",
                id: interview.id.to_string(),
            });
        }
        interview.version += 1;
        *stored = interview.clone();
        Ok(interview)
    }

    fn create_call_session(&self, session: CallSession) -> Result<CallSession, RepositoryError> {
        let mut state = self.lock()?;
        let duplicate = state.sessions.contains_key(&session.session_id)
            || state
                .sessions
                .values()
                .any(|existing| existing.interview_id == session.interview_id);
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "call session for interview {}",
                session.interview_id
            )));
        }
        state
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    fn call_session(&self, id: &SessionId) -> Result<Option<CallSession>, RepositoryError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    fn call_session_for_interview(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<CallSession>, RepositoryError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|session| session.interview_id == *interview_id)
            .cloned())
    }

    fn save_call_session(&self, session: CallSession) -> Result<CallSession, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get_mut(&session.session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("call session {}", session.session_id)))?;
        *stored = session.clone();
        Ok(session)
    }

    fn save_transcription(
        &self,
        transcription: Transcription,
    ) -> Result<Transcription, RepositoryError> {
        self.lock()?
            .transcriptions
            .insert(transcription.interview_id.clone(), transcription.clone());
        Ok(transcription)
    }

    fn transcription(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<Transcription>, RepositoryError> {
        Ok(self.lock()?.transcriptions.get(interview_id).cloned())
    }

    fn update_transcription_status(
        &self,
        interview_id: &InterviewId,
        status: ProcessingStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transcription, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .transcriptions
            .get_mut(interview_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transcription {interview_id}")))?;
        stored.status = status;
        stored.error_message = error_message;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    fn save_performance_result(
        &self,
        mut result: PerformanceResult,
    ) -> Result<PerformanceResult, RepositoryError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.results.get(&result.interview_id) {
            result.manual_override = existing.manual_override.clone();
        }
        state
            .results
            .insert(result.interview_id.clone(), result.clone());
        Ok(result)
    }

    fn performance_result(
        &self,
        interview_id: &InterviewId,
    ) -> Result<Option<PerformanceResult>, RepositoryError> {
        Ok(self.lock()?.results.get(interview_id).cloned())
    }

    fn update_manual_score(
        &self,
        interview_id: &InterviewId,
        manual: ManualOverride,
    ) -> Result<PerformanceResult, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .results
            .get_mut(interview_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("performance result {interview_id}")))?;
        stored.updated_at = manual.overridden_at;
        stored.manual_override = Some(manual);
        Ok(stored.clone())
    }

    fn upcoming_for_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Interview>, RepositoryError> {
        Ok(self
            .lock()?
            .interviews
            .values()
            .filter(|interview| {
                interview.status == InterviewStatus::Scheduled
                    && !interview.reminder_sent
                    && interview
                        .scheduled_at
                        .is_some_and(|at| at >= from && at <= until)
            })
            .cloned()
            .collect())
    }

    fn mark_reminder_sent(&self, id: &InterviewId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .interviews
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("interview {id}")))?;
        if stored.reminder_sent {
            return Ok(false);
        }
        stored.reminder_sent = true;
        stored.version += 1;
        Ok(true)
    }

    fn settings_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Option<InterviewSettings>, RepositoryError> {
        Ok(self.lock()?.settings.get(job_id).cloned())
    }

    fn create_default_settings(
        &self,
        job_id: &JobId,
        now: DateTime<Utc>,
    ) -> Result<InterviewSettings, RepositoryError> {
        Ok(self
            .lock()?
            .settings
            .entry(job_id.clone())
            .or_insert_with(|| InterviewSettings::defaults(job_id.clone(), now))
            .clone())
    }

    fn update_settings(
        &self,
        settings: InterviewSettings,
    ) -> Result<InterviewSettings, RepositoryError> {
        self.lock()?
            .settings
            .insert(settings.job_id.clone(), settings.clone());
        Ok(settings)
    }
}

impl ApplicationGateway for InMemoryInterviewStore {
    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationSnapshot>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn update_application_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        stage_status: StageStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {id}")))?;
        application.status = status;
        application.current_stage_status = stage_status;
        Ok(())
    }

    fn job(&self, id: &JobId) -> Result<Option<JobContext>, RepositoryError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    fn active_stages(&self, job_id: &JobId) -> Result<Vec<SelectionStage>, RepositoryError> {
        let mut stages: Vec<SelectionStage> = self
            .lock()?
            .stages
            .iter()
            .filter(|stage| stage.job_id == *job_id && stage.active)
            .cloned()
            .collect();
        stages.sort_by_key(|stage| stage.order);
        Ok(stages)
    }

    fn advance_stage(&self, step: StageAdvance) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.applications.contains_key(&step.application_id) {
            return Err(RepositoryError::NotFound(format!(
                "application {}",
                step.application_id
            )));
        }

        let open = state.history.iter().position(|record| {
            record.application_id == step.application_id
                && record.stage_id == step.from_stage
                && record.completed_at.is_none()
        });
        match open {
            Some(index) => {
                let record = &mut state.history[index];
                record.status = StageStatus::Qualified;
                record.completed_at = Some(step.at);
                record.feedback = step.feedback.clone();
            }
            None => state.history.push(StageHistory {
                application_id: step.application_id.clone(),
                stage_id: step.from_stage.clone(),
                status: StageStatus::Qualified,
                started_at: step.at,
                completed_at: Some(step.at),
                feedback: step.feedback.clone(),
            }),
        }
        state.history.push(StageHistory {
            application_id: step.application_id.clone(),
            stage_id: step.to_stage.clone(),
            status: StageStatus::Pending,
            started_at: step.at,
            completed_at: None,
            feedback: None,
        });

        if let Some(application) = state.applications.get_mut(&step.application_id) {
            application.status = ApplicationStatus::InProgress;
            application.current_stage = Some(step.to_stage);
            application.current_stage_status = StageStatus::Pending;
        }
        Ok(())
    }
}
