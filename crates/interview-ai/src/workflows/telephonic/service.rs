use std::sync::Arc;

use super::calls::CallSessionController;
use super::context::InterviewContext;
use super::domain::{JobId, UserId};
use super::error::InterviewError;
use super::evaluation::EvaluationPipeline;
use super::import::parse_schedule_csv;
use super::overrides::OverrideManager;
use super::progression::StageProgressionService;
use super::queries::InterviewQueries;
use super::reminders::ReminderSweep;
use super::scheduling::{BulkScheduleReport, SchedulingManager};
use super::settings::{InterviewSettings, SettingsPatch, SettingsStore};

/// Service composing every component of the round over one shared context.
pub struct TelephonicInterviewService {
    context: InterviewContext,
    settings: SettingsStore,
    scheduling: SchedulingManager,
    calls: CallSessionController,
    evaluation: Arc<EvaluationPipeline>,
    overrides: OverrideManager,
    progression: StageProgressionService,
    reminders: ReminderSweep,
    queries: InterviewQueries,
}

impl TelephonicInterviewService {
    pub fn new(context: InterviewContext) -> Self {
        Self {
            settings: context.settings(),
            scheduling: SchedulingManager::new(context.clone()),
            calls: CallSessionController::new(context.clone()),
            evaluation: Arc::new(EvaluationPipeline::new(context.clone())),
            overrides: OverrideManager::new(context.clone()),
            progression: StageProgressionService::new(context.clone()),
            reminders: ReminderSweep::new(context.clone()),
            queries: InterviewQueries::new(context.clone()),
            context,
        }
    }

    pub fn context(&self) -> &InterviewContext {
        &self.context
    }

    pub fn scheduling(&self) -> &SchedulingManager {
        &self.scheduling
    }

    pub fn calls(&self) -> &CallSessionController {
        &self.calls
    }

    /// Shared with the background worker.
    pub fn evaluation(&self) -> Arc<EvaluationPipeline> {
        Arc::clone(&self.evaluation)
    }

    pub fn overrides(&self) -> &OverrideManager {
        &self.overrides
    }

    pub fn progression(&self) -> &StageProgressionService {
        &self.progression
    }

    pub fn reminders(&self) -> &ReminderSweep {
        &self.reminders
    }

    pub fn queries(&self) -> &InterviewQueries {
        &self.queries
    }

    pub fn job_settings(&self, job_id: &JobId) -> Result<InterviewSettings, InterviewError> {
        self.context.require_job(job_id)?;
        self.settings.settings_for(job_id)
    }

    /// Only the recruiter who owns the job may change its settings.
    pub fn update_job_settings(
        &self,
        job_id: &JobId,
        patch: &SettingsPatch,
        requester: &UserId,
    ) -> Result<InterviewSettings, InterviewError> {
        let job = self.context.require_job(job_id)?;
        if job.recruiter_id != *requester {
            return Err(InterviewError::Forbidden(
                "Only the job's recruiter can change interview settings".to_string(),
            ));
        }
        self.settings.update(job_id, patch)
    }

    /// Rows that fail to parse are reported next to the scheduling failures.
    pub fn bulk_schedule_csv(&self, input: &str) -> BulkScheduleReport {
        let import = parse_schedule_csv(input);
        let mut report = self.scheduling.bulk_schedule(import.requests);
        report.failed_count += import.errors.len();
        report.errors.extend(import.errors);
        report
    }
}
