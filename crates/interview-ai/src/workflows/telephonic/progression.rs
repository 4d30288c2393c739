use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::context::InterviewContext;
use super::domain::{Decision, Interview, InterviewId, InterviewStatus};
use super::error::{InterviewError, InvalidInterview};
use super::integrations::EventKind;
use super::repository::StageAdvance;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRequest {
    pub interview_ids: Vec<InterviewId>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressionOutcome {
    pub moved_count: usize,
    pub next_stage_name: Option<String>,
    /// Qualified interviews whose application is on the last stage or has already left the
    /// interview's stage.
    pub skipped: Vec<InterviewId>,
}

/// Moves qualified candidates into the next selection stage of their job.
pub struct StageProgressionService {
    context: InterviewContext,
}

impl StageProgressionService {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    /// All-or-nothing: a single invalid id rejects the whole batch before anything moves.
    pub fn move_to_next_stage(
        &self,
        request: ProgressionRequest,
    ) -> Result<ProgressionOutcome, InterviewError> {
        let mut valid = Vec::with_capacity(request.interview_ids.len());
        let mut invalid = Vec::new();
        let mut seen = HashSet::new();
        for interview_id in &request.interview_ids {
            if !seen.insert(interview_id) {
                continue;
            }
            match self.validate(interview_id) {
                Ok(interview) => valid.push(interview),
                Err(reason) => invalid.push(InvalidInterview {
                    interview_id: interview_id.clone(),
                    reason,
                }),
            }
        }
        if !invalid.is_empty() {
            warn!(invalid = invalid.len(), "stage progression rejected");
            return Err(InterviewError::BatchRejected { invalid });
        }

        let mut outcome = ProgressionOutcome::default();
        for interview in valid {
            match self.advance(&interview, request.feedback.as_deref())? {
                Some(stage_name) => {
                    outcome.moved_count += 1;
                    outcome.next_stage_name.get_or_insert(stage_name);
                }
                None => outcome.skipped.push(interview.id),
            }
        }
        info!(
            moved = outcome.moved_count,
            skipped = outcome.skipped.len(),
            "stage progression finished"
        );
        Ok(outcome)
    }

    fn validate(&self, interview_id: &InterviewId) -> Result<Interview, String> {
        let ctx = &self.context;
        let interview = ctx
            .interviews
            .interview(interview_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "Interview not found".to_string())?;
        if interview.status != InterviewStatus::Completed {
            return Err(format!(
                "Interview not completed (status: {})",
                interview.status
            ));
        }
        let result = ctx
            .interviews
            .performance_result(interview_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "Interview has not been analyzed".to_string())?;
        match result.final_decision() {
            Decision::Qualified => Ok(interview),
            decision => Err(format!("Candidate not qualified (decision: {decision})")),
        }
    }

    fn advance(
        &self,
        interview: &Interview,
        feedback: Option<&str>,
    ) -> Result<Option<String>, InterviewError> {
        let ctx = &self.context;
        let application = ctx.require_application(&interview.application_id)?;
        let Some(current_stage) = application.current_stage.clone() else {
            warn!(interview_id = %interview.id, "no current stage recorded, not advancing");
            return Ok(None);
        };
        if let Some(interview_stage) = &interview.current_stage {
            if *interview_stage != current_stage {
                info!(
                    interview_id = %interview.id,
                    interview_stage = %interview_stage,
                    application_stage = %current_stage,
                    "application already moved past the interview stage"
                );
                return Ok(None);
            }
        }

        let stages = ctx.applications.active_stages(&interview.job_id)?;
        let Some(current) = stages.iter().find(|stage| stage.id == current_stage) else {
            warn!(
                interview_id = %interview.id,
                stage_id = %current_stage,
                "current stage is not an active stage of the job"
            );
            return Ok(None);
        };
        let Some(next) = stages.iter().find(|stage| stage.order > current.order) else {
            info!(interview_id = %interview.id, "already on the final stage");
            return Ok(None);
        };

        ctx.applications.advance_stage(StageAdvance {
            application_id: application.id.clone(),
            from_stage: current.id.clone(),
            to_stage: next.id.clone(),
            feedback: feedback.map(str::to_string),
            at: ctx.now(),
        })?;
        info!(
            interview_id = %interview.id,
            application_id = %application.id,
            from = %current.name,
            to = %next.name,
            "application advanced"
        );
        ctx.notify(
            &application.candidate_id,
            EventKind::StageAdvanced,
            json!({
                "application_id": application.id,
                "stage": next.name,
            }),
        );
        Ok(Some(next.name.clone()))
    }
}
