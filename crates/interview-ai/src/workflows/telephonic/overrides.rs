use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::context::InterviewContext;
use super::domain::{Decision, InterviewId, ManualOverride, UserId};
use super::error::InterviewError;
use super::integrations::EventKind;
use super::tasks::EmailTask;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    /// Signed so that negative input is reported as out of range rather than as bad JSON.
    pub manual_score: i32,
    pub manual_decision: Decision,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideOutcome {
    pub interview_id: InterviewId,
    pub original_score: u8,
    pub original_decision: Decision,
    pub final_score: u8,
    pub final_decision: Decision,
    pub decision_changed: bool,
}

/// Lets the owning recruiter or the interviewer replace the AI verdict.
pub struct OverrideManager {
    context: InterviewContext,
}

impl OverrideManager {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub fn override_decision(
        &self,
        interview_id: &InterviewId,
        request: OverrideRequest,
        overridden_by: &UserId,
    ) -> Result<OverrideOutcome, InterviewError> {
        let ctx = &self.context;
        let interview = ctx.require_interview(interview_id)?;
        let current = ctx
            .interviews
            .performance_result(interview_id)?
            .ok_or_else(|| {
                InterviewError::InvalidState("Interview must be analyzed first".to_string())
            })?;

        let score = u8::try_from(request.manual_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                InterviewError::Validation("Manual score must be between 0 and 100".to_string())
            })?;
        if request.manual_decision == Decision::Pending {
            return Err(InterviewError::Validation(
                "Manual decision must be qualified or not_qualified".to_string(),
            ));
        }
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(InterviewError::Validation(
                "Override reason is required".to_string(),
            ));
        }

        let job = ctx.require_job(&interview.job_id)?;
        let is_conductor = interview.conducted_by.as_ref() == Some(overridden_by);
        if job.recruiter_id != *overridden_by && !is_conductor {
            return Err(InterviewError::Forbidden(
                "Only the job's recruiter or the interviewer can override this decision"
                    .to_string(),
            ));
        }

        let previous_decision = current.final_decision();
        let stored = ctx.interviews.update_manual_score(
            interview_id,
            ManualOverride {
                score,
                decision: request.manual_decision,
                reason: reason.to_string(),
                overridden_by: overridden_by.clone(),
                overridden_at: ctx.now(),
            },
        )?;
        let final_decision = stored.final_decision();
        info!(
            interview_id = %interview_id,
            overridden_by = %overridden_by,
            original_decision = current.decision.label(),
            final_decision = final_decision.label(),
            "decision overridden"
        );

        // Compared against the decision in effect before this override, so a repeated
        // override that confirms the current outcome stays silent.
        if final_decision != previous_decision {
            let application = ctx.require_application(&interview.application_id)?;
            let (status, stage_status) = final_decision.application_statuses();
            ctx.applications
                .update_application_status(&application.id, status, stage_status)?;

            let message = match final_decision {
                Decision::Qualified => {
                    "Good news! After review, you have qualified in the telephonic interview."
                }
                _ => "After review, your telephonic interview result has been updated.",
            };
            ctx.notify(
                &application.candidate_id,
                EventKind::DecisionOverridden,
                json!({
                    "interview_id": interview_id,
                    "decision": final_decision,
                    "message": message,
                }),
            );
            ctx.enqueue_email(EmailTask::DecisionOverridden {
                interview_id: interview_id.clone(),
                candidate_id: application.candidate_id,
                decision: final_decision,
            });
        }

        if let Some(conductor) = interview
            .conducted_by
            .as_ref()
            .filter(|conductor| *conductor != overridden_by)
        {
            ctx.notify(
                conductor,
                EventKind::DecisionOverridden,
                json!({
                    "interview_id": interview_id,
                    "decision": final_decision,
                    "score": stored.final_score(),
                    "overridden_by": overridden_by,
                }),
            );
        }

        Ok(OverrideOutcome {
            interview_id: interview_id.clone(),
            original_score: current.overall_score,
            original_decision: current.decision,
            final_score: stored.final_score(),
            final_decision,
            decision_changed: final_decision != current.decision,
        })
    }
}
