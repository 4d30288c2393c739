mod policy;
mod rules;

pub use rules::{Dimension, ScoreComponent};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::context::InterviewContext;
use super::domain::{
    Decision, DimensionScores, Interview, InterviewId, InterviewStatus, PerformanceResult,
    ProcessingStatus, Transcription,
};
use super::error::InterviewError;
use super::integrations::{EventKind, JobBrief, ScoringRequest};
use super::settings::InterviewSettings;
use super::tasks::{BackgroundTask, EmailTask};

/// Language hint passed to the transcriber.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Weighted score and decision for one set of dimension scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub components: Vec<ScoreComponent>,
    pub overall_score: u8,
    pub decision: Decision,
}

impl ScoreCard {
    pub fn compute(scores: &DimensionScores, settings: &InterviewSettings) -> Self {
        let components = rules::components(scores, &settings.weights);
        let overall_score = rules::weighted_overall(&components);
        let decision = policy::decide(overall_score, settings.minimum_qualifying_score);
        Self {
            components,
            overall_score,
            decision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Scored {
        overall_score: u8,
        decision: Decision,
        final_decision: Decision,
    },
    /// AI analysis is switched off for the job; only the transcript was stored.
    TranscribedOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub interview_id: InterviewId,
    pub outcome: EvaluationOutcome,
}

/// Transcribe, score, decide, and feed the decision back into the application.
///
/// A run either writes the full result or nothing beyond the transcript: a transcription or
/// scoring failure returns before the performance result is touched.
pub struct EvaluationPipeline {
    context: InterviewContext,
}

impl EvaluationPipeline {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub async fn run(&self, interview_id: &InterviewId) -> Result<EvaluationReport, InterviewError> {
        let ctx = &self.context;
        let interview = ctx.require_interview(interview_id)?;
        ensure_evaluable(&interview)?;

        let settings = ctx.settings().settings_for(&interview.job_id)?;
        let recording = ctx
            .interviews
            .call_session_for_interview(interview_id)?
            .and_then(|session| session.recording)
            .ok_or_else(|| InterviewError::InvalidState("Interview has no recording".to_string()))?;

        info!(interview_id = %interview_id, key = %recording.key, "transcribing recording");
        let audio = ctx.storage.fetch_file(&recording.key).await?;
        let transcript = ctx.transcriber.transcribe(audio, DEFAULT_LANGUAGE).await?;

        let now = ctx.now();
        let created_at = ctx
            .interviews
            .transcription(interview_id)?
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let transcription = ctx.interviews.save_transcription(Transcription {
            interview_id: interview_id.clone(),
            text: transcript.text,
            segments: transcript.segments,
            language: transcript.language,
            confidence: transcript.confidence,
            status: ProcessingStatus::Completed,
            error_message: None,
            created_at,
            updated_at: now,
        })?;
        info!(
            interview_id = %interview_id,
            segments = transcription.segments.len(),
            language = %transcription.language,
            "transcription stored"
        );

        if !settings.enable_ai_analysis {
            self.recover_if_failed(&interview)?;
            info!(interview_id = %interview_id, "ai analysis disabled for job");
            return Ok(EvaluationReport {
                interview_id: interview_id.clone(),
                outcome: EvaluationOutcome::TranscribedOnly,
            });
        }

        let job = ctx.require_job(&interview.job_id)?;
        let request = ScoringRequest {
            transcript: transcription.text.clone(),
            job: JobBrief::from(&job),
            weights: settings.weights,
        };
        let output = ctx.scorer.score(&request).await?;
        let card = ScoreCard::compute(&output.scores, &settings);
        let application = ctx.require_application(&interview.application_id)?;

        let now = ctx.now();
        let stored = ctx.interviews.save_performance_result(PerformanceResult {
            interview_id: interview_id.clone(),
            scores: output.scores,
            overall_score: card.overall_score,
            decision: card.decision,
            narrative: output.narrative,
            manual_override: None,
            analyzed_at: now,
            updated_at: now,
        })?;
        let final_decision = stored.final_decision();

        let (status, stage_status) = final_decision.application_statuses();
        ctx.applications
            .update_application_status(&application.id, status, stage_status)?;
        self.recover_if_failed(&interview)?;

        info!(
            interview_id = %interview_id,
            overall_score = card.overall_score,
            decision = card.decision.label(),
            final_decision = final_decision.label(),
            "evaluation stored"
        );

        let payload = json!({
            "interview_id": interview_id,
            "overall_score": stored.final_score(),
            "decision": final_decision,
        });
        ctx.notify(
            &application.candidate_id,
            EventKind::EvaluationCompleted,
            payload.clone(),
        );
        ctx.notify(&job.recruiter_id, EventKind::EvaluationCompleted, payload.clone());
        if let Some(conductor) = interview
            .conducted_by
            .as_ref()
            .filter(|conductor| **conductor != job.recruiter_id)
        {
            ctx.notify(conductor, EventKind::EvaluationCompleted, payload);
        }
        ctx.enqueue_email(EmailTask::EvaluationResult {
            interview_id: interview_id.clone(),
            candidate_id: application.candidate_id.clone(),
            decision: final_decision,
        });

        Ok(EvaluationReport {
            interview_id: interview_id.clone(),
            outcome: EvaluationOutcome::Scored {
                overall_score: card.overall_score,
                decision: card.decision,
                final_decision,
            },
        })
    }

    /// Queues a fresh run for an interview that already finished its call.
    pub fn request_analysis(&self, interview_id: &InterviewId) -> Result<(), InterviewError> {
        let interview = self.context.require_interview(interview_id)?;
        ensure_evaluable(&interview)?;
        let has_recording = self
            .context
            .interviews
            .call_session_for_interview(interview_id)?
            .is_some_and(|session| session.recording.is_some());
        if !has_recording {
            return Err(InterviewError::InvalidState(
                "Interview has no recording to analyze".to_string(),
            ));
        }
        self.context.tasks.enqueue(BackgroundTask::Evaluate {
            interview_id: interview_id.clone(),
        })?;
        info!(interview_id = %interview_id, "analysis queued");
        Ok(())
    }

    /// Records a failed evaluation on the interview and its transcript.
    pub fn mark_failed(
        &self,
        interview_id: &InterviewId,
        reason: &str,
    ) -> Result<(), InterviewError> {
        let ctx = &self.context;
        let interview = ctx.require_interview(interview_id)?;
        let now = ctx.now();
        if interview.status == InterviewStatus::Completed {
            ctx.interviews.update_interview_status(
                interview_id,
                InterviewStatus::Completed,
                InterviewStatus::Failed,
                now,
            )?;
        }
        if ctx.interviews.transcription(interview_id)?.is_some() {
            ctx.interviews.update_transcription_status(
                interview_id,
                ProcessingStatus::Failed,
                Some(reason.to_string()),
                now,
            )?;
        }
        warn!(interview_id = %interview_id, reason, "interview marked failed");
        Ok(())
    }

    fn recover_if_failed(&self, interview: &Interview) -> Result<(), InterviewError> {
        if interview.status == InterviewStatus::Failed {
            self.context.interviews.update_interview_status(
                &interview.id,
                InterviewStatus::Failed,
                InterviewStatus::Completed,
                self.context.now(),
            )?;
            info!(interview_id = %interview.id, "interview recovered by re-analysis");
        }
        Ok(())
    }
}

fn ensure_evaluable(interview: &Interview) -> Result<(), InterviewError> {
    match interview.status {
        InterviewStatus::Completed | InterviewStatus::Failed => Ok(()),
        status => Err(InterviewError::InvalidState(format!(
            "Interview must be completed before evaluation (status: {status})"
        ))),
    }
}
