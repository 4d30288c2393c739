use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::context::InterviewContext;
use super::domain::{
    ApplicationId, CallSession, Decision, Interview, InterviewId, InterviewStatus, JobId,
    PerformanceResult, Transcription, UserId,
};
use super::error::InterviewError;

/// Lifetime of the recording links handed out with interview details.
pub const RECORDING_LINK_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRow {
    pub interview_id: InterviewId,
    pub application_id: ApplicationId,
    pub candidate_id: Option<UserId>,
    pub status: InterviewStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub timezone: String,
    pub final_score: Option<u8>,
    pub final_decision: Option<Decision>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobInterviewStats {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub qualified: usize,
    pub not_qualified: usize,
    /// Completed interviews without a settled decision.
    pub pending_review: usize,
    pub average_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewDetails {
    pub interview: Interview,
    pub call_session: Option<CallSession>,
    pub recording_link: Option<String>,
    pub transcription: Option<Transcription>,
    pub performance: Option<PerformanceResult>,
    pub final_score: Option<u8>,
    pub final_decision: Option<Decision>,
}

/// Read side of the round for recruiter dashboards.
pub struct InterviewQueries {
    context: InterviewContext,
}

impl InterviewQueries {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub fn candidates(
        &self,
        job_id: &JobId,
        status: Option<InterviewStatus>,
    ) -> Result<Vec<CandidateRow>, InterviewError> {
        let ctx = &self.context;
        ctx.require_job(job_id)?;
        let interviews = ctx.interviews.interviews_for_job(job_id, status)?;
        let mut rows = Vec::with_capacity(interviews.len());
        for interview in interviews {
            let candidate_id = ctx
                .applications
                .application(&interview.application_id)?
                .map(|application| application.candidate_id);
            let result = ctx.interviews.performance_result(&interview.id)?;
            rows.push(CandidateRow {
                candidate_id,
                final_score: result.as_ref().map(PerformanceResult::final_score),
                final_decision: result.as_ref().map(PerformanceResult::final_decision),
                interview_id: interview.id,
                application_id: interview.application_id,
                status: interview.status,
                scheduled_at: interview.scheduled_at,
                duration_minutes: interview.duration_minutes,
                timezone: interview.timezone,
            });
        }
        Ok(rows)
    }

    pub fn stats(&self, job_id: &JobId) -> Result<JobInterviewStats, InterviewError> {
        let ctx = &self.context;
        ctx.require_job(job_id)?;
        let interviews = ctx.interviews.interviews_for_job(job_id, None)?;

        let mut stats = JobInterviewStats {
            total: interviews.len(),
            by_status: InterviewStatus::ALL
                .into_iter()
                .map(|status| (status.label(), 0))
                .collect(),
            ..JobInterviewStats::default()
        };
        let mut score_sum = 0u32;
        let mut scored = 0u32;
        for interview in &interviews {
            *stats.by_status.entry(interview.status.label()).or_default() += 1;
            let result = ctx.interviews.performance_result(&interview.id)?;
            match result.as_ref().map(PerformanceResult::final_decision) {
                Some(Decision::Qualified) => stats.qualified += 1,
                Some(Decision::NotQualified) => stats.not_qualified += 1,
                _ if interview.status == InterviewStatus::Completed => stats.pending_review += 1,
                _ => {}
            }
            if let Some(result) = result {
                score_sum += u32::from(result.final_score());
                scored += 1;
            }
        }
        if scored > 0 {
            stats.average_score = Some(score_sum as f32 / scored as f32);
        }
        Ok(stats)
    }

    /// Visible to the job's recruiter, the candidate, and whoever conducted the call.
    pub async fn details(
        &self,
        interview_id: &InterviewId,
        requester: &UserId,
    ) -> Result<InterviewDetails, InterviewError> {
        let ctx = &self.context;
        let interview = ctx.require_interview(interview_id)?;
        let job = ctx.require_job(&interview.job_id)?;
        let candidate = ctx
            .applications
            .application(&interview.application_id)?
            .map(|application| application.candidate_id);
        let allowed = job.recruiter_id == *requester
            || candidate.as_ref() == Some(requester)
            || interview.conducted_by.as_ref() == Some(requester);
        if !allowed {
            return Err(InterviewError::Forbidden(
                "You do not have access to this interview".to_string(),
            ));
        }

        let call_session = ctx.interviews.call_session_for_interview(interview_id)?;
        let recording_link = match call_session
            .as_ref()
            .and_then(|session| session.recording.as_ref())
        {
            Some(recording) => match ctx.storage.signed_url(&recording.key, RECORDING_LINK_TTL).await {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(interview_id = %interview_id, error = %err, "signed url unavailable, using stored url");
                    Some(recording.url.clone())
                }
            },
            None => None,
        };
        let transcription = ctx.interviews.transcription(interview_id)?;
        let performance = ctx.interviews.performance_result(interview_id)?;

        Ok(InterviewDetails {
            final_score: performance.as_ref().map(PerformanceResult::final_score),
            final_decision: performance.as_ref().map(PerformanceResult::final_decision),
            interview,
            call_session,
            recording_link,
            transcription,
            performance,
        })
    }
}
