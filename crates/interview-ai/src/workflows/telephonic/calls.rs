use std::path::Path;

use chrono::Duration;
use mime::Mime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use super::context::InterviewContext;
use super::domain::{
    ApplicationId, CallSession, ConnectionQuality, Interview, InterviewId, InterviewStatus,
    NewInterview, RecordingArtifact, SessionId, UserId,
};
use super::error::InterviewError;
use super::integrations::EventKind;
use super::tasks::BackgroundTask;

pub const MAX_RECORDING_BYTES: usize = 25 * 1024 * 1024;
pub const ALLOWED_RECORDING_EXTENSIONS: [&str; 6] = ["mp3", "mp4", "wav", "webm", "m4a", "ogg"];
/// How early a scheduled call may start.
pub const EARLY_START_MINUTES: i64 = 5;
/// How late a scheduled call may still start.
pub const LATE_START_MINUTES: i64 = 30;

const RECORDING_FOLDER: &str = "interview-recordings";

/// Which interview a recruiter is dialling into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallTarget {
    Interview(InterviewId),
    /// Creates the interview on the fly when the application has none.
    Application(ApplicationId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStarted {
    pub interview: Interview,
    pub session: CallSession,
}

/// Raw recording as received from the recruiter's client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RecordingUpload {
    pub fn validate(&self) -> Result<(), InterviewError> {
        if self.bytes.len() > MAX_RECORDING_BYTES {
            return Err(InterviewError::Validation(
                "File size exceeds 25MB limit".to_string(),
            ));
        }
        let extension = Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_RECORDING_EXTENSIONS.contains(&extension.as_str()) {
            return Err(InterviewError::Validation(format!(
                "Unsupported recording format '{}'. Allowed: {}",
                self.filename,
                ALLOWED_RECORDING_EXTENSIONS.join(", ")
            )));
        }
        Ok(())
    }

    fn mime(&self) -> Mime {
        self.content_type
            .as_deref()
            .and_then(|raw| raw.parse::<Mime>().ok())
            .unwrap_or_else(|| mime_guess::from_path(&self.filename).first_or_octet_stream())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndCallRequest {
    pub session_id: SessionId,
    pub duration_seconds: u32,
    pub recording: Option<RecordingUpload>,
    pub connection_quality: ConnectionQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEnded {
    pub interview_id: InterviewId,
    pub session_id: SessionId,
    pub recording_url: Option<String>,
    pub evaluation_scheduled: bool,
}

/// Starts and ends live calls.
pub struct CallSessionController {
    context: InterviewContext,
}

impl CallSessionController {
    pub fn new(context: InterviewContext) -> Self {
        Self { context }
    }

    pub fn start_call(
        &self,
        target: CallTarget,
        recruiter: &UserId,
    ) -> Result<CallStarted, InterviewError> {
        let ctx = &self.context;
        let mut interview = self.resolve_target(target)?;
        let job = ctx.require_job(&interview.job_id)?;
        if job.recruiter_id != *recruiter {
            return Err(InterviewError::Forbidden(
                "Only the job's recruiter can start this interview".to_string(),
            ));
        }
        if !interview.status.can_transition_to(InterviewStatus::InProgress) {
            return Err(InterviewError::InvalidState(format!(
                "Interview cannot be started (status: {})",
                interview.status
            )));
        }

        let now = ctx.now();
        if let (InterviewStatus::Scheduled, Some(scheduled_at)) =
            (interview.status, interview.scheduled_at)
        {
            if now < scheduled_at - Duration::minutes(EARLY_START_MINUTES) {
                return Err(InterviewError::TimeWindow(
                    "Interview cannot be started yet. Please wait until scheduled time."
                        .to_string(),
                ));
            }
            if now > scheduled_at + Duration::minutes(LATE_START_MINUTES) {
                return Err(InterviewError::TimeWindow(
                    "Interview scheduled time has passed. Please reschedule the interview."
                        .to_string(),
                ));
            }
        }

        let application = ctx.require_application(&interview.application_id)?;
        interview.status = InterviewStatus::InProgress;
        interview.started_at = Some(now);
        interview.conducted_by = Some(recruiter.clone());
        interview.updated_at = now;
        let interview = ctx.interviews.save_interview(interview)?;

        let session = ctx.interviews.create_call_session(CallSession {
            session_id: SessionId::new(format!("call_{}", Uuid::new_v4().simple())),
            interview_id: interview.id.clone(),
            caller_id: recruiter.clone(),
            callee_id: application.candidate_id.clone(),
            connection_quality: ConnectionQuality::Unknown,
            recording: None,
            started_at: now,
            ended_at: None,
            duration_seconds: None,
        })?;
        info!(
            interview_id = %interview.id,
            session_id = %session.session_id,
            recruiter = %recruiter,
            "call started"
        );

        let payload = json!({
            "interview_id": interview.id,
            "session_id": session.session_id,
            "started_at": now,
        });
        ctx.notify(&application.candidate_id, EventKind::CallStarted, payload.clone());
        ctx.notify(recruiter, EventKind::CallStarted, payload);

        Ok(CallStarted { interview, session })
    }

    pub async fn end_call(&self, request: EndCallRequest) -> Result<CallEnded, InterviewError> {
        let ctx = &self.context;
        let mut session = ctx
            .interviews
            .call_session(&request.session_id)?
            .ok_or_else(|| InterviewError::NotFound("Call session not found".to_string()))?;
        let mut interview = ctx.require_interview(&session.interview_id)?;
        if interview.status != InterviewStatus::InProgress {
            return Err(InterviewError::InvalidState(format!(
                "Interview is not in progress (status: {})",
                interview.status
            )));
        }
        if let Some(upload) = &request.recording {
            upload.validate()?;
        }

        let settings = ctx.settings().settings_for(&interview.job_id)?;
        let recording = match request.recording {
            Some(upload) if settings.enable_recording => {
                let content_type = upload.mime();
                let size_bytes = upload.bytes.len() as u64;
                let folder = format!("{RECORDING_FOLDER}/{}", interview.id);
                let stored = ctx
                    .storage
                    .upload_file(upload.bytes, &folder, &upload.filename, &content_type)
                    .await?;
                info!(interview_id = %interview.id, key = %stored.key, size_bytes, "recording stored");
                Some(RecordingArtifact {
                    url: stored.url,
                    key: stored.key,
                    size_bytes,
                    duration_seconds: request.duration_seconds,
                    content_type: content_type.essence_str().to_string(),
                })
            }
            Some(upload) => {
                info!(
                    interview_id = %interview.id,
                    filename = %upload.filename,
                    "recording disabled for job, upload discarded"
                );
                None
            }
            None => None,
        };

        let now = ctx.now();
        if recording.is_some() {
            session.recording = recording;
        }
        session.ended_at = Some(now);
        session.connection_quality = request.connection_quality;
        session.duration_seconds = Some(request.duration_seconds);
        let session = ctx.interviews.save_call_session(session)?;

        interview.status = InterviewStatus::Completed;
        interview.ended_at = Some(now);
        interview.actual_duration_seconds = Some(request.duration_seconds);
        interview.updated_at = now;
        let interview = ctx.interviews.save_interview(interview)?;
        info!(
            interview_id = %interview.id,
            session_id = %session.session_id,
            duration_seconds = request.duration_seconds,
            "call ended"
        );

        let recording_url = session.recording_url().map(str::to_string);
        let payload = json!({
            "interview_id": interview.id,
            "session_id": session.session_id,
            "duration_seconds": request.duration_seconds,
            "has_recording": recording_url.is_some(),
        });
        ctx.notify(&session.callee_id, EventKind::CallEnded, payload.clone());
        ctx.notify(&session.caller_id, EventKind::CallEnded, payload);

        let evaluation_scheduled = if recording_url.is_some() && settings.enable_transcription {
            match ctx.tasks.enqueue(BackgroundTask::Evaluate {
                interview_id: interview.id.clone(),
            }) {
                Ok(()) => true,
                Err(err) => {
                    error!(interview_id = %interview.id, error = %err, "evaluation not queued");
                    false
                }
            }
        } else {
            false
        };

        Ok(CallEnded {
            interview_id: interview.id,
            session_id: session.session_id,
            recording_url,
            evaluation_scheduled,
        })
    }

    fn resolve_target(&self, target: CallTarget) -> Result<Interview, InterviewError> {
        let ctx = &self.context;
        match target {
            CallTarget::Interview(id) => ctx.require_interview(&id),
            CallTarget::Application(application_id) => {
                let application = ctx.require_application(&application_id)?;
                if let Some(existing) = ctx.interviews.interview_for_application(&application.id)? {
                    return Ok(existing);
                }
                let settings = ctx.settings().settings_for(&application.job_id)?;
                let created = ctx.interviews.create_interview(
                    NewInterview {
                        application_id: application.id.clone(),
                        job_id: application.job_id.clone(),
                        current_stage: application.current_stage.clone(),
                        duration_minutes: settings.default_duration_minutes,
                        timezone: super::scheduling::DEFAULT_TIMEZONE.to_string(),
                    },
                    ctx.now(),
                )?;
                info!(interview_id = %created.id, application_id = %application.id, "interview created for ad-hoc call");
                Ok(created)
            }
        }
    }
}
