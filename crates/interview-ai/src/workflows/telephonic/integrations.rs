//! Contracts for the services this round depends on but does not implement: recording
//! storage, speech-to-text, AI scoring, and user notifications.

use std::time::Duration;

use async_trait::async_trait;
use mime::Mime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{DimensionScores, EvaluationNarrative, JobContext, TranscriptSegment, UserId};
use super::settings::ScoringWeights;

/// Location of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

/// Binary storage for call recordings.
#[async_trait]
pub trait RecordingStorage: Send + Sync {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        content_type: &Mime,
    ) -> Result<StoredObject, StorageError>;
    async fn delete_file(&self, key: &str) -> Result<bool, StorageError>;
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
    async fn file_exists(&self, key: &str) -> Result<bool, StorageError>;
    async fn fetch_file(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("recording upload failed: {0}")]
    Upload(String),
    #[error("recording {0} not found in storage")]
    Missing(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Speech-to-text output for a whole call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptOutput {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
    pub confidence: f32,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription failed: {0}")]
    Failed(String),
    #[error("transcription service unavailable: {0}")]
    Unavailable(String),
}

/// Wire envelope of the transcription service: `{success, text, segments, language,
/// confidence}` or `{success: false, error}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionReply {
    pub success: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptionReply {
    pub fn into_result(self, language_hint: &str) -> Result<TranscriptOutput, TranscriptionError> {
        if !self.success {
            return Err(TranscriptionError::Failed(
                self.error
                    .unwrap_or_else(|| "transcription service reported failure".to_string()),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(TranscriptionError::Failed(
                "transcript is empty".to_string(),
            ));
        }
        Ok(TranscriptOutput {
            text: self.text,
            segments: self.segments,
            language: self
                .language
                .filter(|language| !language.trim().is_empty())
                .unwrap_or_else(|| language_hint.to_string()),
            confidence: self.confidence.clamp(0.0, 1.0),
        })
    }
}

/// Job facts the scorer weighs the conversation against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBrief {
    pub title: String,
    pub required_skills: Vec<String>,
    pub minimum_experience_years: u8,
    pub responsibilities: Vec<String>,
}

impl From<&JobContext> for JobBrief {
    fn from(job: &JobContext) -> Self {
        Self {
            title: job.title.clone(),
            required_skills: job.required_skills.clone(),
            minimum_experience_years: job.minimum_experience_years,
            responsibilities: job.responsibilities.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub transcript: String,
    pub job: JobBrief,
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringOutput {
    pub scores: DimensionScores,
    pub narrative: EvaluationNarrative,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringOutput, ScoringError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("interview scoring failed: {0}")]
    Failed(String),
    #[error("scoring service unavailable: {0}")]
    Unavailable(String),
}

/// Raw dimension scores as emitted by the scoring service. Wider than `u8` so that
/// out-of-range values can be clamped rather than rejected at parse time.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct RawScores {
    #[serde(default)]
    pub communication: i64,
    #[serde(default)]
    pub technical_knowledge: i64,
    #[serde(default)]
    pub problem_solving: i64,
    #[serde(default)]
    pub enthusiasm: i64,
    #[serde(default)]
    pub clarity: i64,
    #[serde(default)]
    pub professionalism: i64,
}

impl RawScores {
    pub fn clamped(self) -> DimensionScores {
        fn clamp(value: i64) -> u8 {
            value.clamp(0, 100) as u8
        }
        DimensionScores {
            communication: clamp(self.communication),
            technical_knowledge: clamp(self.technical_knowledge),
            problem_solving: clamp(self.problem_solving),
            enthusiasm: clamp(self.enthusiasm),
            clarity: clamp(self.clarity),
            professionalism: clamp(self.professionalism),
        }
    }
}

/// Wire envelope of the scoring service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringReply {
    pub success: bool,
    #[serde(default)]
    pub scores: Option<RawScores>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub technical: String,
    #[serde(default)]
    pub communication: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScoringReply {
    pub fn into_result(self) -> Result<ScoringOutput, ScoringError> {
        if !self.success {
            return Err(ScoringError::Failed(
                self.error
                    .unwrap_or_else(|| "scoring service reported failure".to_string()),
            ));
        }
        let scores = self
            .scores
            .ok_or_else(|| ScoringError::Failed("scores missing from response".to_string()))?;
        Ok(ScoringOutput {
            scores: scores.clamped(),
            narrative: EvaluationNarrative {
                summary: self.summary,
                highlights: self.highlights,
                improvements: self.improvements,
                technical_assessment: self.technical,
                communication_assessment: self.communication,
                topics_discussed: self.topics,
                questions_count: self.questions_count,
            },
        })
    }
}

/// Real-time events pushed to recruiters and candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    InterviewScheduled,
    InterviewRescheduled,
    InterviewReminder,
    CallStarted,
    CallEnded,
    EvaluationCompleted,
    DecisionOverridden,
    StageAdvanced,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::InterviewScheduled => "interview_scheduled",
            EventKind::InterviewRescheduled => "interview_rescheduled",
            EventKind::InterviewReminder => "interview_reminder",
            EventKind::CallStarted => "call_started",
            EventKind::CallEnded => "call_ended",
            EventKind::EvaluationCompleted => "evaluation_completed",
            EventKind::DecisionOverridden => "decision_overridden",
            EventKind::StageAdvanced => "stage_advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub payload: Value,
}

/// Push channel to connected users (WebSocket fan-out in production).
pub trait NotificationHub: Send + Sync {
    fn broadcast(&self, user: &UserId, event: NotificationEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
