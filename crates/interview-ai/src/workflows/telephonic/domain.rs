use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of one telephonic interview aggregate.
    InterviewId
);
string_id!(
    /// Identifier of the candidate's application owned by the hiring pipeline.
    ApplicationId
);
string_id!(JobId);
string_id!(
    /// Selection stage configured on a job (e.g. "Telephonic round", "Onsite").
    StageId
);
string_id!(
    /// Recruiter or candidate identity as issued by the authentication layer.
    UserId
);
string_id!(
    /// Unique id of a live call, handed to both call participants.
    SessionId
);

/// Lifecycle of an interview.
///
/// `not_scheduled -> scheduled -> in_progress -> {completed, failed}`, with `cancelled`
/// and `no_show` reachable from `scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    NotScheduled,
    Scheduled,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    NoShow,
}

impl InterviewStatus {
    pub const ALL: [InterviewStatus; 7] = [
        InterviewStatus::NotScheduled,
        InterviewStatus::Scheduled,
        InterviewStatus::InProgress,
        InterviewStatus::Completed,
        InterviewStatus::Failed,
        InterviewStatus::Cancelled,
        InterviewStatus::NoShow,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            InterviewStatus::NotScheduled => "not_scheduled",
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Failed => "failed",
            InterviewStatus::Cancelled => "cancelled",
            InterviewStatus::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == value.trim())
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            InterviewStatus::Completed
                | InterviewStatus::Failed
                | InterviewStatus::Cancelled
                | InterviewStatus::NoShow
        )
    }

    /// Accepts only forward edges of the lifecycle. `completed -> failed` records an
    /// exhausted evaluation and `failed -> completed` an operator re-analysis.
    pub const fn can_transition_to(self, next: InterviewStatus) -> bool {
        use InterviewStatus::*;
        matches!(
            (self, next),
            (NotScheduled, Scheduled)
                | (NotScheduled, InProgress)
                | (Scheduled, Scheduled)
                | (Scheduled, InProgress)
                | (Scheduled, Cancelled)
                | (Scheduled, NoShow)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Failed)
                | (Failed, Completed)
        )
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The telephonic round for a single application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub current_stage: Option<StageId>,
    pub status: InterviewStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub timezone: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_duration_seconds: Option<u32>,
    pub conducted_by: Option<UserId>,
    pub notification_sent: bool,
    pub email_sent: bool,
    pub reminder_sent: bool,
    pub notes: Option<String>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    /// Appends rescheduling notes below whatever was recorded before.
    pub fn append_notes(&mut self, addition: &str) {
        let addition = addition.trim();
        if addition.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}\n{addition}"),
            _ => addition.to_string(),
        });
    }
}

/// Insert payload for a fresh interview; the repository assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInterview {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub current_stage: Option<StageId>,
    pub duration_minutes: u32,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

/// Stored recording for a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingArtifact {
    pub url: String,
    pub key: String,
    pub size_bytes: u64,
    pub duration_seconds: u32,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub session_id: SessionId,
    pub interview_id: InterviewId,
    pub caller_id: UserId,
    pub callee_id: UserId,
    pub connection_quality: ConnectionQuality,
    pub recording: Option<RecordingArtifact>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u32>,
}

impl CallSession {
    pub fn recording_url(&self) -> Option<&str> {
        self.recording.as_ref().map(|recording| recording.url.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub interview_id: InterviewId,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
    pub confidence: f32,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an evaluation, before or after human override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Qualified,
    NotQualified,
    Pending,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Qualified => "qualified",
            Decision::NotQualified => "not_qualified",
            Decision::Pending => "pending",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Six interview dimensions, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub communication: u8,
    pub technical_knowledge: u8,
    pub problem_solving: u8,
    pub enthusiasm: u8,
    pub clarity: u8,
    pub professionalism: u8,
}

/// Narrative produced by the scorer alongside the numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationNarrative {
    pub summary: String,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    pub technical_assessment: String,
    pub communication_assessment: String,
    pub topics_discussed: Vec<String>,
    pub questions_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub score: u8,
    pub decision: Decision,
    pub reason: String,
    pub overridden_by: UserId,
    pub overridden_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub interview_id: InterviewId,
    pub scores: DimensionScores,
    pub overall_score: u8,
    pub decision: Decision,
    pub narrative: EvaluationNarrative,
    pub manual_override: Option<ManualOverride>,
    pub analyzed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PerformanceResult {
    pub fn final_score(&self) -> u8 {
        self.manual_override
            .as_ref()
            .map(|manual| manual.score)
            .unwrap_or(self.overall_score)
    }

    pub fn final_decision(&self) -> Decision {
        self.manual_override
            .as_ref()
            .map(|manual| manual.decision)
            .unwrap_or(self.decision)
    }
}

/// Application-level status owned by the hiring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    InProgress,
    Qualified,
    Rejected,
}

/// Status of the application within its current selection stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Qualified,
    Rejected,
}

impl Decision {
    /// Application and stage statuses that mirror this decision.
    pub const fn application_statuses(self) -> (ApplicationStatus, StageStatus) {
        match self {
            Decision::Qualified => (ApplicationStatus::Qualified, StageStatus::Qualified),
            Decision::NotQualified => (ApplicationStatus::Rejected, StageStatus::Rejected),
            Decision::Pending => (ApplicationStatus::InProgress, StageStatus::InProgress),
        }
    }
}

/// The slice of an application this round reads and patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: UserId,
    pub status: ApplicationStatus,
    pub current_stage: Option<StageId>,
    pub current_stage_status: StageStatus,
}

/// Job description handed to the scorer, plus the recruiter who owns the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContext {
    pub id: JobId,
    pub recruiter_id: UserId,
    pub title: String,
    pub required_skills: Vec<String>,
    pub minimum_experience_years: u8,
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStage {
    pub id: StageId,
    pub job_id: JobId,
    pub name: String,
    pub order: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHistory {
    pub application_id: ApplicationId,
    pub stage_id: StageId,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_rejects_backwards_edges() {
        use InterviewStatus::*;
        assert!(NotScheduled.can_transition_to(InProgress));
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!NoShow.can_transition_to(InProgress));
    }

    #[test]
    fn status_labels_round_trip_through_parse() {
        for status in InterviewStatus::ALL {
            assert_eq!(InterviewStatus::parse(status.label()), Some(status));
        }
        assert_eq!(InterviewStatus::parse("archived"), None);
    }
}
