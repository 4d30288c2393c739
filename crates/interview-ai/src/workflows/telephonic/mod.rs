//! Telephonic interview round: scheduling, live calls, recording ingestion, AI evaluation,
//! manual overrides, and progression of qualified candidates to the next selection stage.

pub mod calls;
pub mod clock;
pub mod context;
pub mod domain;
pub mod error;
pub(crate) mod evaluation;
pub mod import;
pub mod integrations;
pub mod memory;
pub mod overrides;
pub mod progression;
pub mod queries;
pub mod reminders;
pub mod repository;
pub mod router;
pub mod scheduling;
pub mod service;
pub mod settings;
pub mod tasks;

#[cfg(test)]
mod tests;

pub use calls::{CallEnded, CallSessionController, CallStarted, CallTarget, EndCallRequest, RecordingUpload};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::InterviewContext;
pub use domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, CallSession, ConnectionQuality,
    Decision, DimensionScores, EvaluationNarrative, Interview, InterviewId, InterviewStatus,
    JobContext, JobId, ManualOverride, PerformanceResult, ProcessingStatus, SelectionStage,
    SessionId, StageHistory, StageId, StageStatus, Transcription, TranscriptSegment, UserId,
};
pub use error::{ErrorKind, InterviewError, InvalidInterview, ItemError};
pub use evaluation::{
    Dimension, EvaluationOutcome, EvaluationPipeline, EvaluationReport, ScoreCard, ScoreComponent,
};
pub use integrations::{
    EventKind, NotificationEvent, NotificationHub, NotifyError, RecordingStorage, Scorer,
    ScoringError, ScoringOutput, ScoringReply, ScoringRequest, StorageError, StoredObject,
    Transcriber, TranscriptOutput, TranscriptionError, TranscriptionReply,
};
pub use memory::InMemoryInterviewStore;
pub use overrides::{OverrideManager, OverrideOutcome, OverrideRequest};
pub use progression::{ProgressionOutcome, ProgressionRequest, StageProgressionService};
pub use queries::{CandidateRow, InterviewDetails, InterviewQueries, JobInterviewStats};
pub use reminders::{ReminderReport, ReminderSweep, MAX_REMINDER_HOURS};
pub use repository::{ApplicationGateway, InterviewRepository, RepositoryError, StageAdvance};
pub use router::telephonic_router;
pub use scheduling::{BulkScheduleReport, RescheduleRequest, ScheduleRequest, SchedulingManager};
pub use service::TelephonicInterviewService;
pub use settings::{InterviewSettings, ScoringWeights, SettingsPatch, SettingsStore};
pub use tasks::{
    BackgroundTask, ChannelTaskQueue, EmailSender, EmailTask, QueueError, RetryPolicy,
    TaskHandler, TaskOutcome, TaskQueue, TaskReceiver, TaskWorker,
};
