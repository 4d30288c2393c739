use axum::http::StatusCode;
use serde::Serialize;

use super::domain::{ApplicationId, InterviewId};
use super::integrations::{NotifyError, ScoringError, StorageError, TranscriptionError};
use super::repository::RepositoryError;
use super::tasks::QueueError;

/// Category of a rejected operation, so callers branch on kind instead of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Authorization,
    ExternalService,
    TimeWindow,
    Conflict,
    Infrastructure,
}

impl ErrorKind {
    pub const fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::State | ErrorKind::TimeWindow => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One interview that failed stage-progression validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidInterview {
    pub interview_id: InterviewId,
    pub reason: String,
}

/// One bulk-schedule item that could not be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub application_id: ApplicationId,
    pub reason: String,
}

const INTERVIEW_NOT_FOUND: &str = "Interview not found";

/// Error raised by every use case of the telephonic round.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    TimeWindow(String),
    #[error("{} interview(s) cannot be moved to the next stage", .invalid.len())]
    BatchRejected { invalid: Vec<InvalidInterview> },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Notification(#[from] NotifyError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InterviewError {
    pub fn interview_not_found() -> Self {
        Self::NotFound(INTERVIEW_NOT_FOUND.to_string())
    }

    pub fn is_missing_interview(&self) -> bool {
        matches!(self, InterviewError::NotFound(message) if message == INTERVIEW_NOT_FOUND)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InterviewError::Validation(_) | InterviewError::BatchRejected { .. } => {
                ErrorKind::Validation
            }
            InterviewError::NotFound(_) => ErrorKind::NotFound,
            InterviewError::InvalidState(_) => ErrorKind::State,
            InterviewError::Forbidden(_) => ErrorKind::Authorization,
            InterviewError::TimeWindow(_) => ErrorKind::TimeWindow,
            InterviewError::Storage(_)
            | InterviewError::Transcription(_)
            | InterviewError::Scoring(_)
            | InterviewError::Notification(_) => ErrorKind::ExternalService,
            InterviewError::Repository(RepositoryError::NotFound(_)) => ErrorKind::NotFound,
            InterviewError::Repository(RepositoryError::Conflict(_))
            | InterviewError::Repository(RepositoryError::StaleWrite { .. }) => {
                ErrorKind::Conflict
            }
            InterviewError::Repository(RepositoryError::Unavailable(_))
            | InterviewError::Queue(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether the background worker should try the same task again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InterviewError::Storage(_)
                | InterviewError::Transcription(_)
                | InterviewError::Scoring(_)
                | InterviewError::Repository(RepositoryError::Unavailable(_))
                | InterviewError::Repository(RepositoryError::StaleWrite { .. })
        )
    }
}
