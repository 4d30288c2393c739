//! Background work: evaluation runs and outbound email.
//!
//! Producers only see [`TaskQueue`]. The default queue is an unbounded tokio channel drained
//! by a [`TaskWorker`] that spawns one task per message and retries transient failures with
//! exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::domain::{Decision, InterviewId, UserId};
use super::evaluation::EvaluationPipeline;
use super::integrations::NotifyError;
use crate::config::PipelineConfig;

/// Transactional emails sent on behalf of the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailTask {
    InterviewScheduled {
        interview_id: InterviewId,
        candidate_id: UserId,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
        timezone: String,
    },
    InterviewReminder {
        interview_id: InterviewId,
        candidate_id: UserId,
        scheduled_at: DateTime<Utc>,
    },
    EvaluationResult {
        interview_id: InterviewId,
        candidate_id: UserId,
        decision: Decision,
    },
    DecisionOverridden {
        interview_id: InterviewId,
        candidate_id: UserId,
        decision: Decision,
    },
}

impl EmailTask {
    pub fn label(&self) -> &'static str {
        match self {
            EmailTask::InterviewScheduled { .. } => "interview_scheduled",
            EmailTask::InterviewReminder { .. } => "interview_reminder",
            EmailTask::EvaluationResult { .. } => "evaluation_result",
            EmailTask::DecisionOverridden { .. } => "decision_overridden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum BackgroundTask {
    Evaluate { interview_id: InterviewId },
    Email(EmailTask),
}

impl BackgroundTask {
    pub fn label(&self) -> &'static str {
        match self {
            BackgroundTask::Evaluate { .. } => "evaluate",
            BackgroundTask::Email(email) => email.label(),
        }
    }
}

pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: BackgroundTask) -> Result<(), QueueError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("task queue is closed")]
    Closed,
}

/// Delivery of rendered transactional email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &EmailTask) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::UnboundedSender<BackgroundTask>,
}

/// Receiving half handed to [`TaskWorker::new`].
pub struct TaskReceiver {
    receiver: mpsc::UnboundedReceiver<BackgroundTask>,
}

impl ChannelTaskQueue {
    pub fn new() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, TaskReceiver { receiver })
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn enqueue(&self, task: BackgroundTask) -> Result<(), QueueError> {
        self.sender.send(task).map_err(|_| QueueError::Closed)
    }
}

/// Exponential backoff: `base * 2^attempt`, at most `max_retries` retries after the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }
}

/// What happened to one dequeued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { attempts: u32 },
    /// Retries ran out on a transient failure.
    Exhausted { attempts: u32, error: String },
    /// Permanent failure, not retried.
    Rejected { error: String },
}

pub struct TaskWorker {
    receiver: TaskReceiver,
    handler: Arc<TaskHandler>,
}

/// Executes tasks; shared by every spawned task of a [`TaskWorker`].
pub struct TaskHandler {
    pipeline: Arc<EvaluationPipeline>,
    emails: Arc<dyn EmailSender>,
    retry: RetryPolicy,
}

impl TaskWorker {
    pub fn new(
        receiver: TaskReceiver,
        pipeline: Arc<EvaluationPipeline>,
        emails: Arc<dyn EmailSender>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            receiver,
            handler: Arc::new(TaskHandler::new(pipeline, emails, retry)),
        }
    }

    /// Drains the queue until every producer is dropped.
    pub async fn run(mut self) {
        info!("background task worker started");
        while let Some(task) = self.receiver.receiver.recv().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                handler.process(task).await;
            });
        }
        info!("background task worker stopped");
    }
}

impl TaskHandler {
    pub fn new(
        pipeline: Arc<EvaluationPipeline>,
        emails: Arc<dyn EmailSender>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            pipeline,
            emails,
            retry,
        }
    }

    pub async fn process(&self, task: BackgroundTask) -> TaskOutcome {
        match task {
            BackgroundTask::Evaluate { interview_id } => self.evaluate(&interview_id).await,
            BackgroundTask::Email(email) => self.deliver(&email).await,
        }
    }

    async fn evaluate(&self, interview_id: &InterviewId) -> TaskOutcome {
        let mut attempt = 0;
        loop {
            match self.pipeline.run(interview_id).await {
                Ok(report) => {
                    info!(
                        interview_id = %interview_id,
                        attempts = attempt + 1,
                        outcome = ?report.outcome,
                        "evaluation finished"
                    );
                    return TaskOutcome::Completed {
                        attempts: attempt + 1,
                    };
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        interview_id = %interview_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "evaluation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    error!(
                        interview_id = %interview_id,
                        attempts = attempt + 1,
                        error = %err,
                        "evaluation retries exhausted"
                    );
                    self.record_failure(interview_id, "evaluation retries exhausted");
                    return TaskOutcome::Exhausted {
                        attempts: attempt + 1,
                        error: err.to_string(),
                    };
                }
                Err(err) => {
                    error!(interview_id = %interview_id, error = %err, "evaluation rejected");
                    if !err.is_missing_interview() {
                        self.record_failure(interview_id, &err.to_string());
                    }
                    return TaskOutcome::Rejected {
                        error: err.to_string(),
                    };
                }
            }
        }
    }

    fn record_failure(&self, interview_id: &InterviewId, reason: &str) {
        if let Err(err) = self.pipeline.mark_failed(interview_id, reason) {
            error!(interview_id = %interview_id, error = %err, "could not mark interview failed");
        }
    }

    async fn deliver(&self, email: &EmailTask) -> TaskOutcome {
        let mut attempt = 0;
        loop {
            match self.emails.send(email).await {
                Ok(()) => {
                    return TaskOutcome::Completed {
                        attempts: attempt + 1,
                    }
                }
                Err(err) if attempt < self.retry.max_retries => {
                    warn!(kind = email.label(), attempt = attempt + 1, error = %err, "email delivery failed, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(kind = email.label(), error = %err, "email dropped after retries");
                    return TaskOutcome::Exhausted {
                        attempts: attempt + 1,
                        error: err.to_string(),
                    };
                }
            }
        }
    }
}
