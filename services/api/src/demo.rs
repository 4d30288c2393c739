use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use clap::Args;
use interview_ai::error::AppError;
use interview_ai::workflows::telephonic::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, BackgroundTask, CallTarget,
    ConnectionQuality, Decision, DimensionScores, EmailSender, EmailTask, EndCallRequest,
    EvaluationNarrative, InMemoryInterviewStore, InterviewContext, InterviewError, InterviewId,
    JobContext, JobId, ManualClock, NotificationEvent, NotificationHub, NotifyError,
    OverrideRequest, ProgressionRequest, QueueError, RecordingStorage, RecordingUpload,
    RetryPolicy, ScheduleRequest, Scorer, ScoringError, ScoringOutput, ScoringRequest,
    SelectionStage, StageId, StageStatus, StorageError, StoredObject, TaskHandler, TaskOutcome,
    TaskQueue, TelephonicInterviewService, Transcriber, TranscriptOutput, TranscriptionError,
    UserId,
};
use mime::Mime;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

const DEMO_JOB: &str = "job-demo";
const DEMO_RECRUITER: &str = "recruiter-demo";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of candidates in the round (profiles cycle strong, borderline, weak)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub(crate) candidates: u32,
    /// Leave the AI verdict untouched instead of overriding the first rejection
    #[arg(long)]
    pub(crate) skip_override: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        candidates,
        skip_override,
    } = args;

    let start = Utc
        .with_ymd_and_hms(2030, 3, 4, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(InMemoryInterviewStore::new());
    seed_round(&store, candidates)?;

    let queue = Arc::new(DemoQueue::default());
    let notifier = Arc::new(DemoNotifier::default());
    let emails = Arc::new(DemoOutbox::default());
    let context = InterviewContext {
        interviews: store.clone(),
        applications: store.clone(),
        storage: Arc::new(DemoStorage::default()),
        transcriber: Arc::new(EchoTranscriber),
        scorer: Arc::new(ProfileScorer),
        notifications: notifier.clone(),
        tasks: queue.clone(),
        clock: clock.clone(),
    };
    let service = TelephonicInterviewService::new(context);
    let handler = TaskHandler::new(service.evaluation(), emails.clone(), RetryPolicy::default());
    let job_id = JobId::new(DEMO_JOB);
    let recruiter = UserId::new(DEMO_RECRUITER);

    println!("Telephonic interview round demo");
    let settings = service.job_settings(&job_id)?;
    println!(
        "Job {DEMO_JOB}: qualifying score {}, default duration {} min",
        settings.minimum_qualifying_score, settings.default_duration_minutes
    );
    println!(
        "Weights: communication {}, technical {}, problem solving {}, enthusiasm {}, clarity {}, professionalism {}",
        settings.weights.communication,
        settings.weights.technical_knowledge,
        settings.weights.problem_solving,
        settings.weights.enthusiasm,
        settings.weights.clarity,
        settings.weights.professionalism
    );

    let call_time = start + Duration::hours(2);
    let report = service.scheduling().bulk_schedule(
        (1..=candidates)
            .map(|index| ScheduleRequest {
                application_id: ApplicationId::new(format!("app-{index}")),
                scheduled_at: call_time,
                duration_minutes: Some(30),
                timezone: Some("Europe/Berlin".to_string()),
                notes: None,
                send_notification: true,
                send_email: true,
            })
            .collect(),
    );
    println!(
        "\nScheduled {} interview(s) for {}, {} failed",
        report.scheduled_count,
        call_time.to_rfc3339(),
        report.failed_count
    );

    let reminders = service.reminders().send_due_reminders(24)?;
    println!("Reminder sweep: {} sent", reminders.sent);

    clock.set(call_time - Duration::minutes(10));
    if let Some(first) = report.interviews.first() {
        if let Err(err) = service
            .calls()
            .start_call(CallTarget::Interview(first.clone()), &recruiter)
        {
            println!("Early start refused: {err}");
        }
    }

    clock.set(call_time);
    println!("\nCalls");
    for (position, interview_id) in report.interviews.iter().enumerate() {
        let started = service
            .calls()
            .start_call(CallTarget::Interview(interview_id.clone()), &recruiter)?;
        let ended = service
            .calls()
            .end_call(EndCallRequest {
                session_id: started.session.session_id.clone(),
                duration_seconds: 1_200,
                recording: Some(RecordingUpload {
                    filename: format!("{interview_id}.mp3"),
                    content_type: None,
                    bytes: transcript_for(position).into_bytes(),
                }),
                connection_quality: ConnectionQuality::Good,
            })
            .await?;
        println!(
            "  {} session {} ended, evaluation queued: {}",
            interview_id, started.session.session_id, ended.evaluation_scheduled
        );
    }

    drain(&queue, &handler).await;

    println!("\nEvaluations");
    let rows = service.queries().candidates(&job_id, None)?;
    for row in &rows {
        println!(
            "  {} ({}): {} score {} -> {}",
            row.interview_id,
            row.application_id,
            row.status,
            row.final_score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_string()),
            row.final_decision
                .map(|decision| decision.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let rejected: Vec<InterviewId> = rows
        .iter()
        .filter(|row| row.final_decision == Some(Decision::NotQualified))
        .map(|row| row.interview_id.clone())
        .collect();

    if !skip_override {
        if let Some(interview_id) = rejected.first() {
            let outcome = service.overrides().override_decision(
                interview_id,
                OverrideRequest {
                    manual_score: 74,
                    manual_decision: Decision::Qualified,
                    reason: "Strong follow-up answers on incident handling".to_string(),
                },
                &recruiter,
            )?;
            println!(
                "\nOverride on {}: {} ({}) -> {} ({})",
                outcome.interview_id,
                outcome.original_score,
                outcome.original_decision,
                outcome.final_score,
                outcome.final_decision
            );
        }
    }

    let all: Vec<InterviewId> = rows.iter().map(|row| row.interview_id.clone()).collect();
    match service.progression().move_to_next_stage(ProgressionRequest {
        interview_ids: all.clone(),
        feedback: None,
    }) {
        Ok(outcome) => println!("\nAdvanced all {} candidate(s)", outcome.moved_count),
        Err(InterviewError::BatchRejected { invalid }) => {
            println!("\nBatch advance refused:");
            for item in &invalid {
                println!("  {}: {}", item.interview_id, item.reason);
            }
            let blocked: Vec<&InterviewId> = invalid.iter().map(|item| &item.interview_id).collect();
            let qualified: Vec<InterviewId> = all
                .into_iter()
                .filter(|id| !blocked.contains(&id))
                .collect();
            if !qualified.is_empty() {
                let outcome = service.progression().move_to_next_stage(ProgressionRequest {
                    interview_ids: qualified,
                    feedback: Some("Advanced after telephonic round".to_string()),
                })?;
                println!(
                    "Advanced {} qualified candidate(s) to {}",
                    outcome.moved_count,
                    outcome.next_stage_name.as_deref().unwrap_or("the final stage")
                );
            }
        }
        Err(err) => return Err(err.into()),
    }

    drain(&queue, &handler).await;

    let stats = service.queries().stats(&job_id)?;
    println!(
        "\nRound summary: {} interview(s), {} qualified, {} not qualified, average score {}",
        stats.total,
        stats.qualified,
        stats.not_qualified,
        stats
            .average_score
            .map(|score| format!("{score:.1}"))
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Notifications pushed: {}, emails sent: {}",
        notifier.count(),
        emails.count()
    );

    Ok(())
}

fn seed_round(store: &InMemoryInterviewStore, candidates: u32) -> Result<(), InterviewError> {
    let job_id = JobId::new(DEMO_JOB);
    store.insert_job(JobContext {
        id: job_id.clone(),
        recruiter_id: UserId::new(DEMO_RECRUITER),
        title: "Site Reliability Engineer".to_string(),
        required_skills: vec!["Linux".to_string(), "Incident response".to_string()],
        minimum_experience_years: 3,
        responsibilities: vec!["Own on-call rotations".to_string()],
    })?;
    for (order, name) in [(1, "Screening"), (2, "Telephonic"), (3, "Onsite")] {
        store.insert_stage(SelectionStage {
            id: StageId::new(name.to_ascii_lowercase()),
            job_id: job_id.clone(),
            name: name.to_string(),
            order,
            active: true,
        })?;
    }
    for index in 1..=candidates {
        store.insert_application(ApplicationSnapshot {
            id: ApplicationId::new(format!("app-{index}")),
            job_id: job_id.clone(),
            candidate_id: UserId::new(format!("candidate-{index}")),
            status: ApplicationStatus::InProgress,
            current_stage: Some(StageId::new("telephonic")),
            current_stage_status: StageStatus::InProgress,
        })?;
    }
    Ok(())
}

fn transcript_for(position: usize) -> String {
    let profile = ["strong", "borderline", "weak"][position % 3];
    format!("profile:{profile} Walked through a recent outage, the rollback, and the postmortem.")
}

async fn drain(queue: &DemoQueue, handler: &TaskHandler) {
    while let Some(task) = queue.pop() {
        let label = match &task {
            BackgroundTask::Evaluate { interview_id } => format!("evaluate {interview_id}"),
            BackgroundTask::Email(email) => format!("email {}", email.label()),
        };
        match handler.process(task).await {
            TaskOutcome::Completed { .. } => {}
            TaskOutcome::Exhausted { error, .. } | TaskOutcome::Rejected { error } => {
                println!("  task {label} failed: {error}");
            }
        }
    }
}

#[derive(Default)]
struct DemoQueue {
    pending: Mutex<VecDeque<BackgroundTask>>,
}

impl DemoQueue {
    fn pop(&self) -> Option<BackgroundTask> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl TaskQueue for DemoQueue {
    fn enqueue(&self, task: BackgroundTask) -> Result<(), QueueError> {
        self.pending
            .lock()
            .map_err(|_| QueueError::Closed)?
            .push_back(task);
        Ok(())
    }
}

#[derive(Default)]
struct DemoStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl DemoStorage {
    fn objects(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("demo storage poisoned".to_string()))
    }
}

#[async_trait]
impl RecordingStorage for DemoStorage {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        _content_type: &Mime,
    ) -> Result<StoredObject, StorageError> {
        let key = format!("{folder}/{filename}");
        self.objects()?.insert(key.clone(), bytes);
        Ok(StoredObject {
            url: format!("demo://{key}"),
            key,
        })
    }

    async fn delete_file(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects()?.remove(key).is_some())
    }

    async fn signed_url(&self, key: &str, ttl: std::time::Duration) -> Result<String, StorageError> {
        Ok(format!("demo://{key}?ttl={}", ttl.as_secs()))
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects()?.contains_key(key))
    }

    async fn fetch_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Missing(key.to_string()))
    }
}

/// Treats the uploaded bytes as the spoken text.
struct EchoTranscriber;

#[async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError> {
        Ok(TranscriptOutput {
            text: String::from_utf8_lossy(&audio).into_owned(),
            segments: Vec::new(),
            language: language_hint.to_string(),
            confidence: 0.93,
        })
    }
}

/// Scores by the `profile:` marker at the start of the transcript.
struct ProfileScorer;

#[async_trait]
impl Scorer for ProfileScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringOutput, ScoringError> {
        let profile = request
            .transcript
            .strip_prefix("profile:")
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| ScoringError::Failed("transcript has no profile marker".to_string()))?;
        let [communication, technical_knowledge, problem_solving, enthusiasm, clarity, professionalism] =
            match profile {
                "strong" => [88, 82, 75, 90, 85, 80],
                "borderline" => [72, 65, 60, 70, 68, 70],
                _ => [50, 45, 40, 60, 55, 50],
            };
        Ok(ScoringOutput {
            scores: DimensionScores {
                communication,
                technical_knowledge,
                problem_solving,
                enthusiasm,
                clarity,
                professionalism,
            },
            narrative: EvaluationNarrative {
                summary: format!("{profile} candidate for {}", request.job.title),
                ..EvaluationNarrative::default()
            },
        })
    }
}

#[derive(Default)]
struct DemoNotifier {
    events: Mutex<Vec<(UserId, NotificationEvent)>>,
}

impl DemoNotifier {
    fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl NotificationHub for DemoNotifier {
    fn broadcast(&self, user: &UserId, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("demo inbox poisoned".to_string()))?
            .push((user.clone(), event));
        Ok(())
    }
}

#[derive(Default)]
struct DemoOutbox {
    sent: Mutex<Vec<EmailTask>>,
}

impl DemoOutbox {
    fn count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl EmailSender for DemoOutbox {
    async fn send(&self, email: &EmailTask) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("demo outbox poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}
