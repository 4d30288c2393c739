use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mime::Mime;

use crate::workflows::telephonic::calls::{CallTarget, EndCallRequest, RecordingUpload};
use crate::workflows::telephonic::domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, ConnectionQuality, DimensionScores,
    EvaluationNarrative, InterviewId, JobContext, JobId, SelectionStage, SessionId, StageId,
    StageStatus, TranscriptSegment, UserId,
};
use crate::workflows::telephonic::integrations::{
    EventKind, NotificationEvent, NotificationHub, NotifyError, RecordingStorage, Scorer,
    ScoringError, ScoringOutput, ScoringRequest, StorageError, StoredObject, Transcriber,
    TranscriptOutput, TranscriptionError,
};
use crate::workflows::telephonic::scheduling::ScheduleRequest;
use crate::workflows::telephonic::tasks::{
    BackgroundTask, EmailSender, EmailTask, QueueError, TaskQueue,
};
use crate::workflows::telephonic::{
    InMemoryInterviewStore, InterviewContext, ManualClock, TelephonicInterviewService,
};

pub(super) const JOB: &str = "job-1";
pub(super) const RECRUITER: &str = "recruiter-1";
pub(super) const STAGE_SCREEN: &str = "stage-screen";
pub(super) const STAGE_PHONE: &str = "stage-phone";
pub(super) const STAGE_ONSITE: &str = "stage-onsite";

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn job_id() -> JobId {
    JobId::new(JOB)
}

pub(super) fn recruiter() -> UserId {
    UserId::new(RECRUITER)
}

pub(super) fn application(index: u32) -> ApplicationId {
    ApplicationId::new(format!("app-{index}"))
}

pub(super) fn candidate(index: u32) -> UserId {
    UserId::new(format!("cand-{index}"))
}

pub(super) fn transcript_output() -> TranscriptOutput {
    TranscriptOutput {
        text: "Recruiter: Walk me through your last project. Candidate: I led the billing migration."
            .to_string(),
        segments: vec![
            TranscriptSegment {
                start: 0.0,
                end: 3.2,
                text: "Walk me through your last project.".to_string(),
            },
            TranscriptSegment {
                start: 3.2,
                end: 7.9,
                text: "I led the billing migration.".to_string(),
            },
        ],
        language: "en".to_string(),
        confidence: 0.93,
    }
}

pub(super) fn scores(values: [u8; 6]) -> DimensionScores {
    DimensionScores {
        communication: values[0],
        technical_knowledge: values[1],
        problem_solving: values[2],
        enthusiasm: values[3],
        clarity: values[4],
        professionalism: values[5],
    }
}

pub(super) fn scoring_output(values: [u8; 6]) -> ScoringOutput {
    ScoringOutput {
        scores: scores(values),
        narrative: EvaluationNarrative {
            summary: "Candidate explained past work clearly.".to_string(),
            highlights: vec!["Ownership of migration".to_string()],
            improvements: vec!["Go deeper on testing".to_string()],
            technical_assessment: "Solid fundamentals".to_string(),
            communication_assessment: "Clear and concise".to_string(),
            topics_discussed: vec!["billing".to_string(), "migrations".to_string()],
            questions_count: 6,
        },
    }
}

#[derive(Default)]
pub(super) struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: AtomicUsize,
    fail_fetch: AtomicBool,
}

impl FakeStorage {
    pub(super) fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub(super) fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordingStorage for FakeStorage {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        _content_type: &Mime,
    ) -> Result<StoredObject, StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let key = format!("{folder}/{filename}");
        self.objects
            .lock()
            .expect("storage lock")
            .insert(key.clone(), bytes);
        Ok(StoredObject {
            url: format!("https://storage.test/{key}"),
            key,
        })
    }

    async fn delete_file(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().expect("storage lock").remove(key).is_some())
    }

    async fn signed_url(&self, key: &str, ttl: StdDuration) -> Result<String, StorageError> {
        Ok(format!("https://storage.test/{key}?expires={}", ttl.as_secs()))
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().expect("storage lock").contains_key(key))
    }

    async fn fetch_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("object store timed out".to_string()));
        }
        self.objects
            .lock()
            .expect("storage lock")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Missing(key.to_string()))
    }
}

/// Returns queued replies first, then the fallback.
pub(super) struct ScriptedTranscriber {
    replies: Mutex<VecDeque<Result<TranscriptOutput, TranscriptionError>>>,
    fallback: Result<TranscriptOutput, TranscriptionError>,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub(super) fn succeeding() -> Self {
        Self::with_fallback(Ok(transcript_output()))
    }

    pub(super) fn with_fallback(fallback: Result<TranscriptOutput, TranscriptionError>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn push(&self, reply: Result<TranscriptOutput, TranscriptionError>) {
        self.replies.lock().expect("transcriber lock").push_back(reply);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .expect("transcriber lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub(super) struct ScriptedScorer {
    replies: Mutex<VecDeque<Result<ScoringOutput, ScoringError>>>,
    fallback: Mutex<Result<ScoringOutput, ScoringError>>,
    requests: Mutex<Vec<ScoringRequest>>,
}

impl ScriptedScorer {
    pub(super) fn returning(values: [u8; 6]) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(scoring_output(values))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn set_scores(&self, values: [u8; 6]) {
        *self.fallback.lock().expect("scorer lock") = Ok(scoring_output(values));
    }

    pub(super) fn push(&self, reply: Result<ScoringOutput, ScoringError>) {
        self.replies.lock().expect("scorer lock").push_back(reply);
    }

    pub(super) fn requests(&self) -> Vec<ScoringRequest> {
        self.requests.lock().expect("scorer lock").clone()
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringOutput, ScoringError> {
        self.requests
            .lock()
            .expect("scorer lock")
            .push(request.clone());
        let queued = self.replies.lock().expect("scorer lock").pop_front();
        queued.unwrap_or_else(|| self.fallback.lock().expect("scorer lock").clone())
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    events: Mutex<Vec<(UserId, NotificationEvent)>>,
    offline: AtomicBool,
}

impl RecordingNotifier {
    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(super) fn kinds_for(&self, user: &UserId) -> Vec<EventKind> {
        self.events
            .lock()
            .expect("notifier lock")
            .iter()
            .filter(|(recipient, _)| recipient == user)
            .map(|(_, event)| event.kind)
            .collect()
    }

    pub(super) fn events_for(&self, user: &UserId) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .expect("notifier lock")
            .iter()
            .filter(|(recipient, _)| recipient == user)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl NotificationHub for RecordingNotifier {
    fn broadcast(&self, user: &UserId, event: NotificationEvent) -> Result<(), NotifyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("socket closed".to_string()));
        }
        self.events
            .lock()
            .expect("notifier lock")
            .push((user.clone(), event));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingQueue {
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl RecordingQueue {
    pub(super) fn tasks(&self) -> Vec<BackgroundTask> {
        self.tasks.lock().expect("queue lock").clone()
    }

    pub(super) fn evaluations(&self) -> Vec<InterviewId> {
        self.tasks()
            .into_iter()
            .filter_map(|task| match task {
                BackgroundTask::Evaluate { interview_id } => Some(interview_id),
                BackgroundTask::Email(_) => None,
            })
            .collect()
    }

    pub(super) fn emails(&self) -> Vec<EmailTask> {
        self.tasks()
            .into_iter()
            .filter_map(|task| match task {
                BackgroundTask::Email(email) => Some(email),
                BackgroundTask::Evaluate { .. } => None,
            })
            .collect()
    }
}

impl TaskQueue for RecordingQueue {
    fn enqueue(&self, task: BackgroundTask) -> Result<(), QueueError> {
        self.tasks.lock().expect("queue lock").push(task);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingEmails {
    sent: Mutex<Vec<EmailTask>>,
    failures_left: AtomicUsize,
}

impl RecordingEmails {
    pub(super) fn failing_times(count: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(count),
        }
    }

    pub(super) fn sent(&self) -> Vec<EmailTask> {
        self.sent.lock().expect("email lock").clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmails {
    async fn send(&self, email: &EmailTask) -> Result<(), NotifyError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(NotifyError::Transport("smtp refused".to_string()));
        }
        self.sent.lock().expect("email lock").push(email.clone());
        Ok(())
    }
}

/// Seeded store plus fakes for every external collaborator.
pub(super) struct Harness {
    pub store: Arc<InMemoryInterviewStore>,
    pub storage: Arc<FakeStorage>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub scorer: Arc<ScriptedScorer>,
    pub notifier: Arc<RecordingNotifier>,
    pub queue: Arc<RecordingQueue>,
    pub clock: Arc<ManualClock>,
    pub context: InterviewContext,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_scores([80, 70, 60, 90, 85, 75])
    }

    pub(super) fn with_scores(values: [u8; 6]) -> Self {
        let store = Arc::new(InMemoryInterviewStore::new());
        seed(&store);
        let storage = Arc::new(FakeStorage::default());
        let transcriber = Arc::new(ScriptedTranscriber::succeeding());
        let scorer = Arc::new(ScriptedScorer::returning(values));
        let notifier = Arc::new(RecordingNotifier::default());
        let queue = Arc::new(RecordingQueue::default());
        let clock = Arc::new(ManualClock::new(start_time()));

        let context = InterviewContext {
            interviews: store.clone(),
            applications: store.clone(),
            storage: storage.clone(),
            transcriber: transcriber.clone(),
            scorer: scorer.clone(),
            notifications: notifier.clone(),
            tasks: queue.clone(),
            clock: clock.clone(),
        };

        Self {
            store,
            storage,
            transcriber,
            scorer,
            notifier,
            queue,
            clock,
            context,
        }
    }

    pub(super) fn service(&self) -> TelephonicInterviewService {
        TelephonicInterviewService::new(self.context.clone())
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        use crate::workflows::telephonic::Clock;
        self.clock.now()
    }

    pub(super) fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Schedules `index` one hour out and returns its interview id.
    pub(super) fn schedule(&self, service: &TelephonicInterviewService, index: u32) -> InterviewId {
        service
            .scheduling()
            .schedule(schedule_request(index, self.now() + Duration::hours(1)))
            .expect("schedule interview")
            .id
    }

    /// Schedules, starts, and ends a call with an mp3 recording.
    pub(super) async fn completed_interview(
        &self,
        service: &TelephonicInterviewService,
        index: u32,
    ) -> (InterviewId, SessionId) {
        let interview_id = self.schedule(service, index);
        self.advance(Duration::hours(1));
        let started = service
            .calls()
            .start_call(CallTarget::Interview(interview_id.clone()), &recruiter())
            .expect("start call");
        self.advance(Duration::minutes(20));
        service
            .calls()
            .end_call(EndCallRequest {
                session_id: started.session.session_id.clone(),
                duration_seconds: 1_200,
                recording: Some(recording("call.mp3", 4_096)),
                connection_quality: ConnectionQuality::Good,
            })
            .await
            .expect("end call");
        (interview_id, started.session.session_id)
    }
}

pub(super) fn schedule_request(index: u32, at: DateTime<Utc>) -> ScheduleRequest {
    ScheduleRequest {
        application_id: application(index),
        scheduled_at: at,
        duration_minutes: Some(45),
        timezone: Some("Asia/Kolkata".to_string()),
        notes: None,
        send_notification: true,
        send_email: true,
    }
}

pub(super) fn recording(filename: &str, size: usize) -> RecordingUpload {
    RecordingUpload {
        filename: filename.to_string(),
        content_type: None,
        bytes: vec![7u8; size],
    }
}

fn seed(store: &InMemoryInterviewStore) {
    store
        .insert_job(JobContext {
            id: job_id(),
            recruiter_id: recruiter(),
            title: "Backend Engineer".to_string(),
            required_skills: vec!["Rust".to_string(), "PostgreSQL".to_string()],
            minimum_experience_years: 3,
            responsibilities: vec!["Own billing services".to_string()],
        })
        .expect("seed job");
    for (order, id, name) in [
        (1, STAGE_SCREEN, "Resume screen"),
        (2, STAGE_PHONE, "Telephonic round"),
        (3, STAGE_ONSITE, "Onsite"),
    ] {
        store
            .insert_stage(SelectionStage {
                id: StageId::new(id),
                job_id: job_id(),
                name: name.to_string(),
                order,
                active: true,
            })
            .expect("seed stage");
    }
    for index in 1..=4 {
        store
            .insert_application(ApplicationSnapshot {
                id: application(index),
                job_id: job_id(),
                candidate_id: candidate(index),
                status: ApplicationStatus::InProgress,
                current_stage: Some(StageId::new(STAGE_PHONE)),
                current_stage_status: StageStatus::InProgress,
            })
            .expect("seed application");
    }
}
