use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use interview_ai::workflows::telephonic::{
    ApplicationGateway, ApplicationId, ApplicationSnapshot, ApplicationStatus, CallTarget,
    ChannelTaskQueue, ConnectionQuality, Decision, DimensionScores, EmailSender, EmailTask,
    EndCallRequest, EvaluationNarrative, InMemoryInterviewStore, InterviewContext,
    InterviewError, InterviewId, InterviewRepository, InterviewStatus, JobContext, JobId, ManualClock,
    NotificationEvent, NotificationHub, NotifyError, OverrideRequest, ProgressionRequest,
    RecordingStorage, RecordingUpload, RetryPolicy, ScheduleRequest, Scorer, ScoringError,
    ScoringOutput, ScoringRequest, SelectionStage, StageId, StageStatus, StorageError,
    StoredObject, TaskWorker, TelephonicInterviewService, Transcriber, TranscriptOutput,
    TranscriptionError, UserId,
};
use mime::Mime;

#[derive(Default)]
struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl RecordingStorage for MemoryStorage {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        _content_type: &Mime,
    ) -> Result<StoredObject, StorageError> {
        let key = format!("{folder}/{filename}");
        self.objects.lock().expect("lock").insert(key.clone(), bytes);
        Ok(StoredObject {
            url: format!("memory://{key}"),
            key,
        })
    }

    async fn delete_file(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().expect("lock").remove(key).is_some())
    }

    async fn signed_url(&self, key: &str, _ttl: StdDuration) -> Result<String, StorageError> {
        Ok(format!("memory://{key}?signed"))
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().expect("lock").contains_key(key))
    }

    async fn fetch_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .expect("lock")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Missing(key.to_string()))
    }
}

struct EchoTranscriber;

#[async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError> {
        Ok(TranscriptOutput {
            text: format!("{} bytes of conversation", audio.len()),
            segments: Vec::new(),
            language: language_hint.to_string(),
            confidence: 0.9,
        })
    }
}

/// The 1111-byte recording scores 55 overall, anything else 75.
struct FixedScorer;

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringOutput, ScoringError> {
        let [communication, technical_knowledge, problem_solving, enthusiasm, clarity, professionalism] =
            if request.transcript.starts_with("1111 ") {
                [55; 6]
            } else {
                [80, 70, 60, 90, 85, 75]
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
            narrative: EvaluationNarrative::default(),
        })
    }
}

#[derive(Default)]
struct Inbox {
    events: Mutex<Vec<(UserId, NotificationEvent)>>,
}

impl NotificationHub for Inbox {
    fn broadcast(&self, user: &UserId, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().expect("lock").push((user.clone(), event));
        Ok(())
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<EmailTask>>,
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, email: &EmailTask) -> Result<(), NotifyError> {
        self.sent.lock().expect("lock").push(email.clone());
        Ok(())
    }
}

fn seed(store: &InMemoryInterviewStore) {
    let job = JobId::new("job-7");
    store
        .insert_job(JobContext {
            id: job.clone(),
            recruiter_id: UserId::new("rec-7"),
            title: "Support Engineer".to_string(),
            required_skills: vec!["Linux".to_string()],
            minimum_experience_years: 2,
            responsibilities: vec!["Triage incidents".to_string()],
        })
        .expect("job");
    for (order, id) in [(1, "phone"), (2, "panel")] {
        store
            .insert_stage(SelectionStage {
                id: StageId::new(id),
                job_id: job.clone(),
                name: id.to_string(),
                order,
                active: true,
            })
            .expect("stage");
    }
    for index in 1..=2 {
        store
            .insert_application(ApplicationSnapshot {
                id: ApplicationId::new(format!("app-{index}")),
                job_id: job.clone(),
                candidate_id: UserId::new(format!("cand-{index}")),
                status: ApplicationStatus::InProgress,
                current_stage: Some(StageId::new("phone")),
                current_stage_status: StageStatus::InProgress,
            })
            .expect("application");
    }
}

async fn wait_for_result(store: &InMemoryInterviewStore, id: &InterviewId) {
    for _ in 0..200 {
        if store.performance_result(id).expect("read").is_some() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    panic!("evaluation for {id} never finished");
}

#[tokio::test]
async fn telephonic_round_from_schedule_to_next_stage() {
    let store = Arc::new(InMemoryInterviewStore::new());
    seed(&store);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2031, 3, 3, 8, 0, 0).single().expect("time"),
    ));
    let (queue, receiver) = ChannelTaskQueue::new();
    let context = InterviewContext {
        interviews: store.clone(),
        applications: store.clone(),
        storage: Arc::new(MemoryStorage::default()),
        transcriber: Arc::new(EchoTranscriber),
        scorer: Arc::new(FixedScorer),
        notifications: Arc::new(Inbox::default()),
        tasks: Arc::new(queue),
        clock: clock.clone(),
    };
    let service = TelephonicInterviewService::new(context);
    let outbox = Arc::new(Outbox::default());
    tokio::spawn(
        TaskWorker::new(
            receiver,
            service.evaluation(),
            outbox.clone(),
            RetryPolicy {
                max_retries: 1,
                base_delay: StdDuration::from_millis(1),
            },
        )
        .run(),
    );

    let recruiter = UserId::new("rec-7");
    let start = clock_now(&clock);
    let mut interviews = Vec::new();
    for (index, audio_len) in [(1u32, 1111usize), (2, 2222)] {
        let interview = service
            .scheduling()
            .schedule(ScheduleRequest {
                application_id: ApplicationId::new(format!("app-{index}")),
                scheduled_at: start + Duration::hours(2),
                duration_minutes: Some(45),
                timezone: Some("Asia/Kolkata".to_string()),
                notes: None,
                send_notification: true,
                send_email: true,
            })
            .expect("schedule");
        assert_eq!(interview.status, InterviewStatus::Scheduled);
        interviews.push((interview.id, audio_len));
    }

    clock.set(start + Duration::minutes(110));
    let early = service
        .calls()
        .start_call(CallTarget::Interview(interviews[0].0.clone()), &recruiter)
        .expect_err("ten minutes early");
    assert!(matches!(early, InterviewError::TimeWindow(_)));

    clock.set(start + Duration::hours(2));
    for (interview_id, audio_len) in &interviews {
        let started = service
            .calls()
            .start_call(CallTarget::Interview(interview_id.clone()), &recruiter)
            .expect("start call");
        let ended = service
            .calls()
            .end_call(EndCallRequest {
                session_id: started.session.session_id,
                duration_seconds: 900,
                recording: Some(RecordingUpload {
                    filename: "call.ogg".to_string(),
                    content_type: None,
                    bytes: vec![0u8; *audio_len],
                }),
                connection_quality: ConnectionQuality::Good,
            })
            .await
            .expect("end call");
        assert!(ended.evaluation_scheduled);
    }
    for (interview_id, _) in &interviews {
        wait_for_result(&store, interview_id).await;
    }

    let weak = store
        .performance_result(&interviews[0].0)
        .expect("read")
        .expect("stored");
    assert_eq!(weak.decision, Decision::NotQualified);
    let strong = store
        .performance_result(&interviews[1].0)
        .expect("read")
        .expect("stored");
    assert_eq!(strong.overall_score, 75);
    assert_eq!(strong.decision, Decision::Qualified);

    let rejected = service
        .progression()
        .move_to_next_stage(ProgressionRequest {
            interview_ids: interviews.iter().map(|(id, _)| id.clone()).collect(),
            feedback: None,
        })
        .expect_err("weak candidate blocks the batch");
    assert!(matches!(rejected, InterviewError::BatchRejected { ref invalid } if invalid.len() == 1));

    service
        .overrides()
        .override_decision(
            &interviews[0].0,
            OverrideRequest {
                manual_score: 78,
                manual_decision: Decision::Qualified,
                reason: "strong culture fit".to_string(),
            },
            &recruiter,
        )
        .expect("override");

    let moved = service
        .progression()
        .move_to_next_stage(ProgressionRequest {
            interview_ids: interviews.iter().map(|(id, _)| id.clone()).collect(),
            feedback: Some("advance both".to_string()),
        })
        .expect("advance");
    assert_eq!(moved.moved_count, 2);
    assert_eq!(moved.next_stage_name.as_deref(), Some("panel"));

    let application = store
        .application(&ApplicationId::new("app-1"))
        .expect("read")
        .expect("exists");
    assert_eq!(application.current_stage, Some(StageId::new("panel")));
    assert_eq!(application.current_stage_status, StageStatus::Pending);

    tokio::time::sleep(StdDuration::from_millis(20)).await;
    let sent = outbox.sent.lock().expect("lock").clone();
    assert!(sent
        .iter()
        .any(|email| matches!(email, EmailTask::InterviewScheduled { .. })));
    assert!(sent
        .iter()
        .any(|email| matches!(email, EmailTask::EvaluationResult { .. })));
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<Utc> {
    use interview_ai::workflows::telephonic::Clock;
    clock.now()
}
