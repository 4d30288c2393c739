use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use interview_ai::config::AppConfig;
use interview_ai::error::AppError;
use interview_ai::workflows::telephonic::{
    ApplicationSnapshot, Clock, EmailSender, EmailTask, InMemoryInterviewStore,
    InterviewContext, InterviewError, JobContext, NotificationEvent, NotificationHub,
    NotifyError, RecordingStorage, Scorer, ScoringError, ScoringOutput, ScoringReply,
    ScoringRequest, SelectionStage, StorageError, StoredObject, TaskQueue, Transcriber,
    TranscriptOutput, TranscriptionError, TranscriptionReply, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Jobs, stages, and applications owned by the wider ATS, loaded at startup.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SeedData {
    #[serde(default)]
    pub(crate) jobs: Vec<JobContext>,
    #[serde(default)]
    pub(crate) stages: Vec<SelectionStage>,
    #[serde(default)]
    pub(crate) applications: Vec<ApplicationSnapshot>,
}

impl SeedData {
    pub(crate) async fn load(path: &Path) -> Result<Self, AppError> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw)
            .map_err(|err| AppError::Io(std::io::Error::new(ErrorKind::InvalidData, err)))
    }

    pub(crate) fn apply(self, store: &InMemoryInterviewStore) -> Result<(), InterviewError> {
        for job in self.jobs {
            store.insert_job(job)?;
        }
        for stage in self.stages {
            store.insert_stage(stage)?;
        }
        for application in self.applications {
            store.insert_application(application)?;
        }
        Ok(())
    }
}

/// Wires the production collaborators around a store and a queue.
pub(crate) fn interview_context(
    config: &AppConfig,
    store: Arc<InMemoryInterviewStore>,
    tasks: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
) -> Result<InterviewContext, AppError> {
    let client = reqwest::Client::builder()
        .timeout(AI_REQUEST_TIMEOUT)
        .build()
        .map_err(|err| AppError::Io(std::io::Error::new(ErrorKind::Other, err)))?;

    let transcriber: Arc<dyn Transcriber> = match &config.ai.transcription_url {
        Some(endpoint) => Arc::new(HttpTranscriber::new(client.clone(), endpoint.clone())),
        None => Arc::new(DisabledTranscriber),
    };
    let scorer: Arc<dyn Scorer> = match &config.ai.scoring_url {
        Some(endpoint) => Arc::new(HttpScorer::new(client, endpoint.clone())),
        None => Arc::new(DisabledScorer),
    };

    Ok(InterviewContext {
        interviews: store.clone(),
        applications: store,
        storage: Arc::new(LocalDiskStorage::new(
            config.storage.recordings_dir.clone(),
            config.storage.public_base_url.clone(),
        )),
        transcriber,
        scorer,
        notifications: Arc::new(LoggingNotifier),
        tasks,
        clock,
    })
}

/// Recordings on the local filesystem, addressed through a public base URL.
#[derive(Debug, Clone)]
pub(crate) struct LocalDiskStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStorage {
    pub(crate) fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(StorageError::Backend(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

pub(crate) fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "recording".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl RecordingStorage for LocalDiskStorage {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        filename: &str,
        content_type: &Mime,
    ) -> Result<StoredObject, StorageError> {
        let key = format!(
            "{}/{}-{}",
            folder.trim_matches('/'),
            uuid::Uuid::new_v4().simple(),
            sanitize_filename(filename)
        );
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::Upload(err.to_string()))?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| StorageError::Upload(err.to_string()))?;
        debug!(key = %key, size, content_type = %content_type, "recording stored");
        Ok(StoredObject {
            url: format!("{}/{}", self.public_base_url, key),
            key,
        })
    }

    async fn delete_file(&self, key: &str) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.file_exists(key).await? {
            return Err(StorageError::Missing(key.to_string()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        let expires = (Utc::now() + ttl).timestamp();
        Ok(format!("{}/{}?expires={expires}", self.public_base_url, key))
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StorageError> {
        tokio::fs::try_exists(self.path_for(key)?)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))
    }

    async fn fetch_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(self.path_for(key)?).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::Missing(key.to_string()))
            }
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
struct TranscriptionPayload<'a> {
    audio_base64: String,
    language: &'a str,
}

/// Speech-to-text over HTTP. Transport errors and 5xx replies are reported as
/// unavailable so the worker retries them.
pub(crate) struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub(crate) fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError> {
        let payload = TranscriptionPayload {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
            language: language_hint,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| TranscriptionError::Unavailable(err.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TranscriptionError::Unavailable(format!(
                "transcription service returned {status}"
            )));
        }
        let reply: TranscriptionReply = response
            .json()
            .await
            .map_err(|err| TranscriptionError::Failed(err.to_string()))?;
        reply.into_result(language_hint)
    }
}

pub(crate) struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpScorer {
    pub(crate) fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringOutput, ScoringError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| ScoringError::Unavailable(err.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ScoringError::Unavailable(format!(
                "scoring service returned {status}"
            )));
        }
        let reply: ScoringReply = response
            .json()
            .await
            .map_err(|err| ScoringError::Failed(err.to_string()))?;
        reply.into_result()
    }
}

/// Used when TRANSCRIPTION_URL is unset.
pub(crate) struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _language_hint: &str,
    ) -> Result<TranscriptOutput, TranscriptionError> {
        Err(TranscriptionError::Unavailable(
            "TRANSCRIPTION_URL is not configured".to_string(),
        ))
    }
}

/// Used when SCORING_URL is unset.
pub(crate) struct DisabledScorer;

#[async_trait]
impl Scorer for DisabledScorer {
    async fn score(&self, _request: &ScoringRequest) -> Result<ScoringOutput, ScoringError> {
        Err(ScoringError::Unavailable(
            "SCORING_URL is not configured".to_string(),
        ))
    }
}

/// Stands in for the WebSocket fan-out.
pub(crate) struct LoggingNotifier;

impl NotificationHub for LoggingNotifier {
    fn broadcast(&self, user: &UserId, event: NotificationEvent) -> Result<(), NotifyError> {
        info!(
            user = %user,
            event = event.kind.label(),
            payload = %event.payload,
            "notification pushed"
        );
        Ok(())
    }
}

pub(crate) struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, email: &EmailTask) -> Result<(), NotifyError> {
        info!(email = email.label(), detail = ?email, "email dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_ai::workflows::telephonic::{ApplicationGateway, ApplicationId, JobId, StageId};

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("interview-ai-{}", uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn sanitize_filename_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\calls\\my call.mp3"), "my_call.mp3");
        assert_eq!(sanitize_filename(".hidden.wav"), "hidden.wav");
        assert_eq!(sanitize_filename(""), "recording");
    }

    #[tokio::test]
    async fn local_disk_storage_round_trips_recordings() {
        let root = scratch_dir();
        let storage = LocalDiskStorage::new(root.clone(), "http://files.local/rec/".to_string());
        let stored = storage
            .upload_file(
                vec![7u8; 32],
                "interview-recordings",
                "call one.webm",
                &"audio/webm".parse().expect("mime"),
            )
            .await
            .expect("upload succeeds");

        assert!(stored.key.starts_with("interview-recordings/"));
        assert!(stored.key.ends_with("-call_one.webm"));
        assert_eq!(stored.url, format!("http://files.local/rec/{}", stored.key));
        assert!(storage.file_exists(&stored.key).await.expect("exists"));
        assert_eq!(
            storage.fetch_file(&stored.key).await.expect("fetch"),
            vec![7u8; 32]
        );

        let link = storage
            .signed_url(&stored.key, Duration::from_secs(3600))
            .await
            .expect("signed");
        assert!(link.contains("?expires="));

        assert!(storage.delete_file(&stored.key).await.expect("delete"));
        assert!(!storage.delete_file(&stored.key).await.expect("second delete"));
        assert_eq!(
            storage.fetch_file(&stored.key).await,
            Err(StorageError::Missing(stored.key.clone()))
        );

        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn local_disk_storage_rejects_traversal_keys() {
        let storage = LocalDiskStorage::new(scratch_dir(), "http://files.local".to_string());
        let err = storage
            .fetch_file("interview-recordings/../../secret")
            .await
            .expect_err("traversal rejected");
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn disabled_ai_services_report_unavailable() {
        let transcript = DisabledTranscriber.transcribe(vec![1, 2, 3], "en").await;
        assert!(matches!(transcript, Err(TranscriptionError::Unavailable(_))));
        let err = InterviewError::from(transcript.expect_err("disabled"));
        assert!(err.is_retryable());
    }

    #[test]
    fn seed_data_populates_the_store() {
        let seed: SeedData = serde_json::from_value(serde_json::json!({
            "jobs": [{
                "id": "job-9",
                "recruiter_id": "rec-9",
                "title": "Data Analyst",
                "required_skills": ["SQL"],
                "minimum_experience_years": 1,
                "responsibilities": ["Dashboards"]
            }],
            "stages": [{ "id": "phone", "job_id": "job-9", "name": "Phone", "order": 1, "active": true }],
            "applications": [{
                "id": "app-9",
                "job_id": "job-9",
                "candidate_id": "cand-9",
                "status": "in_progress",
                "current_stage": "phone",
                "current_stage_status": "in_progress"
            }]
        }))
        .expect("seed parses");

        let store = InMemoryInterviewStore::new();
        seed.apply(&store).expect("seed applies");
        let job = store
            .job(&JobId::new("job-9"))
            .expect("read")
            .expect("job seeded");
        assert_eq!(job.recruiter_id, UserId::new("rec-9"));
        let application = store
            .application(&ApplicationId::new("app-9"))
            .expect("read")
            .expect("application seeded");
        assert_eq!(application.current_stage, Some(StageId::new("phone")));
    }
}
