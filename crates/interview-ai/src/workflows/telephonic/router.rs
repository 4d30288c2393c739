use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::config::PipelineConfig;

use super::calls::{CallTarget, EndCallRequest, RecordingUpload};
use super::domain::{
    ApplicationId, ConnectionQuality, InterviewId, InterviewStatus, JobId, SessionId, UserId,
};
use super::error::InterviewError;
use super::overrides::OverrideRequest;
use super::progression::ProgressionRequest;
use super::scheduling::{RescheduleRequest, ScheduleRequest};
use super::service::TelephonicInterviewService;
use super::settings::SettingsPatch;

/// Header carrying the authenticated user id, set by the gateway in front of this service.
pub const USER_HEADER: &str = "x-user-id";

/// A 25MB recording grows by a third when base64 encoded.
const MAX_REQUEST_BYTES: usize = 40 * 1024 * 1024;

type SharedService = Arc<TelephonicInterviewService>;

/// Router builder exposing the telephonic round over HTTP.
pub fn telephonic_router(service: SharedService) -> Router {
    Router::new()
        .route(
            "/api/v1/telephonic/jobs/:job_id/settings",
            get(settings_handler).put(update_settings_handler),
        )
        .route(
            "/api/v1/telephonic/jobs/:job_id/candidates",
            get(candidates_handler),
        )
        .route("/api/v1/telephonic/jobs/:job_id/stats", get(stats_handler))
        .route("/api/v1/telephonic/interviews", post(schedule_handler))
        .route(
            "/api/v1/telephonic/interviews/bulk",
            post(bulk_schedule_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/bulk/csv",
            post(bulk_schedule_csv_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/advance",
            post(advance_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/:interview_id",
            get(details_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/:interview_id/schedule",
            put(reschedule_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/:interview_id/override",
            post(override_handler),
        )
        .route(
            "/api/v1/telephonic/interviews/:interview_id/analyze",
            post(analyze_handler),
        )
        .route("/api/v1/telephonic/calls/start", post(start_call_handler))
        .route("/api/v1/telephonic/calls/end", post(end_call_handler))
        .route(
            "/api/v1/telephonic/reminders/sweep",
            post(reminder_sweep_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(service)
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

fn failure(err: InterviewError) -> Response {
    let status = err.kind().status_code();
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    let mut body = json!({ "success": false, "error": err.to_string() });
    if let InterviewError::BatchRejected { invalid } = &err {
        body["invalid_interviews"] = json!(invalid);
    }
    (status, Json(body)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, InterviewError>) -> Response {
    match result {
        Ok(data) => success(status, data),
        Err(err) => failure(err),
    }
}

fn acting_user(headers: &HeaderMap) -> Result<UserId, InterviewError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new)
        .ok_or_else(|| InterviewError::Forbidden(format!("Missing {USER_HEADER} header")))
}

pub(crate) async fn settings_handler(
    State(service): State<SharedService>,
    Path(job_id): Path<String>,
) -> Response {
    respond(StatusCode::OK, service.job_settings(&JobId::new(job_id)))
}

pub(crate) async fn update_settings_handler(
    State(service): State<SharedService>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<SettingsPatch>,
) -> Response {
    let result = acting_user(&headers)
        .and_then(|user| service.update_job_settings(&JobId::new(job_id), &patch, &user));
    respond(StatusCode::OK, result)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CandidateFilter {
    status: Option<String>,
}

pub(crate) async fn candidates_handler(
    State(service): State<SharedService>,
    Path(job_id): Path<String>,
    Query(filter): Query<CandidateFilter>,
) -> Response {
    let status = match filter.status.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => match InterviewStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return failure(InterviewError::Validation(format!(
                    "Unknown interview status '{raw}'"
                )))
            }
        },
        None => None,
    };
    respond(
        StatusCode::OK,
        service.queries().candidates(&JobId::new(job_id), status),
    )
}

pub(crate) async fn stats_handler(
    State(service): State<SharedService>,
    Path(job_id): Path<String>,
) -> Response {
    respond(StatusCode::OK, service.queries().stats(&JobId::new(job_id)))
}

pub(crate) async fn schedule_handler(
    State(service): State<SharedService>,
    Json(request): Json<ScheduleRequest>,
) -> Response {
    respond(StatusCode::CREATED, service.scheduling().schedule(request))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkScheduleBody {
    items: Vec<ScheduleRequest>,
}

pub(crate) async fn bulk_schedule_handler(
    State(service): State<SharedService>,
    Json(body): Json<BulkScheduleBody>,
) -> Response {
    success(StatusCode::OK, service.scheduling().bulk_schedule(body.items))
}

pub(crate) async fn bulk_schedule_csv_handler(
    State(service): State<SharedService>,
    body: String,
) -> Response {
    success(StatusCode::OK, service.bulk_schedule_csv(&body))
}

pub(crate) async fn reschedule_handler(
    State(service): State<SharedService>,
    Path(interview_id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service
            .scheduling()
            .reschedule(&InterviewId::new(interview_id), request),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartCallBody {
    #[serde(default)]
    interview_id: Option<InterviewId>,
    #[serde(default)]
    application_id: Option<ApplicationId>,
}

pub(crate) async fn start_call_handler(
    State(service): State<SharedService>,
    headers: HeaderMap,
    Json(body): Json<StartCallBody>,
) -> Response {
    let target = match (body.interview_id, body.application_id) {
        (Some(interview_id), _) => CallTarget::Interview(interview_id),
        (None, Some(application_id)) => CallTarget::Application(application_id),
        (None, None) => {
            return failure(InterviewError::Validation(
                "interview_id or application_id is required".to_string(),
            ))
        }
    };
    let result =
        acting_user(&headers).and_then(|recruiter| service.calls().start_call(target, &recruiter));
    respond(StatusCode::CREATED, result)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordingBody {
    filename: String,
    #[serde(default)]
    content_type: Option<String>,
    data_base64: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EndCallBody {
    session_id: SessionId,
    duration_seconds: u32,
    #[serde(default)]
    connection_quality: ConnectionQuality,
    #[serde(default)]
    recording: Option<RecordingBody>,
}

pub(crate) async fn end_call_handler(
    State(service): State<SharedService>,
    Json(body): Json<EndCallBody>,
) -> Response {
    let recording = match body.recording {
        Some(recording) => {
            match base64::engine::general_purpose::STANDARD.decode(recording.data_base64.trim()) {
                Ok(bytes) => Some(RecordingUpload {
                    filename: recording.filename,
                    content_type: recording.content_type,
                    bytes,
                }),
                Err(_) => {
                    return failure(InterviewError::Validation(
                        "Recording is not valid base64".to_string(),
                    ))
                }
            }
        }
        None => None,
    };
    let request = EndCallRequest {
        session_id: body.session_id,
        duration_seconds: body.duration_seconds,
        recording,
        connection_quality: body.connection_quality,
    };
    respond(StatusCode::OK, service.calls().end_call(request).await)
}

pub(crate) async fn details_handler(
    State(service): State<SharedService>,
    Path(interview_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let requester = match acting_user(&headers) {
        Ok(user) => user,
        Err(err) => return failure(err),
    };
    respond(
        StatusCode::OK,
        service
            .queries()
            .details(&InterviewId::new(interview_id), &requester)
            .await,
    )
}

pub(crate) async fn override_handler(
    State(service): State<SharedService>,
    Path(interview_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<OverrideRequest>,
) -> Response {
    let result = acting_user(&headers).and_then(|user| {
        service
            .overrides()
            .override_decision(&InterviewId::new(interview_id), request, &user)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn advance_handler(
    State(service): State<SharedService>,
    Json(request): Json<ProgressionRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.progression().move_to_next_stage(request),
    )
}

pub(crate) async fn analyze_handler(
    State(service): State<SharedService>,
    Path(interview_id): Path<String>,
) -> Response {
    let interview_id = InterviewId::new(interview_id);
    let result = service
        .evaluation()
        .request_analysis(&interview_id)
        .map(|()| json!({ "interview_id": interview_id, "queued": true }));
    respond(StatusCode::ACCEPTED, result)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepBody {
    #[serde(default)]
    hours_before: Option<i64>,
}

pub(crate) async fn reminder_sweep_handler(
    State(service): State<SharedService>,
    Json(body): Json<SweepBody>,
) -> Response {
    let hours_before = body
        .hours_before
        .unwrap_or(PipelineConfig::default().reminder_hours_before);
    respond(
        StatusCode::OK,
        service.reminders().send_due_reminders(hours_before),
    )
}
