use crate::cli::ServeArgs;
use crate::infra::{interview_context, AppState, LoggingEmailSender, SeedData};
use crate::routes::with_interview_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use interview_ai::config::{AppConfig, PipelineConfig};
use interview_ai::error::AppError;
use interview_ai::telemetry;
use interview_ai::workflows::telephonic::{
    ChannelTaskQueue, InMemoryInterviewStore, RetryPolicy, SystemClock, TaskWorker,
    TelephonicInterviewService,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryInterviewStore::new());
    if let Some(path) = args.seed.take() {
        let seed = SeedData::load(&path).await?;
        let (jobs, applications) = (seed.jobs.len(), seed.applications.len());
        seed.apply(&store)?;
        info!(path = %path.display(), jobs, applications, "seed data loaded");
    }

    let (queue, receiver) = ChannelTaskQueue::new();
    let context = interview_context(&config, store, Arc::new(queue), Arc::new(SystemClock))?;
    let service = Arc::new(TelephonicInterviewService::new(context));

    tokio::spawn(
        TaskWorker::new(
            receiver,
            service.evaluation(),
            Arc::new(LoggingEmailSender),
            RetryPolicy::from(&config.pipeline),
        )
        .run(),
    );
    tokio::spawn(sweep_reminders(service.clone(), config.pipeline.clone()));

    let app = with_interview_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        transcription = config.ai.transcription_url.is_some(),
        scoring = config.ai.scoring_url.is_some(),
        "telephonic interview service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn sweep_reminders(service: Arc<TelephonicInterviewService>, pipeline: PipelineConfig) {
    let mut ticker = tokio::time::interval(pipeline.reminder_interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match service
            .reminders()
            .send_due_reminders(pipeline.reminder_hours_before)
        {
            Ok(report) if report.sent > 0 => {
                info!(sent = report.sent, skipped = report.skipped, "reminders sent")
            }
            Ok(report) => debug!(due = report.due, "no reminders due"),
            Err(err) => warn!(error = %err, "reminder sweep failed"),
        }
    }
}
