use chrono::Duration;

use super::common::*;

use crate::workflows::telephonic::domain::{ApplicationId, InterviewStatus};
use crate::workflows::telephonic::error::ErrorKind;
use crate::workflows::telephonic::integrations::EventKind;
use crate::workflows::telephonic::scheduling::RescheduleRequest;
use crate::workflows::telephonic::tasks::EmailTask;

#[test]
fn scheduling_in_the_future_marks_interview_scheduled() {
    let harness = Harness::new();
    let service = harness.service();
    let at = harness.now() + Duration::hours(2);

    let interview = service
        .scheduling()
        .schedule(schedule_request(1, at))
        .expect("schedule");

    assert_eq!(interview.status, InterviewStatus::Scheduled);
    assert_eq!(interview.scheduled_at, Some(at));
    assert_eq!(interview.duration_minutes, 45);
    assert_eq!(interview.timezone, "Asia/Kolkata");
    assert!(interview.notification_sent);
    assert!(interview.email_sent);
    assert_eq!(
        harness.notifier.kinds_for(&candidate(1)),
        vec![EventKind::InterviewScheduled]
    );
    assert!(matches!(
        harness.queue.emails().as_slice(),
        [EmailTask::InterviewScheduled { .. }]
    ));
}

#[test]
fn scheduling_now_or_in_the_past_is_rejected() {
    let harness = Harness::new();
    let service = harness.service();

    for at in [harness.now(), harness.now() - Duration::minutes(1)] {
        let err = service
            .scheduling()
            .schedule(schedule_request(1, at))
            .expect_err("not in the future");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Scheduled time must be in the future");
    }
}

#[test]
fn failed_notification_leaves_flag_unset() {
    let harness = Harness::new();
    harness.notifier.go_offline();

    let interview = harness
        .service()
        .scheduling()
        .schedule(schedule_request(1, harness.now() + Duration::hours(1)))
        .expect("schedule still succeeds");

    assert_eq!(interview.status, InterviewStatus::Scheduled);
    assert!(!interview.notification_sent);
    assert!(interview.email_sent);
}

#[test]
fn default_duration_comes_from_job_settings() {
    let harness = Harness::new();
    let mut request = schedule_request(1, harness.now() + Duration::hours(1));
    request.duration_minutes = None;
    request.timezone = None;

    let interview = harness
        .service()
        .scheduling()
        .schedule(request)
        .expect("schedule");

    assert_eq!(interview.duration_minutes, 30);
    assert_eq!(interview.timezone, "UTC");
}

#[test]
fn bulk_schedule_isolates_failing_items() {
    let harness = Harness::new();
    let service = harness.service();
    let future = harness.now() + Duration::hours(3);

    let mut unknown = schedule_request(1, future);
    unknown.application_id = ApplicationId::new("app-404");
    let report = service.scheduling().bulk_schedule(vec![
        schedule_request(1, future),
        unknown,
        schedule_request(2, harness.now() - Duration::hours(1)),
        schedule_request(3, future),
    ]);

    assert_eq!(report.scheduled_count, 2);
    assert_eq!(report.failed_count, 2);
    assert_eq!(report.errors[0].application_id.as_str(), "app-404");
    assert_eq!(report.errors[0].reason, "Application not found");
    assert_eq!(report.errors[1].application_id, application(2));
    assert_eq!(report.errors[1].reason, "Scheduled time must be in the future");
}

#[test]
fn csv_bulk_schedule_reports_parse_and_schedule_errors_together() {
    let harness = Harness::new();
    let csv = "application_id,scheduled_at,duration_minutes,timezone,notes\n\
               app-1,2030-01-02T10:00:00Z,30,UTC,\n\
               app-2,tomorrow,,,\n\
               app-3,2029-12-31T10:00:00Z,,,\n";

    let report = harness.service().bulk_schedule_csv(csv);

    assert_eq!(report.scheduled_count, 1);
    assert_eq!(report.failed_count, 2);
    let failed: Vec<&str> = report
        .errors
        .iter()
        .map(|error| error.application_id.as_str())
        .collect();
    assert!(failed.contains(&"app-2"));
    assert!(failed.contains(&"app-3"));
}

#[test]
fn reschedule_resets_reminder_and_appends_notes() {
    let harness = Harness::new();
    let service = harness.service();
    let mut request = schedule_request(1, harness.now() + Duration::hours(5));
    request.notes = Some("Prefers mornings".to_string());
    let interview = service.scheduling().schedule(request).expect("schedule");

    service
        .reminders()
        .send_due_reminders(24)
        .expect("sweep");

    let new_time = harness.now() + Duration::days(2);
    let moved = service
        .scheduling()
        .reschedule(
            &interview.id,
            RescheduleRequest {
                scheduled_at: new_time,
                duration_minutes: Some(60),
                timezone: None,
                notes: Some("Candidate asked to move".to_string()),
            },
        )
        .expect("reschedule");

    assert_eq!(moved.scheduled_at, Some(new_time));
    assert_eq!(moved.duration_minutes, 60);
    assert_eq!(moved.timezone, "Asia/Kolkata");
    assert!(!moved.reminder_sent);
    assert_eq!(
        moved.notes.as_deref(),
        Some("Prefers mornings\nCandidate asked to move")
    );
    assert!(harness
        .notifier
        .kinds_for(&candidate(1))
        .contains(&EventKind::InterviewRescheduled));
}

#[tokio::test]
async fn completed_interview_cannot_be_rescheduled() {
    let harness = Harness::new();
    let service = harness.service();
    let (interview_id, _) = harness.completed_interview(&service, 1).await;

    let err = service
        .scheduling()
        .reschedule(
            &interview_id,
            RescheduleRequest {
                scheduled_at: harness.now() + Duration::days(1),
                duration_minutes: None,
                timezone: None,
                notes: None,
            },
        )
        .expect_err("completed interviews stay put");
    assert_eq!(err.kind(), ErrorKind::State);
}
