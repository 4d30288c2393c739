use chrono::Duration;

use super::common::*;

use crate::workflows::telephonic::integrations::EventKind;
use crate::workflows::telephonic::reminders::MAX_REMINDER_HOURS;
use crate::workflows::telephonic::InterviewError;
use crate::workflows::telephonic::tasks::EmailTask;

#[test]
fn second_sweep_sends_nothing_new() {
    let harness = Harness::new();
    let service = harness.service();
    service
        .scheduling()
        .schedule(schedule_request(1, harness.now() + Duration::hours(3)))
        .expect("soon");
    service
        .scheduling()
        .schedule(schedule_request(2, harness.now() + Duration::hours(30)))
        .expect("later");

    let first = service.reminders().send_due_reminders(24).expect("sweep");
    let second = service.reminders().send_due_reminders(24).expect("sweep");

    assert_eq!(first.sent, 1);
    assert_eq!(second.due, 0);
    assert_eq!(second.sent, 0);
    let reminders: Vec<_> = harness
        .notifier
        .kinds_for(&candidate(1))
        .into_iter()
        .filter(|kind| *kind == EventKind::InterviewReminder)
        .collect();
    assert_eq!(reminders.len(), 1);
    assert!(harness
        .notifier
        .kinds_for(&candidate(2))
        .iter()
        .all(|kind| *kind != EventKind::InterviewReminder));
    let reminder_emails = harness
        .queue
        .emails()
        .into_iter()
        .filter(|email| matches!(email, EmailTask::InterviewReminder { .. }))
        .count();
    assert_eq!(reminder_emails, 1);
}

#[test]
fn reschedule_makes_interview_eligible_again() {
    let harness = Harness::new();
    let service = harness.service();
    let interview = service
        .scheduling()
        .schedule(schedule_request(1, harness.now() + Duration::hours(3)))
        .expect("schedule");
    service.reminders().send_due_reminders(24).expect("sweep");

    service
        .scheduling()
        .reschedule(
            &interview.id,
            crate::workflows::telephonic::RescheduleRequest {
                scheduled_at: harness.now() + Duration::hours(6),
                duration_minutes: None,
                timezone: None,
                notes: None,
            },
        )
        .expect("reschedule");

    let report = service.reminders().send_due_reminders(24).expect("sweep");
    assert_eq!(report.sent, 1);
}

#[test]
fn out_of_range_window_is_rejected() {
    let harness = Harness::new();
    let service = harness.service();
    harness.schedule(&service, 1);

    for hours_before in [-1, MAX_REMINDER_HOURS + 1, 10_000_000_000] {
        let err = service
            .reminders()
            .send_due_reminders(hours_before)
            .expect_err("window rejected");
        assert!(matches!(err, InterviewError::Validation(_)));
    }
    assert!(harness
        .notifier
        .kinds_for(&candidate(1))
        .iter()
        .all(|kind| *kind != EventKind::InterviewReminder));

    let report = service
        .reminders()
        .send_due_reminders(MAX_REMINDER_HOURS)
        .expect("widest window accepted");
    assert_eq!(report.sent, 1);
}
