//! CSV intake for bulk scheduling.
//!
//! Expected header: `application_id,scheduled_at,duration_minutes,timezone,notes`. Only the
//! first two columns are required; `scheduled_at` is RFC 3339.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::ApplicationId;
use super::error::ItemError;
use super::scheduling::ScheduleRequest;

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    application_id: String,
    scheduled_at: String,
    #[serde(default)]
    duration_minutes: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Parsed rows plus one error per row that could not be turned into a request.
#[derive(Debug, Default)]
pub struct ScheduleImport {
    pub requests: Vec<ScheduleRequest>,
    pub errors: Vec<ItemError>,
}

pub fn parse_schedule_csv(input: &str) -> ScheduleImport {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut import = ScheduleImport::default();
    for (index, record) in reader.deserialize::<ScheduleRow>().enumerate() {
        let line = index + 2;
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                import.errors.push(ItemError {
                    application_id: ApplicationId::new(format!("row {line}")),
                    reason: format!("malformed row: {err}"),
                });
                continue;
            }
        };
        match row_to_request(&row) {
            Ok(request) => import.requests.push(request),
            Err(reason) => import.errors.push(ItemError {
                application_id: if row.application_id.is_empty() {
                    ApplicationId::new(format!("row {line}"))
                } else {
                    ApplicationId::new(row.application_id.clone())
                },
                reason,
            }),
        }
    }
    import
}

fn row_to_request(row: &ScheduleRow) -> Result<ScheduleRequest, String> {
    if row.application_id.is_empty() {
        return Err("application_id is required".to_string());
    }
    let scheduled_at = DateTime::parse_from_rfc3339(&row.scheduled_at)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| format!("invalid scheduled_at '{}'", row.scheduled_at))?;
    let duration_minutes = match non_empty(&row.duration_minutes) {
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| format!("invalid duration_minutes '{raw}'"))?,
        ),
        None => None,
    };

    Ok(ScheduleRequest {
        application_id: ApplicationId::new(row.application_id.clone()),
        scheduled_at,
        duration_minutes,
        timezone: non_empty(&row.timezone).map(str::to_string),
        notes: non_empty(&row.notes).map(str::to_string),
        send_notification: true,
        send_email: true,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
