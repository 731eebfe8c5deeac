use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Normalized calendar request. `start` is always a concrete instant by the
/// time a value of this type exists; relative expressions never cross this
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub description: String,
}

/// Display-formatted projection of an [`Intent`]. The UI automation layer
/// cannot obtain a durable event id on creation, so this is an echo of what
/// was submitted, not a calendar-system identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub title: String,
    #[serde(rename = "start")]
    pub start_display: String,
    #[serde(rename = "end")]
    pub end_display: Option<String>,
    pub description: String,
}

/// One event row read back from the calendar view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Payload shape expected from the external parse service. Missing `title`
/// or `start` fails deserialization, which the adapter treats as failure.
#[derive(Debug, Clone, Deserialize)]
pub struct AIIntent {
    pub title: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Tagged outcome of every public operation. Nothing throws across this
/// boundary; faults are converted into `Error`/`Unsupported` records.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Success {
        message: String,
        event: EventSummary,
    },
    Events {
        events: Vec<EventEntry>,
    },
    /// The creation UI could not be located. The intent echo is preserved so
    /// the caller can decide what to do; this is deliberately not a success.
    LocatorNotFound {
        message: String,
        event: EventSummary,
    },
    Error {
        message: String,
    },
    Unsupported {
        message: String,
    },
}

impl CommandResult {
    pub fn error(message: impl Into<String>) -> Self {
        CommandResult::Error {
            message: message.into(),
        }
    }

    /// Wire shape: a `status` tag plus the variant's fields, matching what
    /// the HTTP surface and CLI print.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CommandResult::Success { message, event } => json!({
                "status": "success",
                "message": message,
                "event": event,
            }),
            CommandResult::Events { events } => json!({
                "status": "success",
                "events": events,
                "count": events.len(),
            }),
            CommandResult::LocatorNotFound { message, event } => json!({
                "status": "locator_not_found",
                "message": message,
                "event": event,
            }),
            CommandResult::Error { message } => json!({
                "status": "error",
                "message": message,
            }),
            CommandResult::Unsupported { message } => json!({
                "status": "unsupported",
                "message": message,
            }),
        }
    }
}

/// Tolerant datetime-string normalization used on JSON boundaries (adapter
/// payloads, the structured create path). Accepts RFC3339 or a naive local
/// timestamp in the configured timezone.
pub fn normalize_datetime(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            let resolved = tz.from_local_datetime(&naive);
            if let Some(local) = resolved.single().or_else(|| resolved.earliest()) {
                return Some(local.with_timezone(&Utc));
            }
        }
    }
    None
}
