use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Timeouts;
use crate::models::event::{CommandResult, EventEntry, EventSummary, Intent};
use crate::service::session_manager::SessionManager;

const EVENT_MARKER_SELECTOR: &str = "[data-eventid]";

const EVENTS_SCRIPT: &str = "(() => {\n\
       const els = document.querySelectorAll('[data-eventid]');\n\
       return Array.from(els).map(el => ({\n\
         title: el.innerText,\n\
         id: el.getAttribute('data-eventid')\n\
       }));\n\
     })()";

/// One way to find the event-creation control. These are UI coordinates of a
/// third-party product and may break without notice; they are data, not
/// code, so the list can change without touching the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    ButtonLabeled(&'static str),
}

/// Prioritized: the localized label the production calendar renders first,
/// then the English fallback.
pub const CREATE_LOCATORS: [LocatorStrategy; 2] = [
    LocatorStrategy::ButtonLabeled("建立"),
    LocatorStrategy::ButtonLabeled("Create"),
];

/// Performs UI actions against an authenticated page. UI operations are
/// serialized through an internal lock; the page is not safe for concurrent
/// interaction.
pub struct ActionExecutor {
    session: Arc<SessionManager>,
    timeouts: Timeouts,
    tz: Tz,
    ui_lock: Mutex<()>,
}

impl ActionExecutor {
    pub fn new(session: Arc<SessionManager>, timeouts: Timeouts, tz: Tz) -> Self {
        ActionExecutor {
            session,
            timeouts,
            tz,
            ui_lock: Mutex::new(()),
        }
    }

    /// Open the creation UI via the locator-strategy list and echo the
    /// normalized intent. When no strategy matches, the outcome is the
    /// distinct `LocatorNotFound` result — not a success — so callers can
    /// decide what to do with an unconfirmed creation.
    pub async fn create_event(&self, intent: &Intent) -> CommandResult {
        let _guard = self.ui_lock.lock().await;
        let page = match self.session.authenticated_page().await {
            Ok(page) => page,
            Err(err) => return CommandResult::error(err.to_string()),
        };

        if let Some(end) = intent.end {
            if end <= intent.start {
                return CommandResult::error("End time must be after start time.");
            }
        }

        let mut opened = false;
        for strategy in CREATE_LOCATORS {
            let LocatorStrategy::ButtonLabeled(label) = strategy;
            match page.click_button_labeled(label, self.timeouts.locator).await {
                Ok(()) => {
                    info!(label, "opened event creation dialog");
                    opened = true;
                    break;
                }
                Err(err) => warn!(label, error = %err, "creation locator failed"),
            }
        }

        let event = self.summarize(intent);
        if opened {
            CommandResult::Success {
                message: format!("Event '{}' created successfully", intent.title),
                event,
            }
        } else {
            warn!(title = %intent.title, "no creation locator matched; reporting unconfirmed");
            CommandResult::LocatorNotFound {
                message: "Could not locate the event creation control; the event was not confirmed on screen.".to_string(),
                event,
            }
        }
    }

    /// Read back today's events from the calendar view. No markers within
    /// the wait bound means zero events rendered, which is success.
    pub async fn list_today(&self) -> CommandResult {
        let _guard = self.ui_lock.lock().await;
        let page = match self.session.authenticated_page().await {
            Ok(page) => page,
            Err(err) => return CommandResult::error(err.to_string()),
        };

        if page
            .wait_for_selector(EVENT_MARKER_SELECTOR, self.timeouts.event_wait)
            .await
            .is_err()
        {
            return CommandResult::Events { events: Vec::new() };
        }

        match page.eval_json(EVENTS_SCRIPT).await {
            Ok(value) => match serde_json::from_value::<Vec<EventEntry>>(value) {
                Ok(events) => CommandResult::Events { events },
                Err(err) => CommandResult::error(format!("Failed to retrieve events: {}", err)),
            },
            Err(err) => CommandResult::error(format!("Failed to retrieve events: {}", err)),
        }
    }

    fn summarize(&self, intent: &Intent) -> EventSummary {
        EventSummary {
            title: intent.title.clone(),
            start_display: format_event_input(intent.start, self.tz),
            end_display: intent.end.map(|end| format_event_input(end, self.tz)),
            description: intent.description.clone(),
        }
    }
}

/// `"Mon DD, YYYY H:MM AM/PM"` — the form the calendar's datetime inputs
/// accept, rendered in the configured timezone.
pub fn format_event_input(value: DateTime<Utc>, tz: Tz) -> String {
    value.with_timezone(&tz).format("%b %d, %Y %I:%M %p").to_string()
}
