use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use calendarAgent::clients::browser::{
    BrowserContext, BrowserDriver, CookieRecord, DriverError, LaunchSpec, PageHandle,
};
use calendarAgent::config::{SessionConfig, Timeouts};
use calendarAgent::models::event::{CommandResult, Intent};
use calendarAgent::service::action_executor::{ActionExecutor, format_event_input};
use calendarAgent::service::session_manager::SessionManager;

const TZ: Tz = chrono_tz::America::New_York;

struct FakePage {
    authenticated: bool,
    clickable_label: Option<&'static str>,
    clicked: Mutex<Vec<String>>,
    has_events: bool,
    events_json: serde_json::Value,
}

impl FakePage {
    fn authenticated(clickable_label: Option<&'static str>) -> Self {
        FakePage {
            authenticated: true,
            clickable_label,
            clicked: Mutex::new(Vec::new()),
            has_events: false,
            events_json: serde_json::json!([]),
        }
    }

    fn with_events(events_json: serde_json::Value) -> Self {
        FakePage {
            authenticated: true,
            clickable_label: None,
            clicked: Mutex::new(Vec::new()),
            has_events: true,
            events_json,
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let present = if selector.contains("eventid") {
            self.has_events
        } else {
            self.authenticated
        };
        if present {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }

    async fn click_button_labeled(
        &self,
        label: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        self.clicked.lock().await.push(label.to_string());
        if self.clickable_label == Some(label) {
            Ok(())
        } else {
            Err(DriverError::NotFound(label.to_string()))
        }
    }

    async fn eval_json(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(self.events_json.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(Vec::new())
    }

    async fn is_usable(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct FakeContext {
    page: Arc<FakePage>,
}

#[async_trait]
impl BrowserContext for FakeContext {
    async fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<usize, DriverError> {
        Ok(cookies.len())
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, DriverError> {
        Ok(vec![self.page.clone()])
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError> {
        Ok(self.page.clone())
    }

    async fn export_storage_state(&self, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct FakeDriver {
    page: Arc<FakePage>,
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch_persistent(
        &self,
        _spec: &LaunchSpec,
    ) -> Result<Arc<dyn BrowserContext>, DriverError> {
        Ok(Arc::new(FakeContext {
            page: self.page.clone(),
        }))
    }
}

fn quick_timeouts() -> Timeouts {
    Timeouts {
        launch: Duration::from_millis(500),
        navigation: Duration::from_millis(200),
        auth_probe: Duration::from_millis(100),
        render_delay: Duration::from_millis(10),
        locator: Duration::from_millis(100),
        event_wait: Duration::from_millis(100),
    }
}

async fn executor_over(page: Arc<FakePage>, dir: PathBuf) -> ActionExecutor {
    let unauthenticated = !page.authenticated;
    let manager = Arc::new(SessionManager::new(
        Arc::new(FakeDriver { page }),
        SessionConfig {
            profile_dir: dir,
            chrome_profile: None,
            executable: None,
            cookies_file: None,
            calendar_url: "https://calendar.example.com".to_string(),
            timeouts: quick_timeouts(),
        },
    ));
    let status = manager.ensure_ready(true, None).await.unwrap();
    assert_eq!(status.authenticated, !unauthenticated);
    ActionExecutor::new(manager, quick_timeouts(), TZ)
}

fn sample_intent() -> Intent {
    Intent {
        title: "Dentist".to_string(),
        start: Utc.with_ymd_and_hms(2026, 3, 4, 20, 0, 0).unwrap(),
        end: None,
        description: String::new(),
    }
}

#[tokio::test]
async fn create_event_succeeds_when_a_locator_matches() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::authenticated(Some("建立")));
    let executor = executor_over(page.clone(), dir.path().to_path_buf()).await;

    let result = executor.create_event(&sample_intent()).await;
    let CommandResult::Success { message, event } = result else {
        panic!("expected success, got {:?}", result);
    };
    assert!(message.contains("Dentist"));
    assert_eq!(event.title, "Dentist");
    // 2026-03-04 20:00 UTC is 3:00 PM in New York.
    assert_eq!(event.start_display, "Mar 04, 2026 03:00 PM");
    assert!(event.end_display.is_none());
    assert_eq!(*page.clicked.lock().await, vec!["建立".to_string()]);
}

#[tokio::test]
async fn create_event_walks_locators_in_priority_order() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::authenticated(Some("Create")));
    let executor = executor_over(page.clone(), dir.path().to_path_buf()).await;

    let result = executor.create_event(&sample_intent()).await;
    assert!(matches!(result, CommandResult::Success { .. }));
    assert_eq!(
        *page.clicked.lock().await,
        vec!["建立".to_string(), "Create".to_string()]
    );
}

#[tokio::test]
async fn create_event_reports_locator_not_found_instead_of_soft_success() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::authenticated(None));
    let executor = executor_over(page.clone(), dir.path().to_path_buf()).await;

    let result = executor.create_event(&sample_intent()).await;
    let CommandResult::LocatorNotFound { event, .. } = result else {
        panic!("expected locator_not_found, got {:?}", result);
    };
    assert_eq!(event.title, "Dentist");
    assert_eq!(page.clicked.lock().await.len(), 2, "every strategy attempted");
}

#[tokio::test]
async fn create_event_rejects_end_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::authenticated(Some("建立")));
    let executor = executor_over(page.clone(), dir.path().to_path_buf()).await;

    let mut intent = sample_intent();
    intent.end = Some(intent.start - chrono::Duration::hours(1));
    let result = executor.create_event(&intent).await;
    let CommandResult::Error { message } = result else {
        panic!("expected error, got {:?}", result);
    };
    assert!(message.contains("after start"));
    assert!(page.clicked.lock().await.is_empty(), "no UI action attempted");
}

#[tokio::test]
async fn operations_require_an_authenticated_session() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage {
        authenticated: false,
        clickable_label: None,
        clicked: Mutex::new(Vec::new()),
        has_events: false,
        events_json: serde_json::json!([]),
    });
    let executor = executor_over(page, dir.path().to_path_buf()).await;

    let create = executor.create_event(&sample_intent()).await;
    assert!(matches!(create, CommandResult::Error { .. }));
    let list = executor.list_today().await;
    assert!(matches!(list, CommandResult::Error { .. }));
}

#[tokio::test]
async fn list_today_extracts_marker_elements() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::with_events(serde_json::json!([
        { "title": "Standup", "id": "ev1" },
        { "title": "Dentist", "id": "ev2" },
    ])));
    let executor = executor_over(page, dir.path().to_path_buf()).await;

    let result = executor.list_today().await;
    let CommandResult::Events { events } = result else {
        panic!("expected events, got {:?}", result);
    };
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].title, "Standup");
    assert_eq!(events[1].id.as_deref(), Some("ev2"));
}

#[tokio::test]
async fn list_today_with_no_markers_is_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::authenticated(None));
    let executor = executor_over(page, dir.path().to_path_buf()).await;

    let result = executor.list_today().await;
    assert_eq!(result, CommandResult::Events { events: Vec::new() });
}

#[test]
fn event_input_formatting_matches_the_ui_convention() {
    let value = Utc.with_ymd_and_hms(2026, 12, 25, 14, 30, 0).unwrap();
    assert_eq!(format_event_input(value, TZ), "Dec 25, 2026 09:30 AM");
}
