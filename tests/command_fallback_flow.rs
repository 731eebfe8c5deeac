use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;

use calendarAgent::clients::browser::{
    BrowserContext, BrowserDriver, CookieRecord, DriverError, LaunchSpec, PageHandle,
};
use calendarAgent::config::{SessionConfig, Timeouts};
use calendarAgent::models::event::CommandResult;
use calendarAgent::service::action_executor::ActionExecutor;
use calendarAgent::service::dispatcher::CommandDispatcher;
use calendarAgent::service::openai_service::{OpenAIClient, decode_intent_payload};
use calendarAgent::service::session_manager::SessionManager;

const TZ: Tz = chrono_tz::America::New_York;

struct FakeOpenAI {
    response: Result<String, String>,
}

#[async_trait]
impl OpenAIClient for FakeOpenAI {
    async fn generate_prompt(
        &self,
        _command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        match &self.response {
            Ok(body) => Ok(body.clone()),
            Err(err) => Err(err.clone().into()),
        }
    }
}

struct FakePage;

#[async_trait]
impl PageHandle for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click_button_labeled(
        &self,
        _label: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn eval_json(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(serde_json::json!([]))
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

struct FakeContext;

#[async_trait]
impl BrowserContext for FakeContext {
    async fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<usize, DriverError> {
        Ok(cookies.len())
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, DriverError> {
        Ok(vec![Arc::new(FakePage)])
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError> {
        Ok(Arc::new(FakePage))
    }

    async fn export_storage_state(&self, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct FakeDriver;

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch_persistent(
        &self,
        _spec: &LaunchSpec,
    ) -> Result<Arc<dyn BrowserContext>, DriverError> {
        Ok(Arc::new(FakeContext))
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

async fn dispatcher_with(openai: Option<Arc<dyn OpenAIClient>>, dir: PathBuf) -> CommandDispatcher {
    let manager = Arc::new(SessionManager::new(
        Arc::new(FakeDriver),
        SessionConfig {
            profile_dir: dir,
            chrome_profile: None,
            executable: None,
            cookies_file: None,
            calendar_url: "https://calendar.example.com".to_string(),
            timeouts: quick_timeouts(),
        },
    ));
    manager.ensure_ready(true, None).await.unwrap();
    let executor = Arc::new(ActionExecutor::new(manager, quick_timeouts(), TZ));
    CommandDispatcher::new(executor, openai, TZ)
}

#[tokio::test]
async fn invalid_adapter_json_falls_back_to_local_parser() {
    let dir = tempfile::tempdir().unwrap();
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Ok("this is not json".to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    let result = dispatcher.handle("create event called Dentist at 3pm").await;
    let CommandResult::Success { event, .. } = result else {
        panic!("expected success via local parser, got {:?}", result);
    };
    assert_eq!(event.title, "Dentist");
}

#[tokio::test]
async fn adapter_transport_error_falls_back_to_local_parser() {
    let dir = tempfile::tempdir().unwrap();
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Err("connection refused".to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    let result = dispatcher.handle("schedule a sync tomorrow at 9am").await;
    assert!(matches!(result, CommandResult::Success { .. }));
}

#[tokio::test]
async fn fenced_adapter_payload_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let payload = "```json\n{\"title\":\"Board review\",\"start\":\"2026-03-05T10:00:00-05:00\",\"end\":null,\"description\":\"quarterly\"}\n```";
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Ok(payload.to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    // Locally unparsable wording; only the adapter can resolve it.
    let result = dispatcher.handle("日程 qe review board asdkjasd").await;
    let CommandResult::Success { event, .. } = result else {
        panic!("expected success via adapter, got {:?}", result);
    };
    assert_eq!(event.title, "Board review");
    assert_eq!(event.description, "quarterly");
}

#[tokio::test]
async fn adapter_payload_missing_start_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Ok("{\"title\":\"Sync\"}".to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    let result = dispatcher.handle("create event called Sync at 4pm").await;
    let CommandResult::Success { event, .. } = result else {
        panic!("expected success via local parser, got {:?}", result);
    };
    assert_eq!(event.title, "Sync");
}

#[tokio::test]
async fn both_parsers_failing_surfaces_a_structured_error() {
    let dir = tempfile::tempdir().unwrap();
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Ok("not json".to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    let result = dispatcher.handle("日程 asdkjasd").await;
    let CommandResult::Error { message } = result else {
        panic!("expected error, got {:?}", result);
    };
    assert!(message.contains("start time"));
}

#[tokio::test]
async fn no_adapter_configured_uses_local_parser_directly() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = dispatcher_with(None, dir.path().to_path_buf()).await;

    let result = dispatcher.handle("create event called Dentist at 3pm").await;
    assert!(matches!(result, CommandResult::Success { .. }));
}

#[tokio::test]
async fn unsupported_commands_never_reach_the_parsers() {
    let dir = tempfile::tempdir().unwrap();
    let openai: Arc<dyn OpenAIClient> = Arc::new(FakeOpenAI {
        response: Err("must not be called".to_string()),
    });
    let dispatcher = dispatcher_with(Some(openai), dir.path().to_path_buf()).await;

    let result = dispatcher.handle("xyz").await;
    let CommandResult::Unsupported { message } = result else {
        panic!("expected unsupported, got {:?}", result);
    };
    assert!(message.contains("xyz"));
}

#[test]
fn decode_rejects_empty_title_and_bad_timestamps() {
    assert!(decode_intent_payload("{\"title\":\"  \",\"start\":\"2026-03-05T10:00:00-05:00\"}", TZ).is_none());
    assert!(decode_intent_payload("{\"title\":\"Sync\",\"start\":\"whenever\"}", TZ).is_none());
    let naive = decode_intent_payload("{\"title\":\"Sync\",\"start\":\"2026-03-05 10:00\"}", TZ);
    assert!(naive.is_some(), "naive local timestamps are tolerated");
}
