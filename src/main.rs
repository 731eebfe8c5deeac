#![allow(non_snake_case)]

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use calendarAgent::clients::chromium::ChromiumDriver;
use calendarAgent::config::{AppConfig, CalendarConfig};
use calendarAgent::handlers::api::AppState;
use calendarAgent::service::action_executor::ActionExecutor;
use calendarAgent::service::dispatcher::CommandDispatcher;
use calendarAgent::service::openai_service::{OpenAIClient, OpenAIService};
use calendarAgent::service::session_manager::SessionManager;
use calendarAgent::{cli, runtime};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    };
    let config = CalendarConfig::load(&app_config);

    let driver = Arc::new(ChromiumDriver::new());
    let session = Arc::new(SessionManager::new(driver, config.session.clone()));
    let executor = Arc::new(ActionExecutor::new(
        session.clone(),
        config.session.timeouts,
        config.timezone,
    ));
    let openai: Option<Arc<dyn OpenAIClient>> = config
        .openai_api_key
        .clone()
        .map(|key| Arc::new(OpenAIService::new(key, config.timezone)) as Arc<dyn OpenAIClient>);
    let dispatcher = Arc::new(CommandDispatcher::new(executor, openai, config.timezone));

    if config.run_mode == "api" {
        let state = AppState {
            session,
            dispatcher,
            tz: config.timezone,
        };
        runtime::run_api(state, config.port).await;
    } else if config.run_mode == "cli" {
        cli::cli(session, dispatcher, config.timezone).await;
    } else {
        println!("Invalid run mode {}", config.run_mode);
    }
}
