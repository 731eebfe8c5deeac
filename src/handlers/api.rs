use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use warp::Filter;
use warp::http::StatusCode;

use crate::models::event::{Intent, normalize_datetime};
use crate::service::dispatcher::CommandDispatcher;
use crate::service::session_manager::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub tz: Tz,
}

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    #[serde(default)]
    pub headless: Option<bool>,
    #[serde(default, rename = "profileDir")]
    pub profile_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl warp::Reply> + Clone {
    let opening = warp::path("opening")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            let now = Utc::now().with_timezone(&state.tz);
            warp::reply::json(&json!({ "message": opening_message(now) }))
        });

    let init = warp::path!("calendar" / "init")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_init);

    let command = warp::path!("calendar" / "command")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_command);

    let create = warp::path!("calendar" / "create")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_create);

    let voice = warp::path("voice")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .map(|body: bytes::Bytes| {
            warp::reply::json(&json!({ "status": "received", "bytes": body.len() }))
        });

    opening
        .or(init)
        .or(command)
        .or(create)
        .or(voice)
        .recover(handle_rejection)
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

const GREETINGS: [&str; 5] = [
    "How may I help you today?",
    "I'm ready when you are—what's on your mind?",
    "What would you like to schedule or check?",
    "How can I assist with your calendar right now?",
    "Tell me what you need and I'll handle it.",
];

fn opening_message(now: DateTime<Tz>) -> String {
    let prefix = match now.hour() {
        0..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    };
    let pick = (now.timestamp().unsigned_abs() as usize) % GREETINGS.len();
    format!("{}. {}", prefix, GREETINGS[pick])
}

async fn handle_init(body: InitRequest, state: AppState) -> Result<impl warp::Reply, Infallible> {
    match state
        .session
        .ensure_ready(
            body.headless.unwrap_or(false),
            body.profile_dir.map(PathBuf::from),
        )
        .await
    {
        Ok(status) => {
            let mut response = json!({
                "status": "ready",
                "authenticated": status.authenticated,
            });
            if !status.authenticated {
                // Attach a capture so a human can see the login prompt.
                if let Some(bytes) = state.session.screenshot().await {
                    response["screenshotBase64"] = json!(BASE64.encode(bytes));
                }
            }
            Ok(warp::reply::with_status(
                warp::reply::json(&response),
                StatusCode::OK,
            ))
        }
        Err(err) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": err.to_string() })),
            StatusCode::INTERNAL_SERVER_ERROR,
        )),
    }
}

async fn handle_command(
    body: CommandRequest,
    state: AppState,
) -> Result<impl warp::Reply, Infallible> {
    if body.command.trim().is_empty() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": "Missing required field: command" })),
            StatusCode::BAD_REQUEST,
        ));
    }
    let result = state.dispatcher.handle(&body.command).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&result.to_json()),
        StatusCode::OK,
    ))
}

async fn handle_create(
    body: CreateRequest,
    state: AppState,
) -> Result<impl warp::Reply, Infallible> {
    let Some(start) = normalize_datetime(&body.start, state.tz) else {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": format!("Unparsable start time: {}", body.start) })),
            StatusCode::BAD_REQUEST,
        ));
    };
    let end = match &body.end {
        Some(end) => match normalize_datetime(end, state.tz) {
            Some(end) => Some(end),
            None => {
                return Ok(warp::reply::with_status(
                    warp::reply::json(&json!({ "error": format!("Unparsable end time: {}", end) })),
                    StatusCode::BAD_REQUEST,
                ));
            }
        },
        None => None,
    };

    let title = body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled Event")
        .to_string();
    let intent = Intent {
        title,
        start,
        end,
        description: body.description.unwrap_or_default(),
    };
    let result = state.dispatcher.create_structured(&intent).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&result.to_json()),
        StatusCode::OK,
    ))
}

async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (message, status) = if err.is_not_found() {
        ("Not found".to_string(), StatusCode::NOT_FOUND)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (e.to_string(), StatusCode::BAD_REQUEST)
    } else {
        (
            "Internal server error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}
