use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::models::event::{CommandResult, Intent};
use crate::service::action_executor::ActionExecutor;
use crate::service::intent_parser;
use crate::service::openai_service::{OpenAIClient, decode_intent_payload};
use crate::service::routing::{CommandRoute, route_command};

/// Routes a raw instruction to create/read behavior and orchestrates
/// external parse → local parser → executor. Every fault is converted into a
/// structured `CommandResult` at this boundary.
pub struct CommandDispatcher {
    executor: Arc<ActionExecutor>,
    openai: Option<Arc<dyn OpenAIClient>>,
    tz: Tz,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<ActionExecutor>, openai: Option<Arc<dyn OpenAIClient>>, tz: Tz) -> Self {
        CommandDispatcher {
            executor,
            openai,
            tz,
        }
    }

    pub async fn handle(&self, command: &str) -> CommandResult {
        info!(command, "received command");
        match route_command(command) {
            CommandRoute::Create => {
                let intent = match self.parse_intent(command).await {
                    Ok(intent) => intent,
                    Err(err) => return CommandResult::error(err.to_string()),
                };
                info!(title = %intent.title, start = %intent.start, end = ?intent.end, "parsed intent");
                self.executor.create_event(&intent).await
            }
            CommandRoute::ReadToday => self.executor.list_today().await,
            CommandRoute::Unsupported => {
                info!(command, "unsupported command");
                CommandResult::Unsupported {
                    message: format!("Command not recognized: {}", command),
                }
            }
        }
    }

    /// Direct structured path, bypassing NLP.
    pub async fn create_structured(&self, intent: &Intent) -> CommandResult {
        self.executor.create_event(intent).await
    }

    pub async fn read_today(&self) -> CommandResult {
        self.executor.list_today().await
    }

    /// Best-effort external parse first; on any adapter failure fall back to
    /// the local layered parser. The adapter is never retried.
    async fn parse_intent(&self, command: &str) -> Result<Intent, intent_parser::ParseError> {
        if let Some(openai) = &self.openai {
            match openai.generate_prompt(command).await {
                Ok(payload) => {
                    if let Some(intent) = decode_intent_payload(&payload, self.tz) {
                        return Ok(intent);
                    }
                    warn!("external parse returned an unusable payload; using local parser");
                }
                Err(err) => {
                    warn!(error = %err, "external parse unavailable; using local parser");
                }
            }
        }
        let now = Utc::now().with_timezone(&self.tz);
        intent_parser::parse(command, now)
    }
}
