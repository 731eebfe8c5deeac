use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use tracing::warn;

use crate::clients::openai_client;
use crate::models::event::{AIIntent, Intent, normalize_datetime};

#[async_trait]
pub trait OpenAIClient: Send + Sync {
    async fn generate_prompt(
        &self,
        command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct OpenAIService {
    api_key: String,
    tz: Tz,
}

impl OpenAIService {
    pub fn new(api_key: String, tz: Tz) -> Self {
        Self { api_key, tz }
    }
}

#[async_trait]
impl OpenAIClient for OpenAIService {
    async fn generate_prompt(
        &self,
        command: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let now = Utc::now().with_timezone(&self.tz);
        openai_client::generate_intent_prompt(command, now, self.tz, &self.api_key).await
    }
}

/// Decode a model payload into a typed intent. Tolerates code-fence
/// wrapping; everything else (undecodable JSON, empty title, unparsable
/// start/end) counts as adapter failure and yields `None` so the caller
/// falls back to the local parser.
pub fn decode_intent_payload(payload: &str, tz: Tz) -> Option<Intent> {
    let body = strip_code_fences(payload);
    let ai_intent: AIIntent = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(%err, "failed to decode intent payload");
            return None;
        }
    };

    let title = ai_intent.title.trim();
    if title.is_empty() {
        warn!("intent payload has an empty title");
        return None;
    }
    let start = normalize_datetime(&ai_intent.start, tz)?;
    let end = match &ai_intent.end {
        Some(end) => Some(normalize_datetime(end, tz)?),
        None => None,
    };

    Some(Intent {
        title: title.to_string(),
        start,
        end,
        description: ai_intent.description.unwrap_or_default(),
    })
}

/// Models sometimes wrap the object in ``` fences despite instructions.
fn strip_code_fences(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
