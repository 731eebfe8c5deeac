use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

/// Ask the external language model to turn a raw calendar command into a
/// single JSON intent object. The returned string is the raw model output;
/// decoding and validation happen at the caller's boundary.
pub async fn generate_intent_prompt(
    command: &str,
    now: DateTime<Tz>,
    tz: Tz,
    api_key: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let full_prompt = format!(
        "You are a calendar intent extraction engine.\n\
         Current date and time ({tz}): {now}\n\
         User timezone: {tz}\n\
         Week convention: weeks start on Monday.\n\
         Task: From the user message below, extract a calendar event intent:\n\
         - \"title\": a short event title with scheduling words removed. For example:\n\
           - \"schedule a meeting tomorrow at 10am\" -> \"meeting\"\n\
           - \"create event called Dentist at 3pm\" -> \"Dentist\"\n\
         - \"start\": an RFC3339 datetime string in the user's timezone. Required.\n\
         - \"end\": an RFC3339 datetime string, or null when the user gave no end time.\n\
         - \"description\": extra detail from the message, or null.\n\
         Rules:\n\
         - The user writes times in 12-hour form (\"3pm\", \"10:30 am\"); output must be RFC3339 regardless.\n\
         - If the user gives a relative day (\"tomorrow\", \"next friday\"), resolve it from the current date.\n\
         - Never invent an end time; use null when none was given.\n\
         - Output ONLY raw JSON, no prose, markdown, or code fences.\n\
         - The JSON shape must be exactly:\n\
         {{\"title\":\"<string>\",\"start\":\"<RFC3339>\",\"end\":\"<RFC3339 or null>\",\"description\":\"<string or null>\"}}\n\
         User message: \"{command}\"",
        tz = tz,
        now = now.to_rfc3339(),
        command = command,
    );

    query_openai(full_prompt, api_key).await
}

async fn query_openai(
    prompt: String,
    api_key: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let system_message = "You are a strict JSON calendar intent extraction engine. You read \
         instructions and a user message and reply ONLY with a single JSON object, with no \
         markdown, no backticks, and no extra text.";

    let request: OpenAIRequest = OpenAIRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![
            OpenAIMessage {
                role: "system".to_string(),
                content: system_message.to_string(),
            },
            OpenAIMessage {
                role: "user".to_string(),
                content: prompt,
            },
        ],
        max_tokens: 1500,
        temperature: 0.2,
    };

    let client = reqwest::Client::new();
    let response = client
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?; // read the body once

    if !status.is_success() {
        warn!(%status, body = %text, "intent extraction request failed");
        return Err(format!("Request failed with status {}", status).into());
    }

    let parsed: OpenAIResponse = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse JSON: {}\nRaw body: {}", e, text))?;

    if let Some(choice) = parsed.choices.first() {
        Ok(choice.message.content.clone())
    } else {
        warn!(body = %text, "no choices found in intent extraction response");
        Err("No response from OpenAI".to_string().into())
    }
}
