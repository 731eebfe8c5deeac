/// Coarse keyword routing for raw commands. This is a routing hint, not an
/// NLP classifier; anything finer-grained belongs to the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    Create,
    ReadToday,
    Unsupported,
}

const CREATE_KEYWORDS: [&str; 4] = ["create", "add", "schedule", "日程"];
const READ_KEYWORDS: [&str; 3] = ["show", "view", "today"];

/// Creation keywords win when both sets match ("schedule lunch today" is a
/// create, not a read).
pub fn route_command(text: &str) -> CommandRoute {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return CommandRoute::Unsupported;
    }

    if CREATE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommandRoute::Create;
    }

    if READ_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return CommandRoute::ReadToday;
    }

    CommandRoute::Unsupported
}
