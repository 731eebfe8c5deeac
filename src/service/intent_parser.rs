use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_english::{Dialect, parse_date_string};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::models::event::Intent;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Could not determine start time from your command.")]
    NoStartTime,
}

/// Coarse relative-date signal extracted before full time resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHint {
    Today,
    Tomorrow,
}

struct TimeWindow {
    start: DateTime<Tz>,
    end: Option<DateTime<Tz>>,
}

type Strategy = fn(&str, DateTime<Tz>, Option<DayHint>) -> Option<TimeWindow>;

/// Ordered resolution layers; the first one that yields a window wins.
const STRATEGIES: [(&str, Strategy); 4] = [
    ("explicit-window", explicit_window),
    ("start-with-duration", start_with_duration),
    ("natural-phrase", natural_phrase),
    ("heuristic-fallback", heuristic_fallback),
];

/// Turn free text into a normalized intent relative to `now`. Pure function,
/// no I/O. Fails only when no layer can find a start time.
pub fn parse(text: &str, now: DateTime<Tz>) -> Result<Intent, ParseError> {
    let title = extract_title(text);
    let hint = detect_day_hint(text);

    for (name, strategy) in STRATEGIES {
        if let Some(window) = strategy(text, now, hint) {
            debug!(strategy = name, "resolved time window");
            return Ok(Intent {
                title,
                start: window.start.with_timezone(&Utc),
                end: window.end.map(|end| end.with_timezone(&Utc)),
                description: String::new(),
            });
        }
    }

    Err(ParseError::NoStartTime)
}

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:create|add|schedule)\s+(?:an?\s+)?(?:event\s+)?(?:called\s+)?(.*?)(?:\s*\b(?:at|on|tomorrow|today)\b.*)?$",
    )
    .expect("valid title pattern")
});

/// Title extraction is independent of time extraction.
pub fn extract_title(text: &str) -> String {
    if let Some(caps) = TITLE_RE.captures(text) {
        let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !title.is_empty() {
            return title.to_string();
        }
    }
    "Untitled Event".to_string()
}

pub fn detect_day_hint(text: &str) -> Option<DayHint> {
    let lower = text.to_lowercase();
    if lower.contains("tomorrow") {
        Some(DayHint::Tomorrow)
    } else if lower.contains("today") {
        Some(DayHint::Today)
    } else {
        None
    }
}

fn base_date(now: DateTime<Tz>, hint: Option<DayHint>) -> NaiveDate {
    match hint {
        Some(DayHint::Tomorrow) => now.date_naive() + Duration::days(1),
        _ => now.date_naive(),
    }
}

fn resolve_local(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let mapped = tz.from_local_datetime(&date.and_time(time));
    mapped.single().or_else(|| mapped.earliest())
}

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*$").expect("valid clock pattern")
});

/// `H[:MM][am|pm]` with the usual 12-hour rules: pm adds 12 below noon,
/// 12am is midnight.
fn parse_clock(expr: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(expr)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    match caps.get(3).map(|m| m.as_str().to_lowercase()) {
        Some(meridiem) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            if meridiem == "pm" && hour < 12 {
                hour += 12;
            }
            if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        None => {
            if hour > 23 {
                return None;
            }
        }
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

static FROM_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bfrom\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*(?:to|-)\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)",
    )
    .expect("valid window pattern")
});

static BARE_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*(?:to|-)\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)",
    )
    .expect("valid window pattern")
});

/// Layer 1: "from T1 to T2", "T1 to T2", "T1-T2". Both endpoints resolve on
/// the hinted day; an end at or before the start wraps to the next day so
/// windows stay strictly ordered.
fn explicit_window(text: &str, now: DateTime<Tz>, hint: Option<DayHint>) -> Option<TimeWindow> {
    let caps = FROM_WINDOW_RE
        .captures(text)
        .or_else(|| BARE_WINDOW_RE.captures(text))?;
    let start_time = parse_clock(caps.get(1)?.as_str())?;
    let end_time = parse_clock(caps.get(2)?.as_str())?;

    let tz = now.timezone();
    let date = base_date(now, hint);
    let start = resolve_local(&tz, date, start_time)?;
    let mut end = resolve_local(&tz, date, end_time)?;
    if end <= start {
        end += Duration::days(1);
    }
    Some(TimeWindow {
        start,
        end: Some(end),
    })
}

static AT_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bat\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)").expect("valid at pattern")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor\s+(\d+)\s*(?:hours?|hrs?)\b").expect("valid duration pattern")
});

/// Layer 2: "at T", optionally "for N hour(s)".
fn start_with_duration(text: &str, now: DateTime<Tz>, hint: Option<DayHint>) -> Option<TimeWindow> {
    let caps = AT_TIME_RE.captures(text)?;
    let start_time = parse_clock(caps.get(1)?.as_str())?;

    let tz = now.timezone();
    let start = resolve_local(&tz, base_date(now, hint), start_time)?;
    let end = DURATION_RE
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse::<i64>().ok())
        .map(|hours| start + Duration::hours(hours));
    Some(TimeWindow { start, end })
}

static RELATIVE_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(next\s+[a-z]+|tomorrow|today)\b").expect("valid phrase pattern")
});

/// Layer 3: hand the relative phrase (or the day hint alone) to the generic
/// date grammar, biased toward the future relative to `now`.
fn natural_phrase(text: &str, now: DateTime<Tz>, hint: Option<DayHint>) -> Option<TimeWindow> {
    let phrase = RELATIVE_PHRASE_RE
        .find(text)
        .map(|m| m.as_str().to_lowercase())
        .or_else(|| {
            hint.map(|h| {
                match h {
                    DayHint::Today => "today",
                    DayHint::Tomorrow => "tomorrow",
                }
                .to_string()
            })
        })?;
    let start = parse_date_string(&phrase, now, Dialect::Us).ok()?;
    Some(TimeWindow { start, end: None })
}

static BARE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?::\d{2})?\s*(?:am|pm))\b|\b(\d{1,2}:\d{2})\b")
        .expect("valid bare time pattern")
});

static NEXT_WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnext\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid weekday pattern")
});

const DEFAULT_START: NaiveTime = match NaiveTime::from_hms_opt(14, 0, 0) {
    Some(t) => t,
    None => panic!("valid default start time"),
};

/// Layer 4: a bare clock time, or a day token alone at the 2:00 PM default.
/// No temporal signal at all means the parse fails upstream.
fn heuristic_fallback(text: &str, now: DateTime<Tz>, hint: Option<DayHint>) -> Option<TimeWindow> {
    let tz = now.timezone();

    if let Some(caps) = BARE_TIME_RE.captures(text) {
        let expr = caps.get(1).or_else(|| caps.get(2))?.as_str();
        if let Some(time) = parse_clock(expr) {
            let start = resolve_local(&tz, base_date(now, hint), time)?;
            return Some(TimeWindow { start, end: None });
        }
    }

    if hint.is_some() {
        let start = resolve_local(&tz, base_date(now, hint), DEFAULT_START)?;
        return Some(TimeWindow { start, end: None });
    }

    if let Some(caps) = NEXT_WEEKDAY_RE.captures(text) {
        let weekday = match caps.get(1)?.as_str().to_lowercase().as_str() {
            "monday" => Weekday::Mon,
            "tuesday" => Weekday::Tue,
            "wednesday" => Weekday::Wed,
            "thursday" => Weekday::Thu,
            "friday" => Weekday::Fri,
            "saturday" => Weekday::Sat,
            _ => Weekday::Sun,
        };
        let today = now.date_naive();
        let mut ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        let start = resolve_local(&tz, today + Duration::days(ahead), DEFAULT_START)?;
        return Some(TimeWindow { start, end: None });
    }

    None
}
