use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;
const DEFAULT_CALENDAR_URL: &str = "https://calendar.google.com";
const DEFAULT_PROFILE_DIR: &str = "./.browser_profile";

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    /// Config file value, falling back to the process environment.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
    }
}

/// Bounded timeouts for every browser suspension point. One knob per
/// operation so tests with fakes can shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub launch: Duration,
    pub navigation: Duration,
    pub auth_probe: Duration,
    pub render_delay: Duration,
    pub locator: Duration,
    pub event_wait: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            launch: Duration::from_secs(15),
            navigation: Duration::from_secs(15),
            auth_probe: Duration::from_secs(7),
            render_delay: Duration::from_secs(2),
            locator: Duration::from_secs(3),
            event_wait: Duration::from_secs(5),
        }
    }
}

/// Browser-session settings consumed by the session manager. Locations are
/// enumerated here, never hard-coded at call sites, so deployments can point
/// at different browser installs/profiles.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local default profile directory, used when no override is given.
    pub profile_dir: PathBuf,
    /// Existing browser profile to reuse (`CHROME_USER_DATA_DIR`).
    pub chrome_profile: Option<PathBuf>,
    /// Browser executable (`CHROME_EXECUTABLE`); the driver autodetects an
    /// installed browser when unset.
    pub executable: Option<PathBuf>,
    /// Cookie-seed file injected once at launch (`COOKIES_FILE`).
    pub cookies_file: Option<PathBuf>,
    pub calendar_url: String,
    pub timeouts: Timeouts,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let profile_dir = PathBuf::from(DEFAULT_PROFILE_DIR);
        SessionConfig {
            cookies_file: Some(profile_dir.join("cookies.json")),
            profile_dir,
            chrome_profile: None,
            executable: None,
            calendar_url: DEFAULT_CALENDAR_URL.to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub run_mode: String,
    pub port: u16,
    pub timezone: Tz,
    pub openai_api_key: Option<String>,
    pub session: SessionConfig,
}

impl CalendarConfig {
    pub fn load(config: &AppConfig) -> Self {
        let get_prop = |key: &str| config.get(key);

        let timezone = get_prop("TIMEZONE")
            .and_then(|tz| tz.parse::<Tz>().ok())
            .unwrap_or(DEFAULT_TIMEZONE);

        let profile_dir = PathBuf::from(DEFAULT_PROFILE_DIR);
        let cookies_file = get_prop("COOKIES_FILE")
            .map(PathBuf::from)
            .or_else(|| Some(profile_dir.join("cookies.json")));

        let timeout_secs = |key: &str, default: Duration| {
            get_prop(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            launch: timeout_secs("LAUNCH_TIMEOUT_SECS", defaults.launch),
            navigation: timeout_secs("NAVIGATION_TIMEOUT_SECS", defaults.navigation),
            auth_probe: timeout_secs("AUTH_PROBE_TIMEOUT_SECS", defaults.auth_probe),
            render_delay: defaults.render_delay,
            locator: timeout_secs("LOCATOR_TIMEOUT_SECS", defaults.locator),
            event_wait: timeout_secs("EVENT_WAIT_TIMEOUT_SECS", defaults.event_wait),
        };

        CalendarConfig {
            run_mode: get_prop("RUN_MODE").unwrap_or_else(|| "api".to_string()),
            port: get_prop("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            timezone,
            openai_api_key: get_prop("OPENAI_API_KEY"),
            session: SessionConfig {
                profile_dir,
                chrome_profile: get_prop("CHROME_USER_DATA_DIR").map(PathBuf::from),
                executable: get_prop("CHROME_EXECUTABLE").map(PathBuf::from),
                cookies_file,
                calendar_url: get_prop("CALENDAR_URL")
                    .unwrap_or_else(|| DEFAULT_CALENDAR_URL.to_string()),
                timeouts,
            },
        }
    }
}
