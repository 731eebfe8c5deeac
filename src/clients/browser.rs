use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boundary error of the browser driver. Callers map these into session or
/// command outcomes; nothing below this seam crosses the public surface.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("element '{0}' not found")]
    NotFound(String),
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything the session manager decides about a launch, resolved before
/// the driver is involved.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub user_data_dir: PathBuf,
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub args: Vec<String>,
}

/// Typed cookie record decoded from the external seed file. Field names
/// follow the exported-cookie JSON convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default, rename = "httpOnly", alias = "http_only")]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default, rename = "sameSite", alias = "same_site")]
    pub same_site: Option<String>,
}

/// Seed files are either a bare array or an object with a `cookies` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookieSeed {
    Bare(Vec<CookieRecord>),
    Wrapped { cookies: Vec<CookieRecord> },
}

/// Decode a cookie-seed file into typed records at the boundary; unvalidated
/// JSON never reaches the driver.
pub fn load_cookie_seed(path: &Path) -> Result<Vec<CookieRecord>, DriverError> {
    let content = fs::read_to_string(path)?;
    let seed: CookieSeed = serde_json::from_str(&content)
        .map_err(|e| DriverError::Protocol(format!("invalid cookie file: {}", e)))?;
    Ok(match seed {
        CookieSeed::Bare(cookies) => cookies,
        CookieSeed::Wrapped { cookies } => cookies,
    })
}

/// Launches persistent browser contexts bound to an on-disk profile.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch_persistent(
        &self,
        spec: &LaunchSpec,
    ) -> Result<Arc<dyn BrowserContext>, DriverError>;
}

/// A live browser bound to a profile directory. Cookies and local storage
/// survive process restarts through that directory.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Inject seed cookies before navigation. Returns how many were applied.
    async fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<usize, DriverError>;
    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, DriverError>;
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError>;
    /// Persist session state (cookies) for reuse by future launches.
    async fn export_storage_state(&self, path: &Path) -> Result<(), DriverError>;
    async fn close(&self) -> Result<(), DriverError>;
}

/// One page of the session. Only one in-flight operation at a time; callers
/// serialize access.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), DriverError>;
    /// Poll for a CSS selector within the given bound.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
    -> Result<(), DriverError>;
    /// Find and click a button by its visible label or aria-label.
    async fn click_button_labeled(&self, label: &str, timeout: Duration)
    -> Result<(), DriverError>;
    /// Run a script in the page and return its JSON result.
    async fn eval_json(&self, script: &str) -> Result<serde_json::Value, DriverError>;
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
    /// Whether the handle still responds; a dead page forces re-init.
    async fn is_usable(&self) -> bool;
    async fn close(&self) -> Result<(), DriverError>;
}
