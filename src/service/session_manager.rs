use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::clients::browser::{
    BrowserContext, BrowserDriver, LaunchSpec, PageHandle, load_cookie_seed,
};
use crate::config::SessionConfig;

/// Marker that only renders once the calendar shell is signed in.
pub const MAIN_CONTENT_SELECTOR: &str = r#"[role="main"]"#;

const LAUNCH_ARGS: [&str; 4] = [
    "--disable-blink-features=AutomationControlled",
    "--start-maximized",
    "--disable-features=IsolateOrigins",
    "--disable-site-isolation-trials",
];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Browser launch timeout")]
    LaunchTimeout,
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),
    #[error("Calendar not authenticated or initialized.")]
    NotAuthenticated,
}

/// Lifecycle: `Uninitialized → Initializing → Ready{Authenticated,
/// Unauthenticated} → Closed`. `ReadyUnauthenticated` is a legitimate
/// terminal outcome (a human has to log in), not an error. A `Closed`
/// session can be re-initialized from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    ReadyAuthenticated,
    ReadyUnauthenticated,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub authenticated: bool,
}

struct SessionSlot {
    state: SessionState,
    context: Option<Arc<dyn BrowserContext>>,
    page: Option<Arc<dyn PageHandle>>,
}

/// Owns the single browser session of the process. The slot mutex makes
/// `ensure_ready` a cheap, idempotent query and guarantees at most one
/// initialization in flight; UI automation against the external site is
/// flaky enough that "ready or clearly not ready" has to be retryable.
pub struct SessionManager {
    driver: Arc<dyn BrowserDriver>,
    config: SessionConfig,
    slot: Mutex<SessionSlot>,
}

impl SessionManager {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: SessionConfig) -> Self {
        SessionManager {
            driver,
            config,
            slot: Mutex::new(SessionSlot {
                state: SessionState::Uninitialized,
                context: None,
                page: None,
            }),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.slot.lock().await.state
    }

    /// Idempotent: a live usable page short-circuits with zero launches.
    /// Otherwise launch a persistent context on the resolved profile,
    /// seed cookies, navigate, and probe for authentication. Any launch
    /// failure takes one corrupted-profile retry against a wiped directory
    /// before becoming fatal.
    pub async fn ensure_ready(
        &self,
        headless: bool,
        profile_override: Option<PathBuf>,
    ) -> Result<SessionStatus, SessionError> {
        let mut slot = self.slot.lock().await;

        if let Some(page) = &slot.page {
            if page.is_usable().await {
                match slot.state {
                    SessionState::ReadyAuthenticated => {
                        return Ok(SessionStatus {
                            authenticated: true,
                        });
                    }
                    SessionState::ReadyUnauthenticated => {
                        return Ok(SessionStatus {
                            authenticated: false,
                        });
                    }
                    _ => {}
                }
            }
        }

        slot.state = SessionState::Initializing;
        info!(headless, "initializing calendar session");

        // Dispose stale handles from a previous life before relaunching.
        if let Some(page) = slot.page.take() {
            let _ = page.close().await;
        }
        if let Some(context) = slot.context.take() {
            let _ = context.close().await;
        }

        let profile_dir = profile_override
            .or_else(|| self.config.chrome_profile.clone())
            .unwrap_or_else(|| self.config.profile_dir.clone());
        if let Err(err) = std::fs::create_dir_all(&profile_dir) {
            slot.state = SessionState::Uninitialized;
            return Err(SessionError::LaunchFailed(err.to_string()));
        }
        info!(profile_dir = %profile_dir.display(), "resolved profile directory");

        let spec = LaunchSpec {
            user_data_dir: profile_dir.clone(),
            executable: self.config.executable.clone(),
            headless,
            args: LAUNCH_ARGS.iter().map(|s| s.to_string()).collect(),
        };

        let context = match self.launch_once(&spec).await {
            Ok(context) => context,
            Err(first) => {
                // Assume the profile is corrupted: wipe it, recreate it
                // empty, and retry the whole launch exactly once. Cookie
                // seeding is still honored on the retry.
                warn!(error = %first, "launch failed; retrying with a fresh profile");
                let _ = std::fs::remove_dir_all(&profile_dir);
                if let Err(err) = std::fs::create_dir_all(&profile_dir) {
                    slot.state = SessionState::Uninitialized;
                    return Err(SessionError::LaunchFailed(err.to_string()));
                }
                match self.launch_once(&spec).await {
                    Ok(context) => context,
                    Err(second) => {
                        slot.state = SessionState::Uninitialized;
                        return Err(second);
                    }
                }
            }
        };

        // Reuse an already-open page when the context restored one.
        let existing = context
            .pages()
            .await
            .ok()
            .and_then(|pages| pages.into_iter().next());
        let page = match existing {
            Some(page) => page,
            None => match context.new_page().await {
                Ok(page) => page,
                Err(err) => {
                    slot.state = SessionState::Uninitialized;
                    return Err(SessionError::LaunchFailed(err.to_string()));
                }
            },
        };

        // Navigation is bounded but non-fatal: a slow load may still leave a
        // usable page behind.
        match timeout(
            self.config.timeouts.navigation,
            page.goto(&self.config.calendar_url),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "navigation failed"),
            Err(_) => warn!(timeout = ?self.config.timeouts.navigation, "navigation timeout"),
        }

        sleep(self.config.timeouts.render_delay).await;

        let authenticated = match page
            .wait_for_selector(MAIN_CONTENT_SELECTOR, self.config.timeouts.auth_probe)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                info!(error = %err, "main content not found; external login required");
                false
            }
        };

        if authenticated {
            let state_path = profile_dir.join("storage_state.json");
            if let Err(err) = context.export_storage_state(&state_path).await {
                warn!(error = %err, "failed to persist storage state");
            }
        }

        slot.context = Some(context);
        slot.page = Some(page);
        slot.state = if authenticated {
            SessionState::ReadyAuthenticated
        } else {
            SessionState::ReadyUnauthenticated
        };
        info!(authenticated, "calendar session ready");
        Ok(SessionStatus { authenticated })
    }

    async fn launch_once(&self, spec: &LaunchSpec) -> Result<Arc<dyn BrowserContext>, SessionError> {
        let context = match timeout(
            self.config.timeouts.launch,
            self.driver.launch_persistent(spec),
        )
        .await
        {
            Ok(Ok(context)) => context,
            Ok(Err(err)) => return Err(SessionError::LaunchFailed(err.to_string())),
            Err(_) => {
                warn!(timeout = ?self.config.timeouts.launch, "browser launch timed out");
                return Err(SessionError::LaunchTimeout);
            }
        };

        if let Some(cookies_path) = &self.config.cookies_file {
            if cookies_path.exists() {
                // Cookie seeding is best-effort; a bad file never blocks init.
                match load_cookie_seed(cookies_path) {
                    Ok(cookies) => match context.inject_cookies(&cookies).await {
                        Ok(count) => info!(count, "loaded cookies"),
                        Err(err) => warn!(error = %err, "cookie injection failed"),
                    },
                    Err(err) => warn!(error = %err, "cookie loading failed"),
                }
            }
        }

        Ok(context)
    }

    /// Best-effort teardown: each step is guarded so later steps still run.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(page) = slot.page.take() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "page close failed");
            }
        }
        if let Some(context) = slot.context.take() {
            if let Err(err) = context.close().await {
                warn!(error = %err, "context close failed");
            }
        }
        slot.state = SessionState::Closed;
        info!("calendar session closed");
    }

    /// Best-effort capture for diagnosing an unauthenticated session.
    pub async fn screenshot(&self) -> Option<Vec<u8>> {
        let slot = self.slot.lock().await;
        let page = slot.page.as_ref()?;
        page.screenshot().await.ok()
    }

    /// The page handle, only while `ReadyAuthenticated`.
    pub async fn authenticated_page(&self) -> Result<Arc<dyn PageHandle>, SessionError> {
        let slot = self.slot.lock().await;
        match (slot.state, &slot.page) {
            (SessionState::ReadyAuthenticated, Some(page)) => Ok(page.clone()),
            _ => Err(SessionError::NotAuthenticated),
        }
    }
}
