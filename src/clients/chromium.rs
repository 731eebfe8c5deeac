use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::clients::browser::{
    BrowserContext, BrowserDriver, CookieRecord, DriverError, LaunchSpec, PageHandle,
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Production driver speaking CDP to a locally installed Chromium/Chrome.
#[derive(Debug, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        ChromiumDriver
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch_persistent(
        &self,
        spec: &LaunchSpec,
    ) -> Result<Arc<dyn BrowserContext>, DriverError> {
        if let Some(executable) = &spec.executable {
            if !executable.exists() {
                return Err(DriverError::Launch(format!(
                    "CHROME_EXECUTABLE not found at: {}. Set CHROME_EXECUTABLE to your installed browser binary.",
                    executable.display()
                )));
            }
        }

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&spec.user_data_dir)
            .args(spec.args.clone());
        if !spec.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &spec.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        debug!(user_data_dir = %spec.user_data_dir.display(), "persistent context launched");

        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(ChromiumContext {
            browser: Mutex::new(browser),
            event_loop,
        }))
    }
}

struct ChromiumContext {
    browser: Mutex<Browser>,
    event_loop: JoinHandle<()>,
}

impl ChromiumContext {
    /// A page to run context-level CDP commands against: the first open tab,
    /// or a fresh blank one.
    async fn any_page(&self) -> Result<chromiumoxide::Page, DriverError> {
        let browser = self.browser.lock().await;
        let pages = browser
            .pages()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        if let Some(page) = pages.into_iter().next() {
            return Ok(page);
        }
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<usize, DriverError> {
        let params: Vec<CookieParam> = cookies.iter().filter_map(to_cookie_param).collect();
        let count = params.len();
        if count == 0 {
            return Ok(0);
        }
        let page = self.any_page().await?;
        page.set_cookies(params)
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(count)
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, DriverError> {
        let browser = self.browser.lock().await;
        let pages = browser
            .pages()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(pages
            .into_iter()
            .map(|page| Arc::new(ChromiumPage { page }) as Arc<dyn PageHandle>)
            .collect())
    }

    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(Arc::new(ChromiumPage { page }))
    }

    async fn export_storage_state(&self, path: &Path) -> Result<(), DriverError> {
        let page = self.any_page().await?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        let state = json!({ "cookies": cookies });
        let body = serde_json::to_string_pretty(&state)
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        std::fs::write(path, body)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Protocol(e.to_string()));
        let _ = browser.wait().await;
        self.event_loop.abort();
        closed
    }
}

struct ChromiumPage {
    page: chromiumoxide::Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Navigation(e.to_string()))
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        bound: Duration,
    ) -> Result<(), DriverError> {
        timeout(bound, async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| DriverError::Timeout(bound))
    }

    async fn click_button_labeled(
        &self,
        label: &str,
        bound: Duration,
    ) -> Result<(), DriverError> {
        let script = click_label_script(label);
        let clicked = timeout(bound, async {
            loop {
                match self.page.evaluate(script.clone()).await {
                    Ok(value) => {
                        if value.into_value::<bool>().unwrap_or(false) {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(DriverError::Evaluation(e.to_string())),
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        match clicked {
            Ok(inner) => inner,
            Err(_) => Err(DriverError::NotFound(label.to_string())),
        }
    }

    async fn eval_json(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn is_usable(&self) -> bool {
        self.page.url().await.is_ok()
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }
}

/// Click a button by visible label or aria-label. Returns true when a click
/// happened so callers can poll until the control renders.
fn click_label_script(label: &str) -> String {
    let quoted = serde_json::Value::String(label.to_string()).to_string();
    format!(
        "(() => {{\n\
           const name = {quoted};\n\
           const nodes = Array.from(document.querySelectorAll('button, [role=\"button\"]'));\n\
           const target = nodes.find(el => {{\n\
             const text = (el.innerText || '').trim();\n\
             const aria = el.getAttribute('aria-label') || '';\n\
             return text === name || text.startsWith(name) || aria === name || aria.startsWith(name);\n\
           }});\n\
           if (!target) return false;\n\
           target.click();\n\
           return true;\n\
         }})()"
    )
}

fn to_cookie_param(record: &CookieRecord) -> Option<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(record.name.as_str())
        .value(record.value.as_str());
    if let Some(url) = &record.url {
        builder = builder.url(url.as_str());
    }
    if let Some(domain) = &record.domain {
        builder = builder.domain(domain.as_str());
    }
    if let Some(path) = &record.path {
        builder = builder.path(path.as_str());
    }
    if let Some(secure) = record.secure {
        builder = builder.secure(secure);
    }
    if let Some(http_only) = record.http_only {
        builder = builder.http_only(http_only);
    }
    if let Some(expires) = record.expires {
        if expires > 0.0 {
            builder = builder.expires(TimeSinceEpoch::new(expires));
        }
    }
    if let Some(same_site) = &record.same_site {
        let mapped = match same_site.to_lowercase().as_str() {
            "lax" => Some(CookieSameSite::Lax),
            "strict" => Some(CookieSameSite::Strict),
            "none" => Some(CookieSameSite::None),
            _ => None,
        };
        if let Some(mapped) = mapped {
            builder = builder.same_site(mapped);
        }
    }
    builder.build().ok()
}
