//! Browser automation driver using chromiumoxide (CDP).
//!
//! The scenario engine only ever talks to the [`PageDriver`] /
//! [`BrowserDriver`] / [`BrowserProvider`] capability traits, so tests can
//! substitute doubles without touching a real browser. The chromiumoxide
//! implementation either connects to an already-running browser (when
//! `SATSUEI_WS_ENDPOINT` or `WS_ENDPOINT` is set) or launches a fresh
//! sandboxless instance.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation timed out after {0} ms")]
    NavigationTimeout(u64),
    #[error("browser error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("failed to build browser config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One open page. All scenario actions run against this handle.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the page to settle, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Type `text` into the first element matching `selector`.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Wait for a navigation to settle. Callers that treat the wait as
    /// best-effort ignore the result.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Capture a full-page PNG screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;
}

/// One browser session, owning its pages.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn new_page(&mut self) -> Result<Box<dyn PageDriver>, DriverError>;
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Session acquisition strategy. The scenario runner acquires one fresh
/// session per parameter row through this.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    async fn acquire(&self, headless: bool) -> Result<Box<dyn BrowserDriver>, DriverError>;
}

/// WebSocket endpoint of an already-running browser, if configured.
pub fn ws_endpoint() -> Option<String> {
    std::env::var("SATSUEI_WS_ENDPOINT")
        .or_else(|_| std::env::var("WS_ENDPOINT"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Default provider: connect to `ws_endpoint()` when set, otherwise launch a
/// new isolated browser with sandboxing disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumProvider;

#[async_trait]
impl BrowserProvider for ChromiumProvider {
    async fn acquire(&self, headless: bool) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let (browser, mut handler) = match ws_endpoint() {
            Some(ws) => {
                debug!(endpoint = %ws, "connecting to running browser");
                Browser::connect(ws).await?
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .arg("--no-sandbox")
                    .arg("--disable-setuid-sandbox");
                if !headless {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(DriverError::Config)?;
                Browser::launch(config).await?
            }
        };

        // The handler stream must be drained for the browser to function.
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Box::new(ChromiumBrowser {
            browser,
            handler_task,
        }))
    }
}

struct ChromiumBrowser {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    async fn new_page(&mut self) -> Result<Box<dyn PageDriver>, DriverError> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let result = self.browser.close().await;
        self.handler_task.abort();
        result?;
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let navigate = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigate).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(DriverError::NavigationTimeout(timeout.as_millis() as u64)),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), DriverError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(DriverError::NavigationTimeout(timeout.as_millis() as u64)),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let params = chromiumoxide::page::ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let bytes = self.page.screenshot(params).await?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
