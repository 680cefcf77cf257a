//! Bounded-concurrency batch screenshot capture.
//!
//! The worklist is split into contiguous chunks of at most `concurrency`
//! tasks. All tasks of a chunk are dispatched together and the whole chunk is
//! awaited before the next one starts, so at most `concurrency` captures are
//! ever in flight and chunks are separated by a full barrier. A failing task
//! is logged and never cancels its siblings or later chunks.

use futures_util::future::join_all;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::browser::{BrowserProvider, ChromiumProvider, DriverError};
use crate::config::{ScreenshotConfig, ScreenshotTask};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Capture every task through `shot`, at most `concurrency` at a time.
/// `concurrency` below 1 is coerced to 1. Task order within a chunk is not
/// meaningful; output files are disjoint because filenames are.
pub async fn capture_batch<F, Fut>(
    tasks: &[ScreenshotTask],
    output_dir: &Path,
    concurrency: usize,
    shot: F,
) where
    F: Fn(String, PathBuf) -> Fut,
    Fut: Future<Output = Result<(), DriverError>>,
{
    let concurrency = concurrency.max(1);
    for chunk in tasks.chunks(concurrency) {
        let captures = chunk.iter().map(|task| {
            let url = task.url.clone();
            let output = output_dir.join(format!("{}.png", task.filename));
            let fut = shot(url.clone(), output);
            async move {
                match fut.await {
                    Ok(()) => info!("Captured screenshot for: {url}"),
                    Err(e) => error!("Failed to capture {url}: {e}"),
                }
            }
        });
        join_all(captures).await;
    }
}

/// Default capture function: a throwaway headless browser per task.
pub async fn take_screenshot(url: String, output: PathBuf) -> Result<(), DriverError> {
    let mut browser = ChromiumProvider.acquire(true).await?;
    let result = async {
        let page = browser.new_page().await?;
        page.goto(&url, NAVIGATION_TIMEOUT).await?;
        page.screenshot(&output).await
    }
    .await;
    if let Err(e) = browser.close().await {
        tracing::warn!("browser close failed: {e}");
    }
    result
}

/// Batch screenshot mode: create the output directory and run the worklist.
pub async fn run_batch_screenshots(config: &ScreenshotConfig, concurrency: usize) -> anyhow::Result<()> {
    use anyhow::Context;

    let output_dir = Path::new(&config.output_directory);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("could not create output directory: {}", output_dir.display()))?;
    capture_batch(&config.urls, output_dir, concurrency, take_screenshot).await;
    Ok(())
}
