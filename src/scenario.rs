//! Scenario execution: the per-action state machine and the row-sequential
//! runner.
//!
//! A scenario is an ordered list of actions (`goto`, `click`, `type`,
//! `wait`), executed once per CSV parameter row against a fresh browser
//! session. Rows run strictly sequentially: each row owns an exclusive
//! browser/page session and later actions depend on DOM state produced by
//! earlier ones. The first failing action aborts the rest of its row only;
//! the browser is released on every exit path.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::browser::{BrowserDriver, BrowserProvider, DriverError, PageDriver};
use crate::params::{parse_csv, substitute, ParamRow};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: Option<String>,
    #[serde(rename = "defaultTimeout")]
    pub default_timeout: Option<u64>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Raw scenario step as loaded from YAML. The `action` kind is kept as a
/// string and only classified at execution time, so an unrecognized kind
/// aborts the row it belongs to instead of failing the whole file load.
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub action: String,
    pub url: Option<String>,
    pub selector: Option<String>,
    pub text: Option<String>,
    /// Pause in milliseconds, used by `wait` and optionally after `click`.
    /// Kept loosely typed so a non-numeric value is a row-local
    /// classification failure, not a fatal file-load error.
    pub wait: Option<serde_yaml::Value>,
    pub timeout: Option<u64>,
    /// Screenshot file name. `false` suppresses capture; `true` or absent
    /// captures under the derived default name.
    #[serde(default)]
    pub screenshot: Option<ScreenshotSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScreenshotSpec {
    Enabled(bool),
    Named(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid action: {0}")]
    Invalid(&'static str),
    #[error("unknown action: {0}")]
    Unknown(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Classified action, one variant per kind.
enum ActionKind<'a> {
    Goto { url: &'a str },
    Click { selector: &'a str, wait: Option<u64> },
    Type { selector: &'a str, text: &'a str },
    Wait { ms: u64 },
}

impl Action {
    /// `wait` as milliseconds, or `None` when absent or not a number.
    fn wait_ms(&self) -> Option<u64> {
        self.wait.as_ref().and_then(|v| v.as_u64())
    }

    fn classify(&self) -> Result<ActionKind<'_>, ActionError> {
        match self.action.as_str() {
            "goto" => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or(ActionError::Invalid("goto requires url"))?;
                Ok(ActionKind::Goto { url })
            }
            "click" => {
                let selector = self
                    .selector
                    .as_deref()
                    .ok_or(ActionError::Invalid("click requires selector"))?;
                // A non-numeric wait just skips the post-click pause.
                Ok(ActionKind::Click {
                    selector,
                    wait: self.wait_ms(),
                })
            }
            "type" => {
                let selector = self
                    .selector
                    .as_deref()
                    .ok_or(ActionError::Invalid("type requires selector and text"))?;
                let text = self
                    .text
                    .as_deref()
                    .ok_or(ActionError::Invalid("type requires selector and text"))?;
                Ok(ActionKind::Type { selector, text })
            }
            "wait" => {
                let ms = self
                    .wait_ms()
                    .ok_or(ActionError::Invalid("wait requires time"))?;
                Ok(ActionKind::Wait { ms })
            }
            other => Err(ActionError::Unknown(other.to_string())),
        }
    }

    /// Screenshot name to use, or `None` when capture is suppressed.
    fn screenshot_name(&self, row_index: usize, action_index: usize) -> Option<String> {
        match &self.screenshot {
            Some(ScreenshotSpec::Enabled(false)) => None,
            Some(ScreenshotSpec::Named(name)) if !name.is_empty() => Some(name.clone()),
            _ => Some(format!("{}-{}", row_index + 1, action_index + 1)),
        }
    }
}

/// Execute one action against the page, then capture a screenshot unless
/// suppressed. Row and action indices are zero-based here; log lines and
/// derived screenshot names are 1-based.
pub async fn run_action(
    page: &dyn PageDriver,
    action: &Action,
    params: &ParamRow,
    default_timeout: u64,
    output_dir: &Path,
    row_index: usize,
    action_index: usize,
) -> Result<(), ActionError> {
    let timeout = Duration::from_millis(action.timeout.unwrap_or(default_timeout));
    let label = format!("{}-{}", row_index + 1, action_index + 1);
    info!("[{label}] {} 開始", action.action);

    match action.classify()? {
        ActionKind::Goto { url } => {
            page.goto(&substitute(url, params), timeout).await?;
        }
        ActionKind::Click { selector, wait } => {
            // The click may or may not trigger a navigation; wait for one
            // concurrently and ignore the result if none arrives in time.
            let navigation = page.wait_for_navigation(timeout);
            let click = page.click(selector);
            let (_, clicked) = tokio::join!(navigation, click);
            clicked?;
            if let Some(ms) = wait {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        ActionKind::Type { selector, text } => {
            page.type_text(selector, &substitute(text, params)).await?;
        }
        ActionKind::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    match action.screenshot_name(row_index, action_index) {
        Some(name) => {
            let file = output_dir.join(format!("{name}.png"));
            page.screenshot(&file).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o666));
            }
            info!("[{label}] スクリーンショット保存: {}", file.display());
        }
        None => info!("[{label}] 完了"),
    }
    Ok(())
}

async fn run_row(
    browser: &mut dyn BrowserDriver,
    scenario: &Scenario,
    params: &ParamRow,
    default_timeout: u64,
    output_dir: &Path,
    row_index: usize,
) -> Result<(), ActionError> {
    let page = browser.new_page().await?;
    for (action_index, action) in scenario.actions.iter().enumerate() {
        run_action(
            page.as_ref(),
            action,
            params,
            default_timeout,
            output_dir,
            row_index,
            action_index,
        )
        .await?;
    }
    Ok(())
}

/// Run the scenario once per parameter row, sequentially.
///
/// Each row acquires a fresh browser session which is closed on every exit
/// path. A failing action aborts the remaining actions of its row; later
/// rows still run.
pub async fn run_rows(
    scenario: &Scenario,
    records: &[ParamRow],
    output_dir: &Path,
    headless: bool,
    provider: &dyn BrowserProvider,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let default_timeout = scenario.default_timeout.unwrap_or(DEFAULT_TIMEOUT_MS);

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("could not create output directory: {}", output_dir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(output_dir, std::fs::Permissions::from_mode(0o777));
    }
    info!("Output directory: {}", output_dir.display());

    for (row_index, params) in records.iter().enumerate() {
        info!("---- {} 行目開始 ----", row_index + 1);

        let mut browser = provider.acquire(headless).await.context("browser acquisition failed")?;
        let result = run_row(
            browser.as_mut(),
            scenario,
            params,
            default_timeout,
            output_dir,
            row_index,
        )
        .await;
        if let Err(e) = result {
            error!("Scenario aborted due to error: {e}");
        }
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {e}");
        }
        info!("---- {} 行目終了 ----", row_index + 1);
    }
    Ok(())
}

/// Load scenario and parameter files, then run every row.
pub async fn run_scenario(
    scenario_path: &Path,
    params_path: &Path,
    output_dir: &Path,
    headless: bool,
    provider: &dyn BrowserProvider,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let scenario_text = std::fs::read_to_string(scenario_path)
        .with_context(|| format!("scenario file not found: {}", scenario_path.display()))?;
    let scenario: Scenario = serde_yaml::from_str(&scenario_text)
        .with_context(|| format!("invalid scenario: {}", scenario_path.display()))?;

    let params_text = std::fs::read_to_string(params_path)
        .with_context(|| format!("params file not found: {}", params_path.display()))?;
    let records = parse_csv(&params_text);

    if let Some(name) = &scenario.name {
        info!("シナリオ: {name}");
    }
    run_rows(&scenario, &records, output_dir, headless, provider).await
}
