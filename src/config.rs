//! YAML configuration for the batch screenshot and diff modes.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// One batch capture: navigate to `url`, save `{filename}.png`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotTask {
    pub url: String,
    pub filename: String,
}

/// `screenshot.yml`: worklist plus output directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotConfig {
    pub urls: Vec<ScreenshotTask>,
    pub output_directory: String,
}

/// `diff.yml`: paired source/target directories and an optional threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    pub source_directory: String,
    pub target_directory: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

pub fn load_screenshot_config(path: &Path) -> Result<ScreenshotConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("config file not found: {}", path.display()))?;
    let config: ScreenshotConfig =
        serde_yaml::from_str(&content).with_context(|| format!("invalid config: {}", path.display()))?;
    if config.output_directory.is_empty() {
        bail!("invalid config: output_directory is required");
    }
    Ok(config)
}

pub fn load_diff_config(path: &Path) -> Result<DiffConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("config file not found: {}", path.display()))?;
    let config: DiffConfig =
        serde_yaml::from_str(&content).with_context(|| format!("invalid config: {}", path.display()))?;
    if config.source_directory.is_empty() || config.target_directory.is_empty() {
        bail!("invalid config: source_directory and target_directory are required");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn screenshot_config_parses() {
        let file = write_config(
            "output_directory: output/screenshot\nurls:\n  - url: https://example.com\n    filename: top\n",
        );
        let config = load_screenshot_config(file.path()).unwrap();
        assert_eq!(config.output_directory, "output/screenshot");
        assert_eq!(config.urls.len(), 1);
        assert_eq!(config.urls[0].filename, "top");
    }

    #[test]
    fn screenshot_config_requires_urls() {
        let file = write_config("output_directory: out\n");
        assert!(load_screenshot_config(file.path()).is_err());
    }

    #[test]
    fn diff_config_parses_with_threshold() {
        let file = write_config("source_directory: a\ntarget_directory: b\nthreshold: 0.05\n");
        let config = load_diff_config(file.path()).unwrap();
        assert_eq!(config.source_directory, "a");
        assert_eq!(config.threshold, Some(0.05));
    }

    #[test]
    fn diff_config_requires_both_directories() {
        let file = write_config("source_directory: a\n");
        assert!(load_diff_config(file.path()).is_err());

        let file = write_config("source_directory: a\ntarget_directory: \"\"\n");
        assert!(load_diff_config(file.path()).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_diff_config(Path::new("/nonexistent/diff.yml")).is_err());
    }
}
