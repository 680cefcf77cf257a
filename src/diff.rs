//! Pixel comparison and side-by-side merge of screenshot pairs.
//!
//! [`DiffEngine::compare_and_merge`] decodes two PNGs, counts differing
//! pixels through an injected [`PixelComparator`], and on any mismatch writes
//! a side-by-side composite into the diff directory. Images with unequal
//! dimensions never reach the comparator: the pixel buffers would not line up,
//! so dimension inequality alone decides the mismatch.
//!
//! Results are reported through [`DiffEngine::write_log`], which appends a
//! timestamped line to a persistent `diff.log` and echoes the message to
//! stdout.

use chrono::{SecondsFormat, Utc};
use image::{imageops, RgbaImage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, warn};

use crate::config::DiffConfig;

/// Name of the persistent log file inside the diff directory.
const LOG_FILE: &str = "diff.log";

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("source path has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Outcome of one image pair comparison.
///
/// `merged_image_path` is present iff the pair mismatched *and* both images
/// were readable. A decode/read failure yields `is_match == false` with no
/// path, which callers can tell apart from a true pixel mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    pub is_match: bool,
    pub merged_image_path: Option<PathBuf>,
}

/// Counts differing pixels between two equal-sized RGBA buffers.
pub trait PixelComparator: Send + Sync {
    fn diff_count(&self, a: &[u8], b: &[u8], width: u32, height: u32, threshold: f64) -> usize;
}

/// Default comparator: per-pixel perceptual distance in YIQ color space,
/// the same metric pixelmatch uses. A pixel counts as different when its
/// squared YIQ distance exceeds `35215 * threshold^2` (35215 is the maximum
/// possible distance).
#[derive(Debug, Default, Clone, Copy)]
pub struct PerceptualComparator;

impl PixelComparator for PerceptualComparator {
    fn diff_count(&self, a: &[u8], b: &[u8], width: u32, height: u32, threshold: f64) -> usize {
        let max_delta = 35215.0 * threshold * threshold;
        let len = (width as usize) * (height as usize) * 4;
        let mut count = 0;
        for i in (0..len).step_by(4) {
            if color_delta(&a[i..i + 4], &b[i..i + 4]) > max_delta {
                count += 1;
            }
        }
        count
    }
}

// Blend a semi-transparent channel value onto a white background.
fn blend(channel: u8, alpha: f64) -> f64 {
    255.0 + (channel as f64 - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

fn color_delta(a: &[u8], b: &[u8]) -> f64 {
    let alpha_a = a[3] as f64 / 255.0;
    let alpha_b = b[3] as f64 / 255.0;
    let (r1, g1, b1) = (blend(a[0], alpha_a), blend(a[1], alpha_a), blend(a[2], alpha_a));
    let (r2, g2, b2) = (blend(b[0], alpha_b), blend(b[1], alpha_b), blend(b[2], alpha_b));

    let dy = rgb2y(r1, g1, b1) - rgb2y(r2, g2, b2);
    let di = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let dq = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);

    0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
}

pub struct DiffEngine {
    diff_dir: PathBuf,
    threshold: f64,
    comparator: Box<dyn PixelComparator>,
}

impl DiffEngine {
    /// Engine writing merged images and `diff.log` under `diff_dir`.
    pub fn new(diff_dir: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            diff_dir: diff_dir.into(),
            threshold,
            comparator: Box::new(PerceptualComparator),
        }
    }

    /// Replace the pixel comparator (used by tests).
    pub fn with_comparator(mut self, comparator: Box<dyn PixelComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn diff_dir(&self) -> &Path {
        &self.diff_dir
    }

    /// Compare two images; on mismatch persist a side-by-side composite.
    ///
    /// Never panics on unreadable input: decode/IO failures are logged and
    /// reported as a mismatch without a merge artifact.
    pub fn compare_and_merge(&self, path_a: &Path, path_b: &Path) -> DiffOutcome {
        match self.try_compare(path_a, path_b) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("画像比較エラー: {e}");
                DiffOutcome {
                    is_match: false,
                    merged_image_path: None,
                }
            }
        }
    }

    fn try_compare(&self, path_a: &Path, path_b: &Path) -> Result<DiffOutcome, DiffError> {
        let img_a = image::open(path_a)?.to_rgba8();
        let img_b = image::open(path_b)?.to_rgba8();
        let (width_a, height_a) = img_a.dimensions();
        let (width_b, height_b) = img_b.dimensions();

        // Equal dimensions: let the comparator decide. Unequal dimensions are
        // a mismatch by definition and must skip the comparator, whose buffer
        // walk assumes matching pixel counts.
        if (width_a, height_a) == (width_b, height_b) {
            let differing = self.comparator.diff_count(
                img_a.as_raw(),
                img_b.as_raw(),
                width_a,
                height_a,
                self.threshold,
            );
            if differing == 0 {
                return Ok(DiffOutcome {
                    is_match: true,
                    merged_image_path: None,
                });
            }
        }

        let merged_path = self.merge(&img_a, &img_b, path_a)?;
        Ok(DiffOutcome {
            is_match: false,
            merged_image_path: Some(merged_path),
        })
    }

    // Composite: A at (0,0), B at (width_a,0); canvas is
    // (width_a + width_b) x max(height_a, height_b). Pixels covered by
    // neither source keep the zeroed buffer default.
    fn merge(&self, img_a: &RgbaImage, img_b: &RgbaImage, path_a: &Path) -> Result<PathBuf, DiffError> {
        let (width_a, height_a) = img_a.dimensions();
        let (width_b, height_b) = img_b.dimensions();

        let mut merged = RgbaImage::new(width_a + width_b, height_a.max(height_b));
        imageops::replace(&mut merged, img_a, 0, 0);
        imageops::replace(&mut merged, img_b, width_a as i64, 0);

        fs::create_dir_all(&self.diff_dir)?;
        let name = path_a
            .file_name()
            .ok_or_else(|| DiffError::NoFileName(path_a.to_path_buf()))?;
        let out = self.diff_dir.join(name);
        merged.save(&out)?;
        Ok(out)
    }

    /// Append `"{ISO timestamp} - {message}\n"` to the persistent log and
    /// echo `message` to stdout.
    pub fn write_log(&self, message: &str) {
        if let Err(e) = self.append_log(message) {
            warn!("could not write diff log: {e}");
        }
        println!("{message}");
    }

    fn append_log(&self, message: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.diff_dir)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.diff_dir.join(LOG_FILE))?;
        writeln!(file, "{timestamp} - {message}")
    }

    /// Config-driven batch mode: compare every `.png` in the source directory
    /// against its same-named counterpart in the target directory. Both
    /// directories resolve under `output/`.
    pub fn run_batch(&self, config: &DiffConfig) -> anyhow::Result<()> {
        self.run_batch_under(Path::new("output"), config)
    }

    fn run_batch_under(&self, root: &Path, config: &DiffConfig) -> anyhow::Result<()> {
        use anyhow::Context;

        let source = root.join(&config.source_directory);
        let target = root.join(&config.target_directory);

        let entries = fs::read_dir(&source)
            .with_context(|| format!("source directory not found: {}", source.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", source.display()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let counterpart = target.join(&name);
            if !counterpart.exists() {
                self.write_log(&format!("{name}: 対応するファイルがありません"));
                continue;
            }

            let outcome = self.compare_and_merge(&path, &counterpart);
            let verdict = if outcome.is_match { "一致" } else { "不一致" };
            self.write_log(&format!("{name}: {verdict}"));
            if let Some(merged) = &outcome.merged_image_path {
                self.write_log(&format!("差分画像: {}", merged.display()));
            }
        }
        Ok(())
    }
}
