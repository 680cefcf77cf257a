//! satsuei - scenario-driven browser screenshot capture and visual diff.
//!
//! The crate drives a Chromium browser through scripted multi-step scenarios
//! (with per-run CSV parameter substitution), captures a screenshot after each
//! step, and compares two screenshot sets pixel-by-pixel, producing a merged
//! side-by-side image for every mismatch.
//!
//! The binary exposes four modes: `scenario` (parameterized browser runs),
//! `screenshot` (bounded-concurrency batch capture), `diff` (config-driven
//! directory comparison) and `scenario-diff` (recursive tree comparison).

pub mod browser;
pub mod config;
pub mod diff;
pub mod logging;
pub mod params;
pub mod scenario;
pub mod scenario_diff;
pub mod screenshot;

pub use diff::{DiffEngine, DiffOutcome};
pub use scenario_diff::diff_scenario;
