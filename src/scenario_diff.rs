//! Recursive comparison of two scenario screenshot trees.
//!
//! Walks every `.png` under the old root and compares it against the file at
//! the same relative path under the new root. Every file is processed even
//! after a mismatch; the aggregate is only `true` when every pair matched and
//! no counterpart was missing.

use std::path::Path;
use tracing::error;
use walkdir::WalkDir;

use crate::diff::DiffEngine;

pub fn diff_scenario(engine: &DiffEngine, old_root: &Path, new_root: &Path) -> bool {
    if !old_root.is_dir() {
        engine.write_log(&format!(
            "比較元ディレクトリがありません: {}",
            old_root.display()
        ));
        return false;
    }

    let mut all_match = true;
    for entry in WalkDir::new(old_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("ディレクトリ走査エラー: {e}");
                all_match = false;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }

        let rel = path.strip_prefix(old_root).unwrap_or(path);
        let counterpart = new_root.join(rel);
        if !counterpart.exists() {
            engine.write_log(&format!("{}: 対応するファイルがありません", rel.display()));
            all_match = false;
            continue;
        }

        let outcome = engine.compare_and_merge(path, &counterpart);
        let verdict = if outcome.is_match { "一致" } else { "不一致" };
        engine.write_log(&format!("{}: {verdict}", rel.display()));
        if !outcome.is_match {
            all_match = false;
        }
    }
    all_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn pixel(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba([value, value, value, 255]))
    }

    fn write_tree(root: &Path, files: &[(&str, &RgbaImage)]) {
        for (rel, img) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            img.save(&path).unwrap();
        }
    }

    fn setup(tmp: &TempDir) -> (DiffEngine, PathBuf, PathBuf) {
        let engine = DiffEngine::new(tmp.path().join("diff"), 0.1);
        (engine, tmp.path().join("old"), tmp.path().join("new"))
    }

    #[test]
    fn identical_trees_match() {
        let tmp = TempDir::new().unwrap();
        let (engine, old, new) = setup(&tmp);
        let img = pixel(128);
        write_tree(&old, &[("a.png", &img), ("sub/dir/b.png", &img)]);
        write_tree(&new, &[("a.png", &img), ("sub/dir/b.png", &img)]);

        assert!(diff_scenario(&engine, &old, &new));
    }

    #[test]
    fn differing_pixel_forces_false_but_processes_all() {
        let tmp = TempDir::new().unwrap();
        let (engine, old, new) = setup(&tmp);
        let same = pixel(0);
        let other = pixel(255);
        write_tree(&old, &[("a.png", &other), ("b.png", &same)]);
        write_tree(&new, &[("a.png", &same), ("b.png", &same)]);

        assert!(!diff_scenario(&engine, &old, &new));

        // No short-circuit: the matching file was still compared and logged.
        let log = fs::read_to_string(engine.diff_dir().join("diff.log")).unwrap();
        assert!(log.contains("a.png: 不一致"));
        assert!(log.contains("b.png: 一致"));
    }

    #[test]
    fn missing_counterpart_is_logged_mismatch() {
        let tmp = TempDir::new().unwrap();
        let (engine, old, new) = setup(&tmp);
        let img = pixel(10);
        write_tree(&old, &[("only-old.png", &img)]);
        fs::create_dir_all(&new).unwrap();

        assert!(!diff_scenario(&engine, &old, &new));
        let log = fs::read_to_string(engine.diff_dir().join("diff.log")).unwrap();
        assert!(log.contains("only-old.png: 対応するファイルがありません"));
    }

    #[test]
    fn missing_old_root_returns_false_without_panicking() {
        let tmp = TempDir::new().unwrap();
        let (engine, old, new) = setup(&tmp);
        assert!(!diff_scenario(&engine, &old, &new));
    }

    #[test]
    fn non_png_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let (engine, old, new) = setup(&tmp);
        let img = pixel(10);
        write_tree(&old, &[("a.png", &img)]);
        fs::write(old.join("notes.txt"), "ignored").unwrap();
        write_tree(&new, &[("a.png", &img)]);

        assert!(diff_scenario(&engine, &old, &new));
    }
}
