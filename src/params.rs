//! CSV parameter rows and `${key}` template substitution.
//!
//! One CSV data row drives one complete scenario run. The parser is
//! deliberately minimal: fields are split on `,` with no quoting or escaping,
//! so values containing literal commas will misalign columns. This matches the
//! documented input format and is not worked around here.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One parameter set: CSV header name -> cell value.
pub type ParamRow = HashMap<String, String>;

/// Parse CSV text into parameter rows.
///
/// The first line is the header and defines the key set. Empty lines are
/// skipped. A data row shorter than the header yields empty strings for the
/// missing trailing keys.
pub fn parse_csv(data: &str) -> Vec<ParamRow> {
    let mut lines = data.trim().lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = header.split(',').collect();

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let cols: Vec<&str> = line.split(',').collect();
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let value = cols.get(i).copied().unwrap_or("");
                    (h.to_string(), value.to_string())
                })
                .collect()
        })
        .collect()
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{(.*?)\}").expect("static pattern"))
}

/// Replace every `${name}` in `template` with `row[name]`, or the empty
/// string when the key is absent. No recursive substitution; there is no way
/// to escape a literal `${`.
pub fn substitute(template: &str, row: &ParamRow) -> String {
    placeholder()
        .replace_all(template, |caps: &regex::Captures| {
            row.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ParamRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitute_replaces_known_keys() {
        let params = row(&[("name", "alice"), ("id", "42")]);
        assert_eq!(substitute("${name}", &params), "alice");
        assert_eq!(
            substitute("https://example.com/users/${id}?who=${name}", &params),
            "https://example.com/users/42?who=alice"
        );
    }

    #[test]
    fn substitute_missing_key_becomes_empty() {
        let params = row(&[("name", "alice")]);
        assert_eq!(substitute("hello ${nope}!", &params), "hello !");
    }

    #[test]
    fn substitute_is_not_recursive() {
        let params = row(&[("a", "${b}"), ("b", "x")]);
        assert_eq!(substitute("${a}", &params), "${b}");
    }

    #[test]
    fn parse_csv_basic() {
        let rows = parse_csv("name,city\nalice,tokyo\nbob,osaka\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "alice");
        assert_eq!(rows[0]["city"], "tokyo");
        assert_eq!(rows[1]["name"], "bob");
    }

    #[test]
    fn parse_csv_pads_short_rows_with_empty() {
        let rows = parse_csv("a,b,c\n1,2\n");
        assert_eq!(rows[0]["a"], "1");
        assert_eq!(rows[0]["b"], "2");
        assert_eq!(rows[0]["c"], "");
    }

    #[test]
    fn parse_csv_skips_empty_lines() {
        let rows = parse_csv("a\n1\n\n2\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn parse_csv_header_only() {
        assert!(parse_csv("a,b\n").is_empty());
        assert!(parse_csv("").is_empty());
    }

    #[test]
    fn parse_csv_does_not_unquote() {
        // No escaping support: a quoted comma still splits the field.
        let rows = parse_csv("a,b\n\"x,y\",z\n");
        assert_eq!(rows[0]["a"], "\"x");
        assert_eq!(rows[0]["b"], "y\"");
    }
}
