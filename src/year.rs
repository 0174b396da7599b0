//! Year extraction from free-form date strings.
//!
//! Dump dates are written by hand: `"1782"`, `"ca. 1782"`, `"16th cent."`,
//! `"Feb 12, 1908"`, `"1782 or 1789"`, `"1800/1"`. [`extract_year`] picks the
//! *highest* plausible year in such a string, which is the conservative choice
//! when the year feeds a death-date based computation.
//!
//! The result is `(year, approximate)`, with `(-1, false)` when nothing usable
//! is found.

use std::sync::LazyLock;

use regex::Regex;

/// Returned when no year can be derived.
pub const NO_YEAR: (i32, bool) = (-1, false);

const KNOWN_NON_DATES: &[&str] = &["(", ")", ".", ",", "*", ".*"];

static CENTURY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})(?:st|nd|rd|th)\s*cent").expect("valid century regex")
});

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,4})\b").expect("valid year regex"));

static APPROXIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ca\.|approx\.)(?:\W|$)|\b(?:circa|approximately|approx|about|around)\b")
        .expect("valid approximation regex")
});

static ALTERNATIVES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-/]| or ").expect("valid alternatives regex"));

/// Knobs for [`extract_year`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearOptions {
    /// Return the year found next to an approximation marker as-is, flagged exact.
    pub exact_only: bool,
    /// Years added to an approximate year.
    pub adjustment: i32,
}

impl Default for YearOptions {
    fn default() -> Self {
        Self {
            exact_only: false,
            adjustment: 5,
        }
    }
}

impl YearOptions {
    pub fn exact() -> Self {
        Self {
            exact_only: true,
            ..Self::default()
        }
    }
}

/// Normalize a date string with default options.
pub fn normalize_year(text: &str) -> (i32, bool) {
    extract_year(text, YearOptions::default())
}

/// Extract the most specific (highest) year from `text`.
///
/// ```
/// use dumpbeam::year::{extract_year, normalize_year, YearOptions};
///
/// assert_eq!(normalize_year("1782"), (1782, false));
/// assert_eq!(normalize_year("ca. 1782"), (1787, true));
/// assert_eq!(extract_year("ca. 1782", YearOptions::exact()), (1782, false));
/// assert_eq!(normalize_year("1800/1"), (1801, true));
/// assert_eq!(normalize_year("no date"), (-1, false));
/// ```
pub fn extract_year(text: &str, opts: YearOptions) -> (i32, bool) {
    if text.is_empty() || KNOWN_NON_DATES.contains(&text) {
        return NO_YEAR;
    }
    let s = text.trim().to_lowercase();
    if s.contains("from old catalog") {
        return NO_YEAR;
    }

    // "16th cent." covers 1501-1600; keep the upper bound.
    if let Some(c) = CENTURY.captures(&s)
        && let Ok(century) = c[1].parse::<i32>()
    {
        return (century * 100, true);
    }

    let approximate = APPROXIMATE.is_match(&s);
    let cleaned = APPROXIMATE.replace_all(&s, " ").replace('?', "");
    let cleaned = cleaned.trim();

    if approximate && let Some(year) = years_in(cleaned).max() {
        return if opts.exact_only {
            (year, false)
        } else {
            (year + opts.adjustment, true)
        };
    }

    let parts: Vec<&str> = ALTERNATIVES.split(cleaned).collect();
    let mut years: Vec<i32> = Vec::new();
    for part in &parts {
        for year in years_in(part) {
            let year = match years.iter().max() {
                Some(&prev) if year < 100 => expand_short_year(prev, year),
                _ => year,
            };
            years.push(year);
        }
    }

    match years.into_iter().max() {
        Some(year) => (year, parts.len() > 1),
        None => NO_YEAR,
    }
}

fn years_in(s: &str) -> impl Iterator<Item = i32> + '_ {
    YEAR.captures_iter(s)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
}

/// `"1782 or 9"` means 1789: borrow the leading digits of the previous year.
fn expand_short_year(prev: i32, short: i32) -> i32 {
    let prev = prev.to_string();
    let short_s = short.to_string();
    if prev.len() <= short_s.len() {
        return short;
    }
    format!("{}{}", &prev[..prev.len() - short_s.len()], short_s)
        .parse()
        .unwrap_or(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_documented_formats() {
        assert_eq!(normalize_year("1782"), (1782, false));
        assert_eq!(normalize_year("16th cent."), (1600, true));
        assert_eq!(normalize_year("Feb 12, 1908"), (1908, false));
        assert_eq!(normalize_year("1782 or 1789"), (1789, true));
        assert_eq!(normalize_year("1782 or 9"), (1789, true));
        assert_eq!(normalize_year("circa 1900?"), (1905, true));
    }

    #[test]
    fn rejects_non_dates() {
        assert_eq!(normalize_year(""), NO_YEAR);
        assert_eq!(normalize_year("."), NO_YEAR);
        assert_eq!(normalize_year("[from old catalog]"), NO_YEAR);
        assert_eq!(normalize_year("unknown"), NO_YEAR);
    }

    #[test]
    fn short_year_expansion() {
        assert_eq!(expand_short_year(1800, 1), 1801);
        assert_eq!(expand_short_year(1782, 89), 1789);
        assert_eq!(expand_short_year(5, 12), 12);
    }
}
