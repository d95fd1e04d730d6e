//! Scan policy: decides which freshly observed snippets are new enough to send
//!
//! Everything here is pure. The engine feeds in the raw scan output together
//! with the last-sent index and gets back the accepted subset in scan order.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::history::LastSentIndex;

/// Collapse every whitespace run to a single space and trim the ends
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop empty snippets and normalize the rest, keeping scan order
pub fn prepare(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| normalize(&s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Remove exact duplicates within one scan, preserving first-seen order.
/// Returns the unique snippets and how many were removed.
pub fn dedupe(snippets: Vec<String>) -> (Vec<String>, usize) {
    let before = snippets.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<String> = snippets
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Result of the debounce filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceOutcome {
    pub accepted: Vec<String>,
    /// Skipped snippets with the time since they were last sent
    pub skipped: Vec<(String, Duration)>,
}

/// Whether `text` may be sent at `now` given when it was last sent
pub fn is_due(text: &str, last_sent: &LastSentIndex, debounce_seconds: i64, now: DateTime<Utc>) -> bool {
    if debounce_seconds <= 0 {
        return true;
    }
    let Some(sent_at) = last_sent.get(text) else {
        return true;
    };
    // a window too large for chrono never expires
    match Duration::try_seconds(debounce_seconds) {
        Some(window) => now - sent_at >= window,
        None => false,
    }
}

/// Accept snippets that were never sent or whose debounce window has passed.
/// `debounce_seconds <= 0` accepts everything.
pub fn filter_debounce(
    snippets: Vec<String>,
    last_sent: &LastSentIndex,
    debounce_seconds: i64,
    now: DateTime<Utc>,
) -> DebounceOutcome {
    let mut outcome = DebounceOutcome::default();
    for snippet in snippets {
        if is_due(&snippet, last_sent, debounce_seconds, now) {
            outcome.accepted.push(snippet);
        } else {
            let age = last_sent
                .get(&snippet)
                .map(|sent_at| now - sent_at)
                .unwrap_or_else(Duration::zero);
            outcome.skipped.push((snippet, age));
        }
    }
    outcome
}

/// Content filter applied to every snippet. An empty pattern accepts all.
#[derive(Debug, Clone)]
pub struct MatchFilter {
    regex: Option<Regex>,
}

impl MatchFilter {
    pub fn new(pattern: &str) -> crate::Result<Self> {
        if pattern.is_empty() {
            return Ok(Self { regex: None });
        }
        let regex = Regex::new(pattern).map_err(|e| {
            crate::WatchError::Config(format!("invalid match pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_none_or(|re| re.is_match(text))
    }

    pub fn filter(&self, snippets: Vec<String>) -> Vec<String> {
        snippets.into_iter().filter(|s| self.is_match(s)).collect()
    }
}

/// Parse the unsigned integer a snippet starts with, if any
pub fn leading_number(text: &str) -> Option<u64> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Whether a snippet survives the lower-leading-number check
pub fn passes_monotonic(text: &str, last_number: Option<u64>) -> bool {
    match (last_number, leading_number(text)) {
        (Some(last), Some(current)) => current >= last,
        _ => true,
    }
}

/// Skip snippets whose leading number is lower than the one most recently sent.
/// Snippets without a leading number always pass.
pub fn filter_monotonic(snippets: Vec<String>, last_number: Option<u64>) -> (Vec<String>, Vec<String>) {
    snippets
        .into_iter()
        .partition(|s| passes_monotonic(s, last_number))
}

/// Replace every non-ASCII character with `?`
pub fn to_ascii_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, DateTime<Utc>)]) -> LastSentIndex {
        let mut index = LastSentIndex::default();
        for (text, at) in entries {
            index.record(text, *at);
        }
        index
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  ALERT \t X\n\n now "), "ALERT X now");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn prepare_discards_empty_snippets() {
        let raw = vec![
            "".to_string(),
            "  a  b ".to_string(),
            " \n ".to_string(),
            "c".to_string(),
        ];
        assert_eq!(prepare(raw), vec!["a b", "c"]);
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let snippets = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        let (unique, removed) = dedupe(snippets);
        assert_eq!(unique, vec!["b", "a", "c"]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn debounce_accepts_never_sent() {
        let now = Utc::now();
        let outcome = filter_debounce(vec!["new".to_string()], &LastSentIndex::default(), 600, now);
        assert_eq!(outcome.accepted, vec!["new"]);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn debounce_skips_recent_and_accepts_old() {
        let now = Utc::now();
        let last_sent = index(&[
            ("old", now - Duration::seconds(700)),
            ("recent", now),
        ]);
        let outcome = filter_debounce(
            vec!["recent".to_string(), "old".to_string()],
            &last_sent,
            600,
            now,
        );
        assert_eq!(outcome.accepted, vec!["old"]);
        assert_eq!(outcome.skipped, vec![("recent".to_string(), Duration::zero())]);
    }

    #[test]
    fn debounce_boundary_is_inclusive() {
        let now = Utc::now();
        let last_sent = index(&[("x", now - Duration::seconds(600))]);
        assert!(is_due("x", &last_sent, 600, now));
        assert!(!is_due("x", &last_sent, 601, now));
    }

    #[test]
    fn debounce_disabled_when_not_positive() {
        let now = Utc::now();
        let last_sent = index(&[("x", now)]);
        assert!(is_due("x", &last_sent, 0, now));
        assert!(is_due("x", &last_sent, -5, now));
    }

    #[test]
    fn huge_debounce_never_expires() {
        let now = Utc::now();
        let last_sent = index(&[("x", now - Duration::days(365 * 50))]);
        assert!(!is_due("x", &last_sent, 10_000_000_000_000_000, now));
        assert!(!is_due("x", &last_sent, i64::MAX, now));
        assert!(is_due("y", &last_sent, i64::MAX, now));
    }

    #[test]
    fn empty_match_pattern_accepts_everything() {
        let filter = MatchFilter::new("").unwrap();
        assert!(filter.is_match("anything at all"));
        assert!(filter.is_match(""));
    }

    #[test]
    fn match_pattern_filters_snippets() {
        let filter = MatchFilter::new(r"^ALERT\b").unwrap();
        let kept = filter.filter(vec![
            "ALERT one".to_string(),
            "no alert".to_string(),
            "ALERT two".to_string(),
        ]);
        assert_eq!(kept, vec!["ALERT one", "ALERT two"]);
    }

    #[test]
    fn invalid_match_pattern_is_config_error() {
        let err = MatchFilter::new("[").unwrap_err();
        assert!(matches!(err, crate::WatchError::Config(_)));
    }

    #[test]
    fn leading_number_parsing() {
        assert_eq!(leading_number("12 new orders"), Some(12));
        assert_eq!(leading_number("  7"), Some(7));
        assert_eq!(leading_number("orders: 12"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn monotonic_filter_skips_lower_numbers() {
        let snippets = vec!["9 a", "10 b", "11 c", "no number"]
            .into_iter()
            .map(String::from)
            .collect();
        let (accepted, skipped) = filter_monotonic(snippets, Some(10));
        assert_eq!(accepted, vec!["10 b", "11 c", "no number"]);
        assert_eq!(skipped, vec!["9 a"]);
    }

    #[test]
    fn monotonic_filter_without_history_passes_all() {
        let (accepted, skipped) = filter_monotonic(vec!["1 a".to_string()], None);
        assert_eq!(accepted, vec!["1 a"]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn ascii_safe_replaces_non_ascii() {
        assert_eq!(to_ascii_safe("café – ok"), "caf? ? ok");
        assert_eq!(to_ascii_safe("plain"), "plain");
    }
}
