use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").unwrap());
static TME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:https?://)?t\.me/(\w+)").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+7\d{10}").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

/// Handles, t.me links, +7 phones and emails, in that order, deduplicated
/// by first occurrence and joined with ", ".
pub fn extract(clean: &str) -> Option<String> {
    let mut found: Vec<String> = Vec::new();
    found.extend(HANDLE_RE.captures_iter(clean).map(|c| format!("@{}", &c[1])));
    found.extend(TME_RE.captures_iter(clean).map(|c| c[1].to_string()));
    found.extend(PHONE_RE.find_iter(clean).map(|m| m.as_str().to_string()));
    found.extend(EMAIL_RE.find_iter(clean).map(|m| m.as_str().to_string()));

    let mut seen = HashSet::new();
    let unique: Vec<String> = found.into_iter().filter(|c| seen.insert(c.clone())).collect();
    if unique.is_empty() {
        None
    } else {
        Some(unique.join(", "))
    }
}
