use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// How a matched rule turns its captures into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Group 1, trimmed.
    Group,
    /// Group 1 up to the first comma, trimmed.
    UntilComma,
    /// Group 1 with embedded URLs removed, trimmed.
    GroupWithoutUrls,
    /// The whole match, trimmed.
    Whole,
    /// The whole match, first letter upper-cased and the rest lower-cased.
    Capitalized,
}

#[derive(Debug, Clone)]
pub struct Rule {
    re: Regex,
    capture: Capture,
}

impl Rule {
    pub fn new(pattern: &str, capture: Capture) -> Result<Self, regex::Error> {
        Ok(Rule {
            re: Regex::new(pattern)?,
            capture,
        })
    }

    fn apply(&self, text: &str) -> Option<String> {
        let caps = self.re.captures(text)?;
        let value = match self.capture {
            Capture::Group => caps.get(1)?.as_str().trim().to_string(),
            Capture::UntilComma => caps
                .get(1)?
                .as_str()
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            Capture::GroupWithoutUrls => URL_RE
                .replace_all(caps.get(1)?.as_str(), "")
                .trim()
                .to_string(),
            Capture::Whole => caps.get(0)?.as_str().trim().to_string(),
            Capture::Capitalized => capitalize(caps.get(0)?.as_str().trim()),
        };
        Some(value).filter(|v| !v.is_empty())
    }
}

/// Rules evaluated in priority order; the first one yielding a non-empty
/// value wins.
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<Rule>,
}

impl RuleChain {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleChain { rules }
    }

    /// Build a chain where every pattern shares the same capture mode.
    pub fn from_patterns(patterns: &[&str], capture: Capture) -> Result<Self, regex::Error> {
        let rules = patterns
            .iter()
            .map(|p| Rule::new(p, capture))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleChain { rules })
    }

    pub fn then(mut self, other: RuleChain) -> Self {
        self.rules.extend(other.rules);
        self
    }

    pub fn first_match(&self, text: &str) -> Option<String> {
        self.rules.iter().find_map(|r| r.apply(text))
    }
}

/// Case-insensitive whole-word alternation over table entries
/// (entries are regex fragments).
pub fn word_alternation(entries: &[String]) -> Option<String> {
    let parts: Vec<&str> = entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(format!(r"(?i)\b(?:{})\b", parts.join("|")))
    }
}

/// First URL in `text`.
pub fn first_url(text: &str) -> Option<String> {
    URL_RE.find(text).map(|m| m.as_str().to_string())
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
