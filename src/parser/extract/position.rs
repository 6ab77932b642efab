use crate::parser::rules::{word_alternation, Capture, Rule, RuleChain};
use crate::parser::tables::PatternTables;

const LABELS: &[&str] = &[
    r"(?i)Должность:\s*([^\n\r]+)",
    r"(?i)Вакансия:\s*([^\n]+)",
    r"(?i)Позиция:\s*([^\n]+)",
    r"(?i)Ищем\s+([^\n]+)",
    r"(?i)Требуется\s+([^\n]+)",
];

/// Explicit labels first, then the job-title vocabulary as a whole-word hit.
#[derive(Debug, Clone)]
pub struct PositionRules {
    chain: RuleChain,
}

impl PositionRules {
    pub fn new(tables: &PatternTables) -> Result<Self, regex::Error> {
        let mut chain = RuleChain::from_patterns(LABELS, Capture::Group)?;
        if let Some(pattern) = word_alternation(&tables.job_titles) {
            chain = chain.then(RuleChain::new(vec![Rule::new(&pattern, Capture::Whole)?]));
        }
        Ok(PositionRules { chain })
    }

    /// `clean` is the message with hashtags removed.
    pub fn extract(&self, clean: &str) -> Option<String> {
        self.chain.first_match(clean)
    }
}
