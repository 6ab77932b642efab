pub mod extract;
pub mod rules;
pub mod tables;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use extract::company::CompanyRules;
use extract::location::LocationRules;
use extract::position::PositionRules;
use extract::salary::SalaryRules;
use tables::PatternTables;

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").unwrap());

static DEFAULT_EXTRACTOR: LazyLock<Extractor> = LazyLock::new(|| {
    Extractor::new(&PatternTables::default()).expect("built-in pattern tables compile")
});

/// Fields pulled out of one message. Every field is optional; a message
/// nothing matches yields all `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub position: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub contacts: Option<String>,
    pub description: Option<String>,
}

/// Compiled rule cascades for every field.
#[derive(Debug, Clone)]
pub struct Extractor {
    position: PositionRules,
    company: CompanyRules,
    location: LocationRules,
    salary: SalaryRules,
}

impl Extractor {
    pub fn new(tables: &PatternTables) -> Result<Self, regex::Error> {
        Ok(Extractor {
            position: PositionRules::new(tables)?,
            company: CompanyRules::new()?,
            location: LocationRules::new(tables)?,
            salary: SalaryRules::new()?,
        })
    }

    /// Structured labels are matched on the hashtag-free text; city and
    /// work-format keywords look at the raw message.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        let clean = strip_hashtags(text);
        ExtractedFields {
            position: self.position.extract(&clean),
            company: self.company.extract(&clean),
            location: self.location.extract(&clean, text),
            salary: self.salary.extract(&clean),
            contacts: extract::contacts::extract(&clean),
            description: extract::description::extract(&clean),
        }
    }
}

/// Extract with the built-in tables.
pub fn extract_fields(text: &str) -> ExtractedFields {
    DEFAULT_EXTRACTOR.extract(text)
}

pub fn strip_hashtags(text: &str) -> String {
    HASHTAG_RE.replace_all(text, "").trim().to_string()
}
