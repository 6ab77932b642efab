use crate::parser::rules::{Capture, RuleChain};

#[derive(Debug, Clone)]
pub struct SalaryRules {
    chain: RuleChain,
}

impl SalaryRules {
    pub fn new() -> Result<Self, regex::Error> {
        let chain =
            RuleChain::from_patterns(&[r"(?i)(?:Оплата|Зарплата|ЗП):\s*([^\n\r]+)"], Capture::UntilComma)?;
        Ok(SalaryRules { chain })
    }

    pub fn extract(&self, clean: &str) -> Option<String> {
        self.chain.first_match(clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salary_labels() {
        let rules = SalaryRules::new().unwrap();
        assert_eq!(rules.extract("ЗП: 500 000 ₸").as_deref(), Some("500 000 ₸"));
        assert_eq!(rules.extract("зарплата: от 300к, на руки").as_deref(), Some("от 300к"));
        assert_eq!(rules.extract("Оплата:договорная").as_deref(), Some("договорная"));
    }

    #[test]
    fn no_label() {
        let rules = SalaryRules::new().unwrap();
        assert_eq!(rules.extract("Платим хорошо"), None);
    }
}
