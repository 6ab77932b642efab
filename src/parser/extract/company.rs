use crate::parser::rules::{Capture, RuleChain};

/// Company name: the "Компания:" label (URLs stripped), then the
/// "О компании" / "В компанию" phrases.
#[derive(Debug, Clone)]
pub struct CompanyRules {
    chain: RuleChain,
}

impl CompanyRules {
    pub fn new() -> Result<Self, regex::Error> {
        let label = RuleChain::from_patterns(&[r"(?i)Компания:\s*([^\n\r]+)"], Capture::GroupWithoutUrls)?;
        let phrase = RuleChain::from_patterns(
            &[r"(?i)(?:О компании|В компани[ию])\s+([^\n]+)"],
            Capture::Group,
        )?;
        Ok(CompanyRules {
            chain: label.then(phrase),
        })
    }

    pub fn extract(&self, clean: &str) -> Option<String> {
        self.chain.first_match(clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_with_url_stripped() {
        let rules = CompanyRules::new().unwrap();
        let text = "Компания: Kaspi.kz https://kaspi.kz/careers\nГород: Алматы";
        assert_eq!(rules.extract(text).as_deref(), Some("Kaspi.kz"));
    }

    #[test]
    fn phrase_fallback() {
        let rules = CompanyRules::new().unwrap();
        assert_eq!(
            rules.extract("Приглашаем в компанию Chocofamily на позицию").as_deref(),
            Some("Chocofamily на позицию")
        );
        assert_eq!(
            rules.extract("О компании Beeline Казахстан").as_deref(),
            Some("Beeline Казахстан")
        );
    }

    #[test]
    fn url_only_label_is_treated_as_missing() {
        let rules = CompanyRules::new().unwrap();
        assert_eq!(rules.extract("Компания: https://example.com"), None);
    }

    #[test]
    fn absent() {
        let rules = CompanyRules::new().unwrap();
        assert_eq!(rules.extract("Python Developer, удаленно"), None);
    }
}
