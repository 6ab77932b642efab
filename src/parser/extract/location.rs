use crate::parser::rules::{word_alternation, Capture, Rule, RuleChain};
use crate::parser::tables::PatternTables;

/// Location cascade: "Город:"/"Локация:" label on the cleaned text, then
/// the city table in list order, then a work-format keyword. The last two
/// look at the raw message.
#[derive(Debug, Clone)]
pub struct LocationRules {
    label: RuleChain,
    /// (display name, lower-cased needle)
    cities: Vec<(String, String)>,
    work_format: RuleChain,
}

impl LocationRules {
    pub fn new(tables: &PatternTables) -> Result<Self, regex::Error> {
        let label =
            RuleChain::from_patterns(&[r"(?i)(?:Город|Локация):\s*([^\n\r]+)"], Capture::UntilComma)?;

        let cities = tables
            .cities
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| (c.to_string(), c.to_lowercase()))
            .collect();

        let escaped: Vec<String> = tables.work_formats.iter().map(|w| regex::escape(w.trim())).collect();
        let work_format = match word_alternation(&escaped) {
            Some(pattern) => RuleChain::new(vec![Rule::new(&pattern, Capture::Capitalized)?]),
            None => RuleChain::default(),
        };

        Ok(LocationRules {
            label,
            cities,
            work_format,
        })
    }

    pub fn extract(&self, clean: &str, raw: &str) -> Option<String> {
        if let Some(loc) = self.label.first_match(clean) {
            return Some(loc);
        }

        let lower = raw.to_lowercase();
        if let Some((city, _)) = self.cities.iter().find(|(_, needle)| lower.contains(needle.as_str())) {
            return Some(city.clone());
        }

        self.work_format.first_match(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> LocationRules {
        LocationRules::new(&PatternTables::default()).unwrap()
    }

    #[test]
    fn label_cut_at_comma() {
        let text = "Город: Астана, левый берег";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Астана"));
    }

    #[test]
    fn city_table_order_not_text_order() {
        // Шымкент appears first in text, Алматы first in the table
        let text = "Офисы в Шымкент и Алматы";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Алматы"));
    }

    #[test]
    fn city_match_is_case_insensitive_substring() {
        let text = "работа в г.АЛМАТЫ";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Алматы"));
    }

    #[test]
    fn work_format_capitalized() {
        let text = "Формат: REMOTE only";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Remote"));
        let text = "Работа удаленно, полный день";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Удаленно"));
        let text = "гибрид 3/2";
        assert_eq!(rules().extract(text, text).as_deref(), Some("Гибрид"));
    }

    #[test]
    fn city_inside_hashtag_still_counts() {
        let raw = "Ищем бариста #Караганда";
        let clean = "Ищем бариста";
        assert_eq!(rules().extract(clean, raw).as_deref(), Some("Караганда"));
    }

    #[test]
    fn nothing_found() {
        let text = "Ищем Python разработчика";
        assert_eq!(rules().extract(text, text), None);
    }
}
