use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Vocabularies the extractors match against. Loadable from JSON so the
/// lists can be tuned or localized without touching the rules.
///
/// `job_titles` and `about_signals` entries are regex fragments; `cities`
/// and `work_formats` are plain words.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternTables {
    pub job_titles: Vec<String>,
    /// Scanned in list order; the first listed city present anywhere wins.
    pub cities: Vec<String>,
    pub work_formats: Vec<String>,
    pub about_signals: Vec<String>,
}

const JOB_TITLES: &[&str] = &[
    "Backend",
    "Frontend",
    "Full[- ]?stack",
    "Mobile",
    "iOS",
    "Android",
    "Flutter",
    "React",
    "Python",
    "Java",
    "Golang",
    r"\.NET",
    "DevOps",
    "QA",
    "Tester",
    "UI/UX",
    "Designer",
    "Data Scientist",
    "ML Engineer",
    "Product Manager",
    "Project Manager",
    "HR",
    "Recruiter",
    "System Administrator",
    "Helpdesk",
    "Software Engineer",
    "Team Lead",
    "Tech Lead",
    "CTO",
    "Developer",
    "Разработчик",
    "Программист",
    "Дизайнер",
    "Тестировщик",
    "Аналитик",
    "Менеджер",
];

const CITIES: &[&str] = &[
    "Алматы",
    "Астана",
    "Нур-Султан",
    "Шымкент",
    "Караганда",
    "Актобе",
    "Тараз",
    "Павлодар",
    "Усть-Каменогорск",
    "Семей",
    "Атырау",
    "Костанай",
    "Кызылорда",
    "Уральск",
    "Петропавловск",
    "Актау",
    "Темиртау",
    "Туркестан",
];

const WORK_FORMATS: &[&str] = &[
    "офис",
    "удаленка",
    "удаленно",
    "гибрид",
    "remote",
    "office",
    "hybrid",
];

const ABOUT_SIGNALS: &[&str] = &[
    r"Компания\s*[:\-]\s*[^\n]+",
    "[Аа] наша",
    "[Нн]аша команда",
    "[Зз]анима[ею]мся",
    "[Тт]ехнологическ",
    "AI",
    "инновац",
    "разработк",
    "решени",
];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for PatternTables {
    fn default() -> Self {
        PatternTables {
            job_titles: owned(JOB_TITLES),
            cities: owned(CITIES),
            work_formats: owned(WORK_FORMATS),
            about_signals: owned(ABOUT_SIGNALS),
        }
    }
}

impl PatternTables {
    /// Load tables from a JSON file. Keys missing from the file keep their
    /// built-in lists.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern tables {:?}", path))?;
        let tables = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid pattern tables {:?}", path))?;
        Ok(tables)
    }
}
