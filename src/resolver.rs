use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, fold_name, CompanyRecord, VacancyRecord};
use crate::error::ResolveError;
use crate::parser::rules::first_url;
use crate::parser::tables::PatternTables;

static JOB_DESCRIPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Описание вакансии").unwrap());

const WINDOW_BEFORE: usize = 50;
const WINDOW_AFTER: usize = 300;

/// "About us" detection used to slice a company blurb out of a vacancy.
#[derive(Debug, Clone)]
pub struct CompanyHeuristics {
    about: Option<Regex>,
}

impl CompanyHeuristics {
    pub fn new(tables: &PatternTables) -> Result<Self, regex::Error> {
        let signals: Vec<&str> = tables
            .about_signals
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let about = if signals.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?:{})", signals.join("|")))?)
        };
        Ok(CompanyHeuristics { about })
    }

    /// Text before the "Описание вакансии" marker is searched for the first
    /// about-us signal; the snippet spans 50 chars before it to 300 after.
    pub fn company_description(&self, text: &str) -> Option<String> {
        let about = self.about.as_ref()?;
        let head = match JOB_DESCRIPTION_MARKER.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        };
        let m = about.find(head)?;

        let start = head[..m.start()]
            .char_indices()
            .rev()
            .nth(WINDOW_BEFORE - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let end = head[m.end()..]
            .char_indices()
            .nth(WINDOW_AFTER)
            .map(|(i, _)| m.end() + i)
            .unwrap_or(head.len());

        let snippet = head[start..end].trim();
        if snippet.is_empty() {
            None
        } else {
            Some(snippet.to_string())
        }
    }
}

impl Default for CompanyHeuristics {
    fn default() -> Self {
        DEFAULT_HEURISTICS.clone()
    }
}

static DEFAULT_HEURISTICS: LazyLock<CompanyHeuristics> = LazyLock::new(|| {
    CompanyHeuristics::new(&PatternTables::default()).expect("built-in about signals compile")
});

pub fn extract_company_description(text: &str) -> Option<String> {
    DEFAULT_HEURISTICS.company_description(text)
}

/// One row per distinct company name (trimmed, case kept), first vacancy
/// wins. Names differing only in case stay separate here.
pub fn build_companies_table(
    vacancies: &[VacancyRecord],
    heuristics: &CompanyHeuristics,
) -> Result<Vec<CompanyRecord>, ResolveError> {
    if vacancies.is_empty() {
        return Err(ResolveError::MissingColumns);
    }

    let mut seen = HashSet::new();
    let mut companies = Vec::new();
    for v in vacancies {
        let Some(name) = v.company.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        if !seen.insert(name.to_string()) {
            continue;
        }
        let description = v.description.as_deref();
        companies.push(CompanyRecord {
            name: name.to_string(),
            description: description.and_then(|d| heuristics.company_description(d)),
            url: description.and_then(first_url),
            city: v.location.clone(),
        });
    }

    info!("Extracted {} unique companies", companies.len());
    Ok(companies)
}

/// Append companies whose folded name is not stored yet. The existence
/// check and the append are separate statements.
pub fn save_companies_to_db(
    conn: &Connection,
    companies: Option<&[CompanyRecord]>,
) -> Result<usize, ResolveError> {
    let companies = match companies {
        Some(c) if !c.is_empty() => c,
        _ => {
            info!("No company data to save");
            return Ok(0);
        }
    };

    let existing = db::existing_company_names(conn)?;
    let fresh: Vec<CompanyRecord> = companies
        .iter()
        .filter(|c| !existing.contains(&fold_name(&c.name)))
        .cloned()
        .collect();
    if fresh.is_empty() {
        info!("All {} companies already stored", companies.len());
        return Ok(0);
    }

    let saved = db::append_companies(conn, &fresh)?;
    info!("Saved {} companies ({} already stored)", saved, companies.len() - fresh.len());
    Ok(saved)
}

/// Outcome of linking vacancies to company ids.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub linked: usize,
    pub inserted: usize,
    /// Names whose insert failed, with the error text.
    pub failed: Vec<(String, String)>,
    /// Vacancies that name a company but still have no id.
    pub unmapped: usize,
    /// Vacancies without a company name.
    pub anonymous: usize,
}

/// Fill `company_id` from the stored companies, inserting names the store
/// has never seen. Insert failures are collected, not raised.
pub fn add_company_ids(conn: &Connection, vacancies: &mut [VacancyRecord]) -> LinkReport {
    let mut report = LinkReport::default();

    let map = load_id_map(conn);
    assign_ids(&map, vacancies);

    let mut missing_keys = HashSet::new();
    let missing: Vec<String> = vacancies
        .iter()
        .filter(|v| v.company_id.is_none())
        .filter_map(|v| v.company.as_deref().map(str::trim))
        .filter(|n| !n.is_empty() && missing_keys.insert(fold_name(n)))
        .map(str::to_string)
        .collect();

    if !missing.is_empty() {
        info!("Inserting {} unseen companies", missing.len());
        for name in &missing {
            match db::insert_company_if_absent(conn, name) {
                Ok(true) => report.inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to insert company {:?}: {}", name, e);
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }
        let map = load_id_map(conn);
        assign_ids(&map, vacancies);
    }

    for v in vacancies.iter() {
        match (&v.company, v.company_id) {
            (_, Some(_)) => report.linked += 1,
            (Some(name), None) if !name.trim().is_empty() => report.unmapped += 1,
            _ => report.anonymous += 1,
        }
    }

    if report.unmapped > 0 {
        warn!("{} vacancies still without company_id", report.unmapped);
    } else {
        info!("All named companies linked ({} vacancies)", report.linked);
    }
    report
}

fn load_id_map(conn: &Connection) -> HashMap<String, i64> {
    match db::company_id_map(conn) {
        Ok(map) => map,
        Err(e) => {
            warn!("Could not read companies, treating store as empty: {}", e);
            HashMap::new()
        }
    }
}

fn assign_ids(map: &HashMap<String, i64>, vacancies: &mut [VacancyRecord]) {
    for v in vacancies.iter_mut() {
        if let Some(name) = &v.company {
            v.company_id = map.get(&fold_name(name)).copied();
        }
    }
}
