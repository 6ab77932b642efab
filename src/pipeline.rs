use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::classifier::{train_text_classifier, NaiveBayes};
use crate::db::{self, VacancyRecord};
use crate::parser::tables::PatternTables;
use crate::parser::{ExtractedFields, Extractor};
use crate::resolver::{self, CompanyHeuristics, LinkReport};
use crate::source::{self, MessageSource, RawMessage};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const CHUNK_SIZE: usize = 500;

/// Compiled extraction and company heuristics for one batch run.
pub struct Pipeline {
    extractor: Extractor,
    heuristics: CompanyHeuristics,
}

impl VacancyRecord {
    pub fn from_fields(fields: ExtractedFields, message: &RawMessage) -> Self {
        VacancyRecord {
            position: fields.position,
            company: fields.company,
            location: fields.location,
            salary: fields.salary,
            contacts: fields.contacts,
            description: fields.description,
            channel: message.channel.clone(),
            date: message.formatted_date(),
            company_id: None,
        }
    }
}

pub struct SyncReport {
    pub companies_saved: usize,
    pub link: LinkReport,
    pub vacancies_saved: usize,
}

impl SyncReport {
    pub fn print(&self) {
        println!(
            "Saved {} new companies (+{} by name), {} vacancies ({} linked, {} unmapped, {} without company).",
            self.companies_saved,
            self.link.inserted,
            self.vacancies_saved,
            self.link.linked,
            self.link.unmapped,
            self.link.anonymous,
        );
        for (name, err) in &self.link.failed {
            println!("  company {:?} not inserted: {}", name, err);
        }
    }
}

impl Pipeline {
    pub fn new(tables: &PatternTables) -> Result<Self> {
        Ok(Pipeline {
            extractor: Extractor::new(tables).context("Invalid extraction patterns")?,
            heuristics: CompanyHeuristics::new(tables).context("Invalid about-us signals")?,
        })
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn heuristics(&self) -> &CompanyHeuristics {
        &self.heuristics
    }

    #[cfg(feature = "rayon")]
    fn extract_chunk(&self, chunk: &[RawMessage]) -> Vec<VacancyRecord> {
        chunk
            .par_iter()
            .map(|m| VacancyRecord::from_fields(self.extractor.extract(&m.text), m))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn extract_chunk(&self, chunk: &[RawMessage]) -> Vec<VacancyRecord> {
        chunk
            .iter()
            .map(|m| VacancyRecord::from_fields(self.extractor.extract(&m.text), m))
            .collect()
    }

    /// Extract every message, keeping input order, and drop records
    /// without a position.
    pub fn process_messages(&self, messages: &[RawMessage]) -> Vec<VacancyRecord> {
        let pb = ProgressBar::new(messages.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut vacancies = Vec::with_capacity(messages.len());
        for chunk in messages.chunks(CHUNK_SIZE) {
            vacancies.extend(self.extract_chunk(chunk));
            pb.inc(chunk.len() as u64);
        }
        pb.finish_and_clear();

        let total = vacancies.len();
        vacancies.retain(|v| v.position.is_some());
        info!("Found {} vacancies with positions ({} dropped)", vacancies.len(), total - vacancies.len());
        vacancies
    }

    /// Companies first, then ids onto vacancies, then the vacancies
    /// themselves. Each failing step is logged and the next one still runs.
    pub fn sync_store(&self, conn: &Connection, vacancies: &mut [VacancyRecord]) -> SyncReport {
        if let Err(e) = db::ensure_tables(conn) {
            warn!("Could not ensure tables: {}", e);
        }

        let companies = match resolver::build_companies_table(vacancies, &self.heuristics) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Skipping company table: {}", e);
                None
            }
        };

        let companies_saved = match resolver::save_companies_to_db(conn, companies.as_deref()) {
            Ok(n) => n,
            Err(e) => {
                warn!("Error saving companies: {}", e);
                0
            }
        };

        let link = resolver::add_company_ids(conn, vacancies);

        let vacancies_saved = match db::save_vacancies(conn, vacancies) {
            Ok(n) => n,
            Err(e) => {
                warn!("Error saving vacancies: {}", e);
                0
            }
        };

        SyncReport {
            companies_saved,
            link,
            vacancies_saved,
        }
    }

    /// Extract, train, store. Shared by `process` and `run`.
    pub fn process_and_store(
        &self,
        conn: &Connection,
        messages: &[RawMessage],
        min_training_rows: usize,
    ) -> Option<SyncReport> {
        let mut vacancies = self.process_messages(messages);
        println!("Found {} vacancies with positions", vacancies.len());
        if vacancies.is_empty() {
            println!("No valid vacancies");
            return None;
        }

        match train_text_classifier(&mut NaiveBayes::default(), &vacancies, min_training_rows) {
            Some(report) => {
                println!("\nModel report:");
                report.print();
            }
            None => println!("Not enough data to train the model"),
        }

        let report = self.sync_store(conn, &mut vacancies);
        report.print();
        Some(report)
    }
}

/// Full batch: collect from every channel, then process and store.
pub async fn run<S: MessageSource + ?Sized>(
    pipeline: &Pipeline,
    conn: &Connection,
    source: &S,
    channels: &[String],
    limit: usize,
    min_training_rows: usize,
) -> Result<()> {
    let (messages, stats) = source::collect_all(source, channels, limit).await;
    println!(
        "Collected {} messages from {} channels ({} rate limited, {} failed)",
        stats.messages, stats.channels, stats.rate_limited, stats.failed
    );
    if messages.is_empty() {
        println!("No messages found");
        return Ok(());
    }

    pipeline.process_and_store(conn, &messages, min_training_rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn message(channel: &str, text: &str) -> RawMessage {
        RawMessage {
            channel: channel.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(14, 7, 59)
                .unwrap(),
            text: text.to_string(),
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(&PatternTables::default()).unwrap()
    }

    fn setup() -> Connection {
        let conn = db::connect_in_memory().unwrap();
        db::ensure_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn end_to_end_record() {
        let msgs = vec![message(
            "it_jobs_kz",
            "Должность: Python Developer\nКомпания: Acme\nГород: Алматы\nЗП: 500000\n@hr_acme",
        )];
        let rows = pipeline().process_messages(&msgs);
        assert_eq!(rows.len(), 1);
        let v = &rows[0];
        assert_eq!(v.position.as_deref(), Some("Python Developer"));
        assert_eq!(v.company.as_deref(), Some("Acme"));
        assert_eq!(v.location.as_deref(), Some("Алматы"));
        assert_eq!(v.salary.as_deref(), Some("500000"));
        assert_eq!(v.contacts.as_deref(), Some("@hr_acme"));
        assert!(v.description.is_some());
        assert_eq!(v.channel, "it_jobs_kz");
        assert_eq!(v.date, "2024-06-03 14:07");
        assert_eq!(v.company_id, None);
    }

    #[test]
    fn records_without_position_are_dropped_in_order() {
        let msgs = vec![
            message("a", "Вакансия: Курьер"),
            message("a", "Работа мечты? Напишите нам, расскажем"),
            message("b", "Требуется бариста"),
        ];
        let rows = pipeline().process_messages(&msgs);
        let positions: Vec<_> = rows.iter().map(|v| v.position.as_deref().unwrap()).collect();
        assert_eq!(positions, vec!["Курьер", "бариста"]);
        assert!(rows.iter().all(|v| v.position.is_some()));
    }

    #[test]
    fn sync_twice_adds_no_companies() {
        let conn = setup();
        let p = pipeline();
        let msgs = vec![
            message("a", "Должность: QA\nКомпания: Acme\nНаша команда делает логистику https://acme.kz"),
            message("a", "Должность: PM\nКомпания: ACME"),
            message("b", "Должность: Backend\nКомпания: Kolesa Group"),
            message("b", "Должность: Курьер"),
        ];

        let mut first = p.process_messages(&msgs);
        let report = p.sync_store(&conn, &mut first);
        // "ACME" collides with "Acme" in the bulk append, so that append
        // is rejected and the names arrive through the id backfill instead
        assert_eq!(report.vacancies_saved, 4);
        assert_eq!(report.link.linked, 3);
        assert_eq!(report.link.anonymous, 1);
        let after_first = db::fetch_companies(&conn).unwrap().len();
        assert_eq!(after_first, 2);

        let mut second = p.process_messages(&msgs);
        let report = p.sync_store(&conn, &mut second);
        assert_eq!(report.companies_saved, 0);
        assert_eq!(report.link.inserted, 0);
        assert_eq!(db::fetch_companies(&conn).unwrap().len(), after_first);
        assert_eq!(first[0].company_id, second[0].company_id);
        assert_eq!(second[0].company_id, second[1].company_id);
    }

    #[test]
    fn company_details_are_kept_when_append_succeeds() {
        let conn = setup();
        let p = pipeline();
        let msgs = vec![message(
            "a",
            "Должность: QA\nКомпания: Acme\nГород: Астана\nНаша команда делает логистику https://acme.kz",
        )];
        let mut rows = p.process_messages(&msgs);
        let report = p.sync_store(&conn, &mut rows);
        assert_eq!(report.companies_saved, 1);

        let stored = db::fetch_companies(&conn).unwrap();
        assert_eq!(stored[0].name, "Acme");
        assert_eq!(stored[0].url.as_deref(), Some("https://acme.kz"));
        assert_eq!(stored[0].city.as_deref(), Some("Астана"));
        assert!(stored[0].description.as_deref().unwrap().contains("Наша команда"));
        assert_eq!(rows[0].company_id, Some(stored[0].id));
    }

    #[test]
    fn empty_batch_still_syncs() {
        let conn = setup();
        let report = pipeline().sync_store(&conn, &mut []);
        assert_eq!(report.companies_saved, 0);
        assert_eq!(report.vacancies_saved, 0);
    }
}
