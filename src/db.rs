use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

#[cfg(test)]
pub fn connect_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Idempotent schema bootstrap. Company names are unique regardless of
/// case through `name_key`, the Unicode-folded name.
pub fn ensure_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS companies (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            company_name        TEXT NOT NULL,
            name_key            TEXT UNIQUE NOT NULL,
            company_description TEXT,
            company_url         TEXT,
            city                TEXT
        );

        CREATE TABLE IF NOT EXISTS vacancies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            position    TEXT,
            company_id  INTEGER REFERENCES companies(id) ON DELETE SET NULL,
            location    TEXT,
            salary      TEXT,
            contacts    TEXT,
            channel     TEXT,
            date        TEXT,
            description TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_vacancies_company ON vacancies(company_id);
        ",
    )?;
    Ok(())
}

/// Lookup key for company names: trimmed and case-folded.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ── Rows ──

/// One extracted vacancy. `company_id` stays `None` until the company
/// resolver has run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub position: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub contacts: Option<String>,
    pub description: Option<String>,
    pub channel: String,
    pub date: String,
    #[serde(default)]
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyRecord {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredCompany {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub city: Option<String>,
}

// ── Companies ──

pub fn fetch_companies(conn: &Connection) -> Result<Vec<StoredCompany>> {
    let mut stmt = conn.prepare(
        "SELECT id, company_name, company_description, company_url, city
         FROM companies ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredCompany {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                url: row.get(3)?,
                city: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Folded company name → id for every stored company.
pub fn company_id_map(conn: &Connection) -> Result<HashMap<String, i64>> {
    Ok(fetch_companies(conn)?
        .into_iter()
        .map(|c| (fold_name(&c.name), c.id))
        .collect())
}

pub fn existing_company_names(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name_key FROM companies")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(names)
}

/// Insert a bare company name; an existing name is left untouched.
/// Returns whether a row was written.
pub fn insert_company_if_absent(conn: &Connection, name: &str) -> Result<bool> {
    let n = conn.execute(
        "INSERT INTO companies (company_name, name_key) VALUES (?1, ?2)
         ON CONFLICT(name_key) DO NOTHING",
        rusqlite::params![name.trim(), fold_name(name)],
    )?;
    Ok(n > 0)
}

/// Plain append in one transaction. A name that already exists fails the
/// whole append.
pub fn append_companies(conn: &Connection, rows: &[CompanyRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO companies (company_name, name_key, company_description, company_url, city)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for c in rows {
            count += stmt.execute(rusqlite::params![
                c.name.trim(),
                fold_name(&c.name),
                c.description,
                c.url,
                c.city
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Vacancies ──

pub fn save_vacancies(conn: &Connection, rows: &[VacancyRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO vacancies
             (position, company_id, location, salary, contacts, channel, date, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for v in rows {
            count += stmt.execute(rusqlite::params![
                v.position, v.company_id, v.location, v.salary, v.contacts, v.channel, v.date,
                v.description,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Overview ──

pub struct OverviewRow {
    pub position: String,
    pub company: String,
    pub location: String,
    pub salary: String,
    pub channel: String,
    pub date: String,
}

pub fn fetch_overview(
    conn: &Connection,
    city: Option<&str>,
    channel: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(c) = city {
        conditions.push(format!("v.location = ?{} COLLATE NOCASE", params.len() + 1));
        params.push(Box::new(c.to_string()));
    }
    if let Some(ch) = channel {
        conditions.push(format!("v.channel = ?{}", params.len() + 1));
        params.push(Box::new(ch.trim_start_matches('@').to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT COALESCE(v.position,''), COALESCE(c.company_name,''), COALESCE(v.location,''),
                COALESCE(v.salary,''), COALESCE(v.channel,''), COALESCE(v.date,'')
         FROM vacancies v
         LEFT JOIN companies c ON c.id = v.company_id{}
         ORDER BY v.date DESC, v.id DESC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                position: row.get(0)?,
                company: row.get(1)?,
                location: row.get(2)?,
                salary: row.get(3)?,
                channel: row.get(4)?,
                date: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub companies: usize,
    pub vacancies: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub channels: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let companies: usize = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
    let vacancies: usize = conn.query_row("SELECT COUNT(*) FROM vacancies", [], |r| r.get(0))?;
    let linked: usize = conn.query_row(
        "SELECT COUNT(*) FROM vacancies WHERE company_id IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let channels: usize =
        conn.query_row("SELECT COUNT(DISTINCT channel) FROM vacancies", [], |r| r.get(0))?;
    Ok(Stats {
        companies,
        vacancies,
        linked,
        unlinked: vacancies - linked,
        channels,
    })
}
