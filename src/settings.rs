use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

const DEFAULT_DB_PATH: &str = "data/vacancies.sqlite";
const DEFAULT_EXPORT_DIR: &str = "data/export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Export,
    Feed,
}

/// Runtime settings: defaults, then `vacancy.toml`, then `VACANCY_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Either a comma-joined string or a list.
    #[serde(default, deserialize_with = "channel_list")]
    pub channels: Vec<String>,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_source")]
    pub source: SourceKind,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub feed_token: Option<String>,
    #[serde(default)]
    pub tables_path: Option<PathBuf>,
    #[serde(default = "default_min_training_rows")]
    pub min_training_rows: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_fetch_limit() -> usize {
    200
}

fn default_source() -> SourceKind {
    SourceKind::Export
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

fn default_min_training_rows() -> usize {
    10
}

impl Settings {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let raw = Config::builder()
            .add_source(File::with_name("vacancy").required(false))
            .add_source(
                Environment::with_prefix("VACANCY")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("channels"),
            )
            .build()
            .context("Failed to read configuration")?;
        raw.try_deserialize().context("Invalid configuration")
    }
}

/// Trim, drop a leading `@`, skip blanks.
pub fn normalize_channels<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|c| c.as_ref().trim().trim_start_matches('@').trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelList {
    Joined(String),
    Items(Vec<String>),
}

fn channel_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match ChannelList::deserialize(deserializer)? {
        ChannelList::Joined(raw) => parse_channel_list(&raw),
        ChannelList::Items(items) => normalize_channels(&items),
    })
}

/// Parse a `--channels a,b,c` flag.
pub fn parse_channel_list(raw: &str) -> Vec<String> {
    normalize_channels(&raw.split(',').collect::<Vec<_>>())
}
