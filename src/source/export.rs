use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{MessageSource, RawMessage};
use crate::error::SourceError;

const EXPORT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Reads Telegram Desktop JSON exports laid out as
/// `<root>/<channel>/result.json` or `<root>/<channel>.json`.
pub struct ExportSource {
    root: PathBuf,
}

#[derive(Deserialize)]
struct ExportFile {
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Deserialize)]
struct ExportMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    text: Value,
}

impl ExportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ExportSource { root: root.into() }
    }

    fn locate(&self, channel: &str) -> Option<PathBuf> {
        [
            self.root.join(channel).join("result.json"),
            self.root.join(format!("{}.json", channel)),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

#[async_trait]
impl MessageSource for ExportSource {
    async fn fetch_channel(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
        let path = self
            .locate(channel)
            .ok_or_else(|| SourceError::ChannelNotFound(channel.to_string()))?;
        let raw = tokio::fs::read_to_string(&path).await?;
        parse_export(&raw, channel, limit, &path)
    }
}

fn parse_export(raw: &str, channel: &str, limit: usize, path: &Path) -> Result<Vec<RawMessage>, SourceError> {
    let export: ExportFile = serde_json::from_str(raw)?;

    let mut messages: Vec<RawMessage> = export
        .messages
        .into_iter()
        .filter(|m| m.kind == "message")
        .filter_map(|m| {
            let date = match NaiveDateTime::parse_from_str(&m.date, EXPORT_DATE_FORMAT) {
                Ok(d) => d,
                Err(_) => {
                    debug!("Skipping message with bad date {:?} in {:?}", m.date, path);
                    return None;
                }
            };
            Some(RawMessage {
                channel: channel.to_string(),
                date,
                text: flatten_text(&m.text),
            })
        })
        .collect();

    // Exports are oldest-first; hand back the newest `limit`, newest first.
    messages.reverse();
    messages.truncate(limit);
    Ok(messages)
}

/// Export text is either a plain string or a list of strings and
/// `{type, text}` entities.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "name": "IT Jobs KZ",
        "type": "public_channel",
        "messages": [
            {"id": 1, "type": "service", "date": "2024-03-01T08:00:00", "action": "create_channel", "text": ""},
            {"id": 2, "type": "message", "date": "2024-03-01T09:00:00", "text": "Вакансия: QA"},
            {"id": 3, "type": "message", "date": "2024-03-02T10:30:00",
             "text": ["Должность: ", {"type": "bold", "text": "Go Developer"}, "\nПишите ", {"type": "mention", "text": "@hr"}]},
            {"id": 4, "type": "message", "date": "not a date", "text": "Ищем PM"},
            {"id": 5, "type": "message", "date": "2024-03-03T11:45:00", "photo": "photos/1.jpg"}
        ]
    }"#;

    #[test]
    fn parses_entities_and_skips_service() {
        let msgs = parse_export(EXPORT, "it_jobs", 200, Path::new("x.json")).unwrap();
        assert_eq!(msgs.len(), 3);
        // newest first
        assert_eq!(msgs[0].formatted_date(), "2024-03-03 11:45");
        assert_eq!(msgs[0].text, "");
        assert_eq!(msgs[1].text, "Должность: Go Developer\nПишите @hr");
        assert_eq!(msgs[2].text, "Вакансия: QA");
        assert!(msgs.iter().all(|m| m.channel == "it_jobs"));
    }

    #[test]
    fn limit_keeps_newest() {
        let msgs = parse_export(EXPORT, "it_jobs", 1, Path::new("x.json")).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].formatted_date(), "2024-03-03 11:45");
    }

    #[tokio::test]
    async fn reads_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("result.json"), EXPORT).unwrap();
        std::fs::write(dir.path().join("flat.json"), EXPORT).unwrap();

        let source = ExportSource::new(dir.path());
        assert_eq!(source.fetch_channel("nested", 200).await.unwrap().len(), 3);
        assert_eq!(source.fetch_channel("flat", 200).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_channel() {
        let dir = tempfile::tempdir().unwrap();
        let source = ExportSource::new(dir.path());
        let err = source.fetch_channel("nope", 200).await.unwrap_err();
        assert!(matches!(err, SourceError::ChannelNotFound(c) if c == "nope"));
    }

    #[tokio::test]
    async fn broken_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let source = ExportSource::new(dir.path());
        assert!(matches!(
            source.fetch_channel("bad", 200).await,
            Err(SourceError::Json(_))
        ));
    }
}
