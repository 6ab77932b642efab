pub mod export;
pub mod feed;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SourceError;

/// Lower-cased keywords; a message must contain at least one to be kept.
pub const VACANCY_KEYWORDS: &[&str] = &["вакансия", "работа", "позиция", "ищем", "требуется", "должность"];

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub channel: String,
    pub date: NaiveDateTime,
    pub text: String,
}

impl RawMessage {
    pub fn formatted_date(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

/// Anything that can hand back the latest messages of a named channel.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_channel(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError>;
}

pub fn is_vacancy_candidate(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    VACANCY_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn keep_candidates(messages: Vec<RawMessage>) -> Vec<RawMessage> {
    messages
        .into_iter()
        .filter(|m| is_vacancy_candidate(&m.text))
        .collect()
}

/// Fetch one channel and keep only messages that look like vacancies.
/// Messages received before a rate-limit signal are filtered the same way
/// and travel with the error.
pub async fn scrape_channel<S: MessageSource + ?Sized>(
    source: &S,
    channel: &str,
    limit: usize,
) -> Result<Vec<RawMessage>, SourceError> {
    info!("Parsing channel: @{}", channel);
    let messages = match source.fetch_channel(channel, limit).await {
        Ok(messages) => keep_candidates(messages),
        Err(SourceError::RateLimited { seconds, partial }) => {
            return Err(SourceError::RateLimited {
                seconds,
                partial: keep_candidates(partial),
            })
        }
        Err(e) => return Err(e),
    };
    info!("Collected {} messages from @{}", messages.len(), channel);
    Ok(messages)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectStats {
    pub channels: usize,
    pub messages: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

/// Walk the channels in order. A rate-limit signal keeps what the channel
/// yielded so far and suspends for the requested time before moving on;
/// any other failure is logged and skipped. Messages gathered from earlier
/// channels are always kept.
pub async fn collect_all<S: MessageSource + ?Sized>(
    source: &S,
    channels: &[String],
    limit: usize,
) -> (Vec<RawMessage>, CollectStats) {
    let mut all = Vec::new();
    let mut stats = CollectStats {
        channels: channels.len(),
        ..CollectStats::default()
    };

    for channel in channels {
        match scrape_channel(source, channel, limit).await {
            Ok(messages) => all.extend(messages),
            Err(SourceError::RateLimited { seconds, partial }) => {
                warn!(
                    "Rate limited on @{} after {} messages: sleeping for {} seconds",
                    channel,
                    partial.len(),
                    seconds
                );
                all.extend(partial);
                stats.rate_limited += 1;
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            Err(e) => {
                warn!("Error in @{}: {}", channel, e);
                stats.failed += 1;
            }
        }
    }

    stats.messages = all.len();
    (all, stats)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;

    enum Reply {
        Messages(Vec<&'static str>),
        RateLimited(u64),
        RateLimitedAfter(u64, Vec<&'static str>),
        Missing,
    }

    struct ScriptedSource {
        replies: HashMap<&'static str, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<(&'static str, Reply)>) -> Self {
            ScriptedSource {
                replies: replies.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn fetch_channel(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
            self.calls.lock().unwrap().push(channel.to_string());
            let build = |texts: &[&str]| -> Vec<RawMessage> {
                texts
                    .iter()
                    .take(limit)
                    .enumerate()
                    .map(|(i, t)| RawMessage {
                        channel: channel.to_string(),
                        date: at(i as u32),
                        text: t.to_string(),
                    })
                    .collect()
            };
            match self.replies.get(channel) {
                Some(Reply::Messages(texts)) => Ok(build(&texts[..])),
                Some(Reply::RateLimited(seconds)) => Err(SourceError::RateLimited {
                    seconds: *seconds,
                    partial: Vec::new(),
                }),
                Some(Reply::RateLimitedAfter(seconds, texts)) => Err(SourceError::RateLimited {
                    seconds: *seconds,
                    partial: build(&texts[..]),
                }),
                _ => Err(SourceError::ChannelNotFound(channel.to_string())),
            }
        }
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyword_filter() {
        assert!(is_vacancy_candidate("ВАКАНСИЯ: бухгалтер"));
        assert!(is_vacancy_candidate("Мы ищем дизайнера"));
        assert!(!is_vacancy_candidate("Продам велосипед"));
        assert!(!is_vacancy_candidate("   "));
    }

    #[test]
    fn date_is_minute_precision() {
        let m = RawMessage {
            channel: "c".into(),
            date: at(9),
            text: String::new(),
        };
        assert_eq!(m.formatted_date(), "2024-04-02 09:15");
    }

    #[tokio::test]
    async fn scrape_channel_filters_non_vacancies() {
        let source = ScriptedSource::new(vec![(
            "jobs",
            Reply::Messages(vec!["Требуется повар", "С днем рождения!", "Должность: QA"]),
        )]);
        let msgs = scrape_channel(&source, "jobs", 200).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].text, "Должность: QA");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_sleeps_once_and_keeps_earlier_messages() {
        let source = ScriptedSource::new(vec![
            ("first", Reply::Messages(vec!["Вакансия: повар", "Ищем официанта"])),
            ("busy", Reply::RateLimited(30)),
            ("last", Reply::Messages(vec!["Требуется водитель"])),
        ]);

        let started = tokio::time::Instant::now();
        let (messages, stats) = collect_all(&source, &channels(&["first", "busy", "last"]), 200).await;
        let waited = started.elapsed();

        assert_eq!(waited, Duration::from_secs(30));
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].channel, "first");
        assert_eq!(messages[2].channel, "last");
        assert_eq!(*source.calls.lock().unwrap(), vec!["first", "busy", "last"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_channel_keeps_messages_before_the_signal() {
        let source = ScriptedSource::new(vec![
            ("busy", Reply::RateLimitedAfter(15, vec!["Ищем бариста", "Скидки недели", "Вакансия: курьер"])),
            ("next", Reply::Messages(vec!["Требуется водитель"])),
        ]);

        let started = tokio::time::Instant::now();
        let (messages, stats) = collect_all(&source, &channels(&["busy", "next"]), 200).await;

        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.messages, 3);
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Ищем бариста", "Вакансия: курьер", "Требуется водитель"]);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_skip_channel_without_waiting() {
        let source = ScriptedSource::new(vec![
            ("gone", Reply::Missing),
            ("ok", Reply::Messages(vec!["Работа для студентов"])),
        ]);
        let started = tokio::time::Instant::now();
        let (messages, stats) = collect_all(&source, &channels(&["gone", "ok"]), 200).await;

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.messages, 1);
        assert_eq!(messages[0].channel, "ok");
    }

    #[tokio::test]
    async fn limit_is_passed_through() {
        let source = ScriptedSource::new(vec![(
            "jobs",
            Reply::Messages(vec!["Ищем A", "Ищем B", "Ищем C"]),
        )]);
        let (messages, _) = collect_all(&source, &channels(&["jobs"]), 2).await;
        assert_eq!(messages.len(), 2);
    }
}
