use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{MessageSource, RawMessage};
use crate::error::SourceError;

static FLOOD_WAIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"FLOOD_WAIT_(\d+)").unwrap());

const DEFAULT_BACKOFF_SECS: u64 = 60;
const PAGE_SIZE: usize = 100;

/// Pulls channel history from an HTTP bridge exposing
/// `GET {base}/channels/{channel}/messages?limit=N&offset=K` as a JSON
/// array, newest first. History is read in pages of 100.
pub struct FeedSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct FeedMessage {
    date: DateTime<Utc>,
    #[serde(default)]
    text: Option<String>,
}

enum Page {
    Messages(Vec<FeedMessage>),
    RateLimited(u64),
}

impl FeedSource {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        FeedSource {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn fetch_page(&self, channel: &str, limit: usize, offset: usize) -> Result<Page, SourceError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);
        debug!("GET {} (limit={}, offset={})", url, limit, offset);

        let mut request = self.client.get(&url).query(&[("limit", limit), ("offset", offset)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let header_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let body = response.text().await.unwrap_or_default();
                let seconds = header_secs
                    .or_else(|| flood_wait_seconds(&body))
                    .unwrap_or(DEFAULT_BACKOFF_SECS);
                Ok(Page::RateLimited(seconds))
            }
            StatusCode::NOT_FOUND => Err(SourceError::ChannelNotFound(channel.to_string())),
            status if !status.is_success() => Err(SourceError::Status {
                channel: channel.to_string(),
                status: status.as_u16(),
            }),
            _ => Ok(Page::Messages(response.json().await?)),
        }
    }
}

#[async_trait]
impl MessageSource for FeedSource {
    async fn fetch_channel(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>, SourceError> {
        let mut messages: Vec<RawMessage> = Vec::new();

        while messages.len() < limit {
            let want = PAGE_SIZE.min(limit - messages.len());
            let items = match self.fetch_page(channel, want, messages.len()).await? {
                Page::Messages(items) => items,
                Page::RateLimited(seconds) => {
                    return Err(SourceError::RateLimited {
                        seconds,
                        partial: messages,
                    })
                }
            };
            let exhausted = items.len() < want;
            messages.extend(items.into_iter().take(want).map(|m| RawMessage {
                channel: channel.to_string(),
                date: m.date.naive_utc(),
                text: m.text.unwrap_or_default(),
            }));
            if exhausted {
                break;
            }
        }

        Ok(messages)
    }
}

fn flood_wait_seconds(body: &str) -> Option<u64> {
    FLOOD_WAIT_RE
        .captures(body)
        .and_then(|c| c[1].parse::<u64>().ok())
}
