//! Last.fm `track.getTopTags` client.
//!
//! Used to label matched songs with a crowd-sourced genre. Lookups fan out
//! over a bounded stream; one failed lookup leaves that song unlabelled and
//! never stops the batch.

use futures::stream::{self, StreamExt};
use lakh::MsdId;
use plumconf::LastFmConfig;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("plum/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(500);

/// Last.fm error code for an unknown track.
pub const ERROR_NOT_FOUND: u32 = 6;
/// Codes Last.fm documents as temporary: operation failed, service offline,
/// temporarily unavailable, rate limit exceeded.
pub const TRANSIENT_ERROR_CODES: [u32; 4] = [8, 11, 16, 29];

#[derive(Debug, Error)]
pub enum LastFmError {
    #[error("track not found: {message}")]
    NotFound { message: String },

    #[error("Last.fm API error {code}: {message}")]
    Api { code: u32, message: String },

    #[error("response has no top tags")]
    MissingTags,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl LastFmError {
    /// Worth another attempt after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http(status) => *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16(),
            Self::Api { code, .. } => TRANSIENT_ERROR_CODES.contains(code),
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: u32,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct TopTagsBody {
    toptags: Option<TopTags>,
}

#[derive(Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: OneOrMany<Tag>,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
}

/// Last.fm collapses single-element arrays into a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(t) => vec![t],
            Self::Many(v) => v,
        }
    }
}

/// Turn a response body into tags, or the error it carries.
pub fn parse_top_tags(status: StatusCode, body: &str) -> Result<Vec<String>, LastFmError> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !status.is_success() => return Err(LastFmError::Http(status.as_u16())),
        Err(e) => return Err(LastFmError::InvalidJson(e.to_string())),
    };

    if value.get("error").is_some() {
        let err: ErrorBody = serde_json::from_value(value)
            .map_err(|e| LastFmError::InvalidJson(e.to_string()))?;
        return Err(if err.error == ERROR_NOT_FOUND {
            LastFmError::NotFound {
                message: err.message,
            }
        } else {
            LastFmError::Api {
                code: err.error,
                message: err.message,
            }
        });
    }

    if !status.is_success() {
        return Err(LastFmError::Http(status.as_u16()));
    }

    let body: TopTagsBody =
        serde_json::from_value(value).map_err(|e| LastFmError::InvalidJson(e.to_string()))?;
    let toptags = body.toptags.ok_or(LastFmError::MissingTags)?;

    Ok(toptags
        .tag
        .into_vec()
        .into_iter()
        .map(|t| t.name.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect())
}

pub struct LastFmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    retry_base: Duration,
}

impl LastFmClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self, LastFmError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LastFmError::Network(e.to_string()))?;
        let base_url = Url::parse(base_url).map_err(|e| LastFmError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url,
            max_retries: 0,
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    pub fn from_config(config: &LastFmConfig, api_key: impl Into<String>) -> Result<Self, LastFmError> {
        Ok(Self::new(
            api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_max_retries(config.max_retries))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First backoff delay; doubles on each retry.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// The `track.gettoptags` URL for a song, query-encoded.
    pub fn request_url(&self, artist: &str, title: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("method", "track.gettoptags")
            .append_pair("artist", artist)
            .append_pair("track", title)
            .append_pair("autocorrect", "1")
            .append_pair("api_key", &self.api_key)
            .append_pair("format", "json");
        url
    }

    /// Top tags for a song, most popular first.
    pub async fn top_tags(&self, artist: &str, title: &str) -> Result<Vec<String>, LastFmError> {
        tracing::debug!(artist, title, "requesting Last.fm top tags");

        let resp = self
            .http
            .get(self.request_url(artist, title))
            .send()
            .await
            .map_err(|e| LastFmError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LastFmError::Network(e.to_string()))?;

        let tags = parse_top_tags(status, &body)?;
        tracing::info!(artist, title, count = tags.len(), "retrieved Last.fm tags");
        Ok(tags)
    }

    /// [`top_tags`](Self::top_tags) with transient failures retried.
    pub async fn top_tags_with_retry(&self, artist: &str, title: &str) -> Result<Vec<String>, LastFmError> {
        let mut attempt = 0u32;
        loop {
            match self.top_tags(artist, title).await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_base * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        artist,
                        title,
                        attempt = attempt + 1,
                        error = %e,
                        "Last.fm lookup failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Top tags, with an unknown track optionally read as "no tags".
    pub async fn top_genre_tags(
        &self,
        artist: &str,
        title: &str,
        ignore_not_found: bool,
    ) -> Result<Vec<String>, LastFmError> {
        match self.top_tags_with_retry(artist, title).await {
            Err(LastFmError::NotFound { .. }) if ignore_not_found => Ok(Vec::new()),
            result => result,
        }
    }
}

/// One song to look up.
#[derive(Debug, Clone)]
pub struct TagQuery {
    pub msd_id: MsdId,
    pub artist: String,
    pub title: String,
}

/// Look up the top tag of every query with at most `concurrency` requests
/// in flight. Results come back in input order; failures become `None`.
pub async fn fetch_top_genres(
    client: &LastFmClient,
    queries: Vec<TagQuery>,
    concurrency: usize,
) -> Vec<(MsdId, Option<String>)> {
    let mut results: Vec<(usize, MsdId, Option<String>)> = stream::iter(queries.into_iter().enumerate())
        .map(|(index, query)| async move {
            let genre = match client.top_genre_tags(&query.artist, &query.title, true).await {
                Ok(tags) => tags.into_iter().next(),
                Err(e) => {
                    tracing::warn!(
                        msd_id = %query.msd_id,
                        artist = %query.artist,
                        title = %query.title,
                        error = %e,
                        "no genre for song"
                    );
                    None
                }
            };
            (index, query.msd_id, genre)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _, _)| *index);
    results.into_iter().map(|(_, id, genre)| (id, genre)).collect()
}
