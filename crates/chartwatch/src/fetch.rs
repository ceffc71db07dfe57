use std::path::{Path, PathBuf};

use chart::{parse_payload, parse_record, ParseError};
use library::SongIndex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug)]
pub enum FetchError {
    Http(reqwest::Error),
    Status(StatusCode),
    Payload(ParseError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "http error: {}", err),
            FetchError::Status(status) => write!(f, "http {}", status),
            FetchError::Payload(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err)
    }
}

impl From<ParseError> for FetchError {
    fn from(err: ParseError) -> Self {
        FetchError::Payload(err)
    }
}

#[derive(Clone, Debug)]
pub struct ChartFetcher {
    client: Client,
    url: String,
    documents: PathBuf,
}

impl ChartFetcher {
    pub fn new(client: Client, url: impl Into<String>, documents: PathBuf) -> Self {
        Self {
            client,
            url: url.into(),
            documents,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads the current chart and pushes it, in server order, onto `base`.
    pub async fn fetch(&self, base: SongIndex) -> Result<SongIndex, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.bytes().await?;
        let rows = parse_payload(&body)?;
        let index = build_index(&rows, &self.documents, base);
        info!(
            "Fetched {} of {} chart rows from {}",
            index.count(),
            rows.len(),
            self.url
        );
        Ok(index)
    }
}

/// Parses, hydrates and pushes chart rows onto `index`. Malformed rows are
/// skipped.
pub fn build_index(rows: &[Value], documents: &Path, mut index: SongIndex) -> SongIndex {
    for (position, row) in rows.iter().enumerate() {
        match parse_record(row) {
            Ok(record) => index.push(record.hydrate(documents)),
            Err(err) => warn!("Skipping chart row {}: {}", position, err),
        }
    }
    index
}
