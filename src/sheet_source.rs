// src/sheet_source.rs
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::roster::Dataset;
use crate::sheet_links::SheetLinks;
use crate::sheet_parser::{parse_sheet, SheetParseError};

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Sheet fetch returned status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse sheet: {0}")]
    Parse(#[from] SheetParseError),

    #[error("No Google Sheets links configured")]
    NoLinks,

    #[error("No sheet could be loaded ({failed} failed)")]
    NothingLoaded { failed: usize },
}

/// Anything that can hand back a published sheet as CSV text.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_csv(&self, url: &str) -> Result<String, SheetError>;
}

pub struct HttpSheetSource {
    http_client: Client,
}

impl HttpSheetSource {
    pub fn new(timeout: Duration) -> Result<Self, SheetError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_csv(&self, url: &str) -> Result<String, SheetError> {
        debug!("Fetching sheet {}", url);
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Fetches and parses every linked sheet in month order. Sources that fail to
/// load or parse are logged and skipped; it is an error only when none loads.
pub async fn fetch_all(
    source: &dyn SheetSource,
    links: &SheetLinks,
) -> Result<Vec<Dataset>, SheetError> {
    if links.is_empty() {
        return Err(SheetError::NoLinks);
    }

    let mut loaded = Vec::new();
    let mut failed = 0;
    for (month_year, url) in links.iter() {
        let result = match source.fetch_csv(url).await {
            Ok(text) => parse_sheet(&text).map_err(SheetError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(dataset) => {
                info!(
                    "Loaded {}: {} teams, {} dates",
                    month_year,
                    dataset.teams.len(),
                    dataset.headers.len()
                );
                loaded.push(dataset);
            }
            Err(e) => {
                warn!("Skipping {} ({}): {}", month_year, url, e);
                failed += 1;
            }
        }
    }

    if loaded.is_empty() {
        return Err(SheetError::NothingLoaded { failed });
    }
    Ok(loaded)
}
