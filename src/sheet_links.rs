// src/sheet_links.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Month year and Google link are required")]
    MissingField,

    #[error("Invalid sheet URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Link not found for {0}")]
    NotFound(String),
}

/// Published sheet URL per month label, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetLinks(BTreeMap<String, String>);

impl SheetLinks {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Adds or replaces the link for `month_year`.
    pub fn save(&mut self, month_year: &str, link: &str) -> Result<(), LinkError> {
        let (month_year, link) = (month_year.trim(), link.trim());
        if month_year.is_empty() || link.is_empty() {
            return Err(LinkError::MissingField);
        }
        let parsed = Url::parse(link).map_err(|e| LinkError::InvalidUrl {
            url: link.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LinkError::InvalidUrl {
                url: link.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.0.insert(month_year.to_string(), link.to_string()).is_some() {
            info!("Replaced sheet link for {}", month_year);
        } else {
            info!("Added sheet link for {}", month_year);
        }
        Ok(())
    }

    pub fn delete(&mut self, month_year: &str) -> Result<String, LinkError> {
        let month_year = month_year.trim();
        if month_year.is_empty() {
            return Err(LinkError::MissingField);
        }
        let removed = self
            .0
            .remove(month_year)
            .ok_or_else(|| LinkError::NotFound(month_year.to_string()))?;
        info!("Deleted sheet link for {}", month_year);
        Ok(removed)
    }
}
