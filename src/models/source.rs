use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::error::{AppError, Result};

/// A configured origin that is scraped for deals on every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq, Hash)]
pub struct Source {
    pub url: String,
}

impl Source {
    /// Normalizes raw user or config input into a source.
    ///
    /// Surrounding whitespace is dropped; an empty result is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(AppError::InvalidInput(
                "source url must not be empty".to_string(),
            ));
        }

        Ok(Self {
            url: url.to_string(),
        })
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
