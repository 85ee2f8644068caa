use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LinkConfig, LinkMode};
use crate::models::Outcome;
use crate::utils::error::Result;

pub mod chrome;

pub use chrome::ChromeAffiliateBackend;

/// Third-party service that converts a product link into a monetized one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AffiliateBackend: Send + Sync {
    async fn create_profit_link(&self, link: &str) -> Result<String>;
}

/// Link transformation strategy, chosen once at startup.
#[derive(Clone)]
pub enum LinkTransformer {
    /// Returns every link unchanged.
    PassThrough,
    /// Converts through an affiliate backend, falling back to the raw link.
    Automated(Arc<dyn AffiliateBackend>),
}

impl std::fmt::Debug for LinkTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkTransformer::PassThrough => f.write_str("LinkTransformer::PassThrough"),
            LinkTransformer::Automated(_) => f.write_str("LinkTransformer::Automated"),
        }
    }
}

impl LinkTransformer {
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        match config.mode {
            LinkMode::Noop => Ok(LinkTransformer::PassThrough),
            LinkMode::Automated => {
                let backend = ChromeAffiliateBackend::from_config(config)?;
                Ok(LinkTransformer::Automated(Arc::new(backend)))
            }
        }
    }

    pub fn mode(&self) -> LinkMode {
        match self {
            LinkTransformer::PassThrough => LinkMode::Noop,
            LinkTransformer::Automated(_) => LinkMode::Automated,
        }
    }

    /// Produces the link to publish. Never fails: any backend error yields
    /// the original link as a degraded outcome.
    pub async fn transform(&self, link: &str) -> Outcome<String> {
        let backend = match self {
            LinkTransformer::PassThrough => return Outcome::Success(link.to_string()),
            LinkTransformer::Automated(backend) => backend,
        };

        match backend.create_profit_link(link).await {
            Ok(profit_link) if !profit_link.trim().is_empty() => {
                Outcome::Success(profit_link.trim().to_string())
            }
            Ok(_) => {
                tracing::error!("Profit link error for {}: backend returned an empty link", link);
                metrics::counter!("dealcast_link_fallbacks_total").increment(1);
                Outcome::degraded(link.to_string(), "backend returned an empty link")
            }
            Err(e) => {
                tracing::error!("Profit link error for {}: {}", link, e);
                metrics::counter!("dealcast_link_fallbacks_total").increment(1);
                Outcome::degraded(link.to_string(), e.to_string())
            }
        }
    }
}
