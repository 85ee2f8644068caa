use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use crate::config::ScraperConfig;
use crate::fetcher::PageFetcher;
use crate::models::{Deal, Outcome, Source};
use crate::utils::error::{AppError, Result};

/// Turns a source into at most `max_deals` deals.
///
/// Implementations must not fail outward: a source that cannot be fetched
/// or parsed yields a degraded, empty list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DealExtractor: Send + Sync {
    async fn extract(&self, source: &Source) -> Outcome<Vec<Deal>>;
}

/// Extracts "deal card" elements from an HTML page.
pub struct HtmlDealExtractor {
    fetcher: Arc<dyn PageFetcher>,
    selector: Selector,
    max_deals: usize,
}

impl HtmlDealExtractor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        deal_selector: &str,
        max_deals: usize,
    ) -> Result<Self> {
        let selector = Selector::parse(deal_selector).map_err(|e| {
            AppError::InvalidInput(format!("Invalid CSS selector '{}': {:?}", deal_selector, e))
        })?;

        Ok(Self {
            fetcher,
            selector,
            max_deals,
        })
    }

    pub fn from_config(fetcher: Arc<dyn PageFetcher>, config: &ScraperConfig) -> Result<Self> {
        Self::new(fetcher, &config.deal_selector, config.max_posts_per_cycle)
    }
}

#[async_trait]
impl DealExtractor for HtmlDealExtractor {
    async fn extract(&self, source: &Source) -> Outcome<Vec<Deal>> {
        let start_time = std::time::Instant::now();

        let html = match self.fetcher.fetch(&source.url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Scrape error for {}: {}", source.url, e);
                metrics::counter!("dealcast_fetch_failures_total").increment(1);
                return Outcome::degraded(Vec::new(), e.to_string());
            }
        };

        let deals = parse_deals(&html, &source.url, &self.selector, self.max_deals);
        tracing::debug!(
            "Extracted {} deals from {} in {}ms",
            deals.len(),
            source.url,
            start_time.elapsed().as_millis()
        );

        Outcome::Success(deals)
    }
}

/// Parses up to `limit` deals out of `html`.
///
/// Each matched element contributes its whitespace-normalized text as the
/// title and its first hyperlink as the link. Elements without a hyperlink
/// link back to `source_url`.
pub fn parse_deals(html: &str, source_url: &str, selector: &Selector, limit: usize) -> Vec<Deal> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .take(limit)
        .map(|element| Deal {
            title: element_title(&element),
            link: element_link(&element, source_url),
        })
        .collect()
}

fn element_title(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn element_link(element: &ElementRef, source_url: &str) -> String {
    let own_href = (element.value().name() == "a")
        .then(|| element.value().attr("href"))
        .flatten();

    let href = own_href.or_else(|| {
        let anchor = Selector::parse("a").ok()?;
        element.select(&anchor).next()?.value().attr("href")
    });

    match href.map(str::trim).filter(|h| !h.is_empty()) {
        Some(href) => resolve_href(source_url, href),
        None => source_url.to_string(),
    }
}

fn resolve_href(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
