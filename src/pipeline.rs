use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::extractor::DealExtractor;
use crate::models::Source;
use crate::publisher::Publisher;
use crate::registry::SourceRegistry;
use crate::transformer::LinkTransformer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: usize,
    pub sources_failed: usize,
    pub deals_found: usize,
    pub published: usize,
    pub publish_failures: usize,
    pub link_fallbacks: usize,
    pub error: Option<String>,
}

impl RunReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            sources: 0,
            sources_failed: 0,
            deals_found: 0,
            published: 0,
            publish_failures: 0,
            link_fallbacks: 0,
            error: None,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run held the single-flight guard.
    Skipped,
}

/// One pass over every registered source: extract, transform, publish.
///
/// Sources and deals are handled strictly one after another so channel
/// order within a run is deterministic and publisher pacing holds.
pub struct Pipeline {
    registry: SourceRegistry,
    extractor: Arc<dyn DealExtractor>,
    transformer: LinkTransformer,
    publisher: Publisher,
    guard: Option<Mutex<()>>,
}

impl Pipeline {
    pub fn new(
        registry: SourceRegistry,
        extractor: Arc<dyn DealExtractor>,
        transformer: LinkTransformer,
        publisher: Publisher,
        single_flight: bool,
    ) -> Self {
        Self {
            registry,
            extractor,
            transformer,
            publisher,
            guard: single_flight.then(|| Mutex::new(())),
        }
    }

    pub async fn run_once(&self) -> RunOutcome {
        let _permit = match &self.guard {
            Some(guard) => match guard.try_lock() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::info!("Posting run already in progress, skipping");
                    metrics::counter!("dealcast_runs_skipped_total").increment(1);
                    return RunOutcome::Skipped;
                }
            },
            None => None,
        };

        let mut report = RunReport::start();
        let span = tracing::info_span!("run", run_id = %report.run_id);
        self.drain_sources(&mut report).instrument(span).await;
        report.finished_at = Utc::now();

        tracing::info!(
            "Run {} finished in {}ms: {} sources, {} deals, {} published, {} failed",
            report.run_id,
            report.duration_ms(),
            report.sources,
            report.deals_found,
            report.published,
            report.publish_failures
        );
        metrics::counter!("dealcast_runs_completed_total").increment(1);
        metrics::histogram!("dealcast_run_duration_seconds")
            .record(report.duration_ms() as f64 / 1000.0);

        RunOutcome::Completed(report)
    }

    async fn drain_sources(&self, report: &mut RunReport) {
        tracing::info!("Posting deals...");

        let sources = match self.registry.list().await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!("Failed to read sources: {}", e);
                report.error = Some(e.to_string());
                return;
            }
        };

        report.sources = sources.len();
        for source in &sources {
            self.process_source(source, report).await;
        }
    }

    async fn process_source(&self, source: &Source, report: &mut RunReport) {
        let extraction = self.extractor.extract(source).await;
        if extraction.is_degraded() {
            report.sources_failed += 1;
        }

        let deals = extraction.into_value();
        tracing::debug!("{} deals from {}", deals.len(), source.url);
        report.deals_found += deals.len();

        for deal in &deals {
            let link = self.transformer.transform(&deal.link).await;
            if link.is_degraded() {
                report.link_fallbacks += 1;
            }

            match self.publisher.publish(deal, link.value()).await {
                Ok(_) => {
                    report.published += 1;
                    metrics::counter!("dealcast_deals_published_total").increment(1);
                }
                Err(e) => {
                    tracing::error!("Post error for '{}': {}", deal.title, e);
                    report.publish_failures += 1;
                    metrics::counter!("dealcast_publish_failures_total").increment(1);
                }
            }
        }
    }
}
