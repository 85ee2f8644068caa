use std::sync::Arc;

use crate::config::AppConfig;
use crate::extractor::HtmlDealExtractor;
use crate::fetcher::HttpFetcher;
use crate::models::{ChatId, OwnerSet};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::publisher::Publisher;
use crate::registry::SourceRegistry;
use crate::scheduler::DealScheduler;
use crate::telegram::{CommandHandler, CommandListener, TelegramClient};
use crate::transformer::LinkTransformer;
use crate::utils::error::Result;

/// Every long-lived component, wired once from configuration.
pub struct AppContext {
    pub config: AppConfig,
    pub registry: SourceRegistry,
    pub telegram: TelegramClient,
    pub pipeline: Arc<Pipeline>,
    pub scheduler: DealScheduler,
    pub owners: OwnerSet,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let registry = SourceRegistry::connect(&config.database).await?;
        let seeded = registry.seed(&config.scraper.seed_sources).await?;
        if seeded > 0 {
            tracing::info!("Seeded {} new sources", seeded);
        }

        let fetcher = Arc::new(HttpFetcher::from_config(&config.scraper)?);
        let extractor = HtmlDealExtractor::from_config(fetcher, &config.scraper)?;
        let transformer = LinkTransformer::from_config(&config.links)?;

        let telegram = TelegramClient::from_config(&config.telegram)?;
        let publisher = Publisher::new(
            Arc::new(telegram.clone()),
            ChatId::from(config.telegram.channel_id.as_str()),
            config.publisher.message_delay(),
        );

        let pipeline = Arc::new(Pipeline::new(
            registry.clone(),
            Arc::new(extractor),
            transformer,
            publisher,
            config.scheduler.single_flight,
        ));
        let scheduler = DealScheduler::new(pipeline.clone(), config.scheduler.interval());

        let owners = OwnerSet::new(config.telegram.owner_ids.iter().copied());
        if owners.is_empty() {
            tracing::warn!("No owners configured, /addsource and /postnow are disabled");
        }

        tracing::info!(
            "Link mode {:?}, {} owners, posting up to {} deals per source",
            config.links.mode,
            owners.len(),
            config.scraper.max_posts_per_cycle
        );

        Ok(Self {
            config,
            registry,
            telegram,
            pipeline,
            scheduler,
            owners,
        })
    }

    /// A single pipeline pass, for `--once`.
    pub async fn run_once(&self) -> RunOutcome {
        self.pipeline.run_once().await
    }

    /// Runs the scheduler and the command listener until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let bot_username = match self.telegram.get_me().await {
            Ok(me) => {
                tracing::info!("Connected as @{}", me.username.as_deref().unwrap_or("unknown"));
                me.username
            }
            Err(e) => {
                tracing::warn!(
                    "getMe failed, commands addressed with @username will be ignored: {}",
                    e
                );
                None
            }
        };

        let handler = CommandHandler::new(
            self.registry.clone(),
            self.pipeline.clone(),
            self.owners.clone(),
        )
        .with_bot_username(bot_username);

        let listener = CommandListener::new(
            self.telegram.clone(),
            Arc::new(handler),
            self.config.telegram.poll_timeout(),
            self.config.telegram.skip_pending_updates,
        );

        let scheduler_task = self.scheduler.spawn();

        tokio::select! {
            _ = listener.run() => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutting down...");
            }
        }

        scheduler_task.abort();
        self.registry.close().await;
        Ok(())
    }
}
