use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "dealcast.log";

/// Builds the filter from `RUST_LOG` when set, otherwise from the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level)
        .map_err(|e| AppError::InvalidInput(format!("Invalid log level '{}': {}", config.level, e)))
}

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as the file log should be flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}

pub fn install_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| AppError::Internal(format!("Failed to start metrics exporter: {}", e)))?;

    metrics::describe_counter!("dealcast_deals_published_total", "Deals posted to the channel");
    metrics::describe_counter!("dealcast_publish_failures_total", "Deals whose post was rejected");
    metrics::describe_counter!(
        "dealcast_fetch_failures_total",
        "Source pages that could not be fetched"
    );
    metrics::describe_counter!(
        "dealcast_link_fallbacks_total",
        "Links posted unconverted after a conversion failure"
    );
    metrics::describe_counter!("dealcast_runs_completed_total", "Pipeline runs that finished");
    metrics::describe_counter!(
        "dealcast_runs_skipped_total",
        "Pipeline runs skipped while another was in progress"
    );
    metrics::describe_histogram!("dealcast_run_duration_seconds", "Wall time of a pipeline run");

    tracing::info!("Metrics exporter listening on {}", address);
    Ok(())
}
