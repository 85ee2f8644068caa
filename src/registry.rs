use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::models::Source;
use crate::utils::error::Result;

/// Durable, insert-only set of source URLs.
///
/// Inserts are idempotent and there is no update or delete, so concurrent
/// readers and writers need no coordination beyond SQLite's own.
#[derive(Clone)]
pub struct SourceRegistry {
    pool: SqlitePool,
}

impl SourceRegistry {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Registry backed by a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is its own database, so pin to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Inserts `url` unless already present. Returns whether a row was added.
    pub async fn add(&self, url: &str) -> Result<bool> {
        let source = Source::parse(url)?;

        let result = sqlx::query("INSERT OR IGNORE INTO sources (url) VALUES (?)")
            .bind(&source.url)
            .execute(&self.pool)
            .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::info!("Registered source {}", source.url);
        } else {
            tracing::debug!("Source {} already registered", source.url);
        }

        Ok(inserted)
    }

    /// All sources in insertion order.
    pub async fn list(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>("SELECT url FROM sources ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        Ok(sources)
    }

    /// Adds every non-blank entry of `urls`. Returns how many were new.
    pub async fn seed<I, S>(&self, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for url in urls {
            let url = url.as_ref();
            if url.trim().is_empty() {
                continue;
            }
            if self.add(url).await? {
                added += 1;
            }
        }

        Ok(added)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
