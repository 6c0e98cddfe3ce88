pub mod models;
pub mod seed;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // Ensure the data directory exists
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if !path.is_empty() && !path.contains(":memory:") {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database. The connection is never recycled,
    /// since dropping it would drop the whole database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        self.create_indexes().await;
        Ok(())
    }

    // Indexes are idempotent, so a concurrent boot racing us here is harmless.
    async fn create_indexes(&self) {
        const INDEXES: [&str; 2] = [
            "CREATE INDEX IF NOT EXISTS idx_comments_parent_id ON comments(parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_created_at ON comments(created_at ASC)",
        ];

        for sql in INDEXES {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                tracing::warn!("index creation skipped: {e}");
            }
        }
    }
}
