use crate::error::{AppError, AppResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id          UUID PRIMARY KEY,
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    body        TEXT NOT NULL,
    timestamp   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_messages_sender_ts ON messages (sender_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_receiver_ts ON messages (receiver_id, timestamp);
"#;

/// Build the connection pool. Connections are opened lazily on first use.
pub fn init_pool(database_url: &str, max_connections: usize) -> AppResult<Pool> {
    let pg_config: PgConfig = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);

    Pool::builder(mgr)
        .max_size(max_connections)
        .build()
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))
}

/// Create the `messages` table and its lookup indexes if missing.
pub async fn ensure_schema(pool: &Pool) -> AppResult<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("Message schema ready");
    Ok(())
}
