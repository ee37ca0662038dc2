use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use super::PersistenceStore;
use crate::execution::Position;
use crate::{Result, TradingError};

/// Redis persistence for positions
///
/// Layout (all under `prefix`):
/// - `{prefix}:positions:active`  hash id -> position JSON (non-terminal)
/// - `{prefix}:positions:archive` hash id -> position JSON (terminal)
/// - `{prefix}:transitions`       list of position JSON, append-only
///
/// Each save is a single MULTI/EXEC pipeline.
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `prefix` - Key namespace
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                TradingError::PersistenceFailure(
                    "Redis connection timeout after 5 seconds".to_string(),
                )
            })??;

        tracing::info!("Connected to Redis position store");

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn active_key(&self) -> String {
        format!("{}:positions:active", self.prefix)
    }

    fn archive_key(&self) -> String {
        format!("{}:positions:archive", self.prefix)
    }

    fn transitions_key(&self) -> String {
        format!("{}:transitions", self.prefix)
    }
}

#[async_trait]
impl PersistenceStore for RedisStore {
    async fn save_transition(&self, position: &Position) -> Result<()> {
        let payload = serde_json::to_string(position)?;
        let id = position.id.to_string();
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        if position.state.is_terminal() {
            pipe.hdel(self.active_key(), &id)
                .hset(self.archive_key(), &id, &payload);
        } else {
            pipe.hset(self.active_key(), &id, &payload);
        }
        pipe.rpush(self.transitions_key(), &payload);

        pipe.query_async::<()>(&mut conn).await?;

        tracing::debug!(
            "Saved position {} ({}) as {} to Redis",
            position.id,
            position.symbol,
            position.state.as_str()
        );

        Ok(())
    }

    async fn load_non_terminal_positions(&self) -> Result<Vec<Position>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.hvals(self.active_key()).await?;

        let mut positions = values
            .iter()
            .map(|json| serde_json::from_str::<Position>(json))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        positions.sort_by_key(|p| p.created_at);

        tracing::info!("Loaded {} non-terminal positions from Redis", positions.len());

        Ok(positions)
    }

    async fn load_position(&self, id: Uuid) -> Result<Option<Position>> {
        let mut conn = self.conn.clone();
        let id = id.to_string();

        let active: Option<String> = conn.hget(self.active_key(), &id).await?;
        let json = match active {
            Some(json) => Some(json),
            None => conn.hget(self.archive_key(), &id).await?,
        };

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }
}
