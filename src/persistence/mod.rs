// Position persistence module
// Every lifecycle transition is written here before the in-memory index moves.
pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::execution::Position;
use crate::Result;

/// Durable store for position state
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Persist the position's current state atomically. Terminal positions
    /// are archived, never deleted.
    async fn save_transition(&self, position: &Position) -> Result<()>;

    /// Positions whose state is not terminal, for restart recovery
    async fn load_non_terminal_positions(&self) -> Result<Vec<Position>>;

    async fn load_position(&self, id: Uuid) -> Result<Option<Position>>;
}
