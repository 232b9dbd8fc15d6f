use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::{TargetType, Timeframe};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Serialized BehaviorProfile for one user
    Profile(Uuid),
    /// Trending list for a type filter and timeframe
    Trending(Option<TargetType>, Timeframe),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Profile(user_id) => write!(f, "profile:{}", user_id),
            CacheKey::Trending(target, timeframe) => {
                let target = target.map(|t| t.to_string()).unwrap_or_else(|| "all".to_string());
                write!(f, "trending:{}:{}", target, timeframe)
            }
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Command for the asynchronous cache writer
enum CacheCommand {
    Set { key: String, value: String, ttl: u64 },
    Delete { key: String },
}

/// Cache handler for storing and retrieving data from Redis
///
/// Reads are synchronous against Redis; writes and deletes go through a
/// background task so cache maintenance never blocks a response.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    command_tx: mpsc::UnboundedSender<CacheCommand>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending commands and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, command_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            command_tx,
        };

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Background task that applies cache commands to Redis
    ///
    /// On shutdown signal, drains the remaining queue before exiting.
    async fn cache_writer_task(
        client: Client,
        mut command_rx: mpsc::UnboundedReceiver<CacheCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => {
                    if let Err(e) = Self::apply_command(&client, cmd).await {
                        tracing::error!(error = %e, "Failed to apply cache command");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining commands");

                    while let Ok(cmd) = command_rx.try_recv() {
                        if let Err(e) = Self::apply_command(&client, cmd).await {
                            tracing::error!(error = %e, "Failed to flush cache command during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply_command(client: &Client, cmd: CacheCommand) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match cmd {
            CacheCommand::Set { key, value, ttl } => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            CacheCommand::Delete { key } => {
                let _: () = conn.del(key).await?;
            }
        }
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` on a cache miss.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value in the cache without blocking the caller
    ///
    /// Serialization happens inline; the Redis write is queued to the
    /// background writer.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let cmd = CacheCommand::Set {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.command_tx.send(cmd) {
            tracing::error!(error = %e, "Failed to queue cache write");
        }
    }

    /// Queues deletion of a cached entry; used by profile invalidation
    pub fn delete_in_background(&self, key: &CacheKey) {
        let cmd = CacheCommand::Delete {
            key: format!("{}", key),
        };

        if let Err(e) = self.command_tx.send(cmd) {
            tracing::error!(error = %e, "Failed to queue cache delete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_profile() {
        let id = Uuid::nil();
        let key = CacheKey::Profile(id);
        assert_eq!(
            format!("{}", key),
            "profile:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_cache_key_display_trending_all() {
        let key = CacheKey::Trending(None, Timeframe::SevenDays);
        assert_eq!(format!("{}", key), "trending:all:7d");
    }

    #[test]
    fn test_cache_key_display_trending_typed() {
        let key = CacheKey::Trending(Some(TargetType::Package), Timeframe::ThirtyDays);
        assert_eq!(format!("{}", key), "trending:package:30d");
    }
}
