use crate::models::Listing;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Best-effort forwarding of listings to a message queue
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, listing: &Listing) -> Result<()>;

    fn topic(&self) -> &str;
}

/// Pushes each listing as JSON onto a Redis list named after the topic
pub struct RedisPublisher {
    conn: ConnectionManager,
    topic: String,
}

impl RedisPublisher {
    pub async fn connect(url: &str, topic: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).with_context(|| format!("Invalid queue URL {}", url))?;
        let conn = ConnectionManager::new(client)
            .await
            .with_context(|| format!("Failed to connect to queue at {}", url))?;

        let topic = topic.into();
        info!("Publishing listings to queue topic '{}'", topic);

        Ok(Self { conn, topic })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, listing: &Listing) -> Result<()> {
        let payload = serde_json::to_string(listing).context("Failed to serialize listing")?;

        let mut conn = self.conn.clone();
        let depth: i64 = conn
            .rpush(&self.topic, payload)
            .await
            .with_context(|| format!("Failed to publish listing {} to '{}'", listing.id, self.topic))?;

        debug!("Published listing {} to '{}' ({} queued)", listing.id, self.topic, depth);
        Ok(())
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
