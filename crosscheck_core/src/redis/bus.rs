//! Pub/sub bus carrying comparison requests in and results/progress out.
//! Publishing shares one connection behind a mutex; each subscriber gets
//! a dedicated connection handed off to its task.

use anyhow::{Context, Result};
use redis::{aio::Connection, AsyncCommands, Client};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: Arc<Mutex<Connection>>,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid redis URL")?;
        let publisher = client
            .get_async_connection()
            .await
            .context("Failed to connect to redis")?;
        Ok(Self {
            client,
            publisher: Arc::new(Mutex::new(publisher)),
        })
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        self.publish_raw(channel, &payload).await
    }

    pub async fn publish_raw(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.publisher.lock().await;
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .with_context(|| format!("Failed to publish to {}", channel))?;
        Ok(())
    }

    pub async fn subscribe(&self, channel: &str) -> Result<redis::aio::PubSub> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(channel).await?;
        Ok(pubsub)
    }
}
