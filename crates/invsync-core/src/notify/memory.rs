// # Memory Notification Channel
//
// In-process queue backed by a `tokio::sync::broadcast` channel.
//
// Consumers call `subscribe()` and read a `Stream` of deliveries. Messages
// published while nobody is subscribed are dropped, the same way an
// unconsumed non-durable queue loses them on restart. Slow subscribers skip
// messages once they fall more than the channel capacity behind.

use async_trait::async_trait;
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::Error;
use crate::config::NotificationConfig;
use crate::traits::notification::{Delivery, NotificationChannel, NotificationChannelFactory};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct MemoryChannel {
    queue: String,
    tx: broadcast::Sender<Delivery>,
}

impl MemoryChannel {
    pub fn new(queue: impl Into<String>) -> Self {
        Self::with_capacity(queue, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(queue: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            queue: queue.into(),
            tx,
        }
    }

    /// Stream of deliveries published after this call
    pub fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Delivery> + Send + 'static>> {
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(|item| match item {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                tracing::warn!("Memory channel subscriber lagged: {}", e);
                None
            }
        });
        Box::pin(stream)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl NotificationChannel for MemoryChannel {
    async fn publish(&self, delivery: &Delivery) -> Result<(), Error> {
        if self.tx.send(delivery.clone()).is_err() {
            tracing::debug!(
                queue = %self.queue,
                correlation = %delivery.correlation,
                "No subscribers, message dropped"
            );
        }
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.queue
    }
}

/// Factory for `{"type": "memory"}`
pub struct MemoryChannelFactory;

#[async_trait]
impl NotificationChannelFactory for MemoryChannelFactory {
    async fn create(
        &self,
        config: &NotificationConfig,
    ) -> Result<Box<dyn NotificationChannel>, Error> {
        match config {
            NotificationConfig::Memory { queue } => Ok(Box::new(MemoryChannel::new(queue.clone()))),
            _ => Err(Error::config("Invalid config for memory notification channel")),
        }
    }
}
