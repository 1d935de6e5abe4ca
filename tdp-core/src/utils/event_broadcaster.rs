use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Keyed fan-out of events to any number of subscribers.
///
/// Each key owns a `tokio::sync::broadcast` channel that is created on first
/// use. Besides the channel, the broadcaster remembers the last event published
/// per key so a subscriber attaching late can catch up before it starts
/// receiving live events.
///
/// # Examples
///
/// ```rust,no_run
/// use tdp::utils::EventBroadcaster;
///
/// # async fn example() {
/// let broadcaster = EventBroadcaster::<String, u8>::new(64);
///
/// let (latest, mut receiver) = broadcaster.subscribe("task-1".to_string()).await;
/// assert!(latest.is_none());
///
/// broadcaster.publish("task-1".to_string(), 10).await;
/// assert_eq!(receiver.recv().await.ok(), Some(10));
///
/// broadcaster.close(&"task-1".to_string()).await;
/// # }
/// ```
pub struct EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    channels: Arc<RwLock<HashMap<K, Channel<V>>>>,
    buffer_size: usize,
}

struct Channel<V> {
    sender: broadcast::Sender<V>,
    latest: Option<V>,
}

impl<K, V> EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `buffer_size` events are queued per key before slow subscribers lag.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Attach to a key, returning the last published event (if any) and a
    /// receiver for everything published afterwards.
    ///
    /// Both are taken under the same lock so no event falls between them.
    pub async fn subscribe(&self, key: K) -> (Option<V>, broadcast::Receiver<V>) {
        let mut channels = self.channels.write().await;
        let channel = channels.entry(key).or_insert_with(|| Channel {
            sender: broadcast::channel(self.buffer_size).0,
            latest: None,
        });
        (channel.latest.clone(), channel.sender.subscribe())
    }

    /// Publish an event and record it as the latest for the key.
    ///
    /// Returns the number of receivers reached; 0 when nobody listens, which
    /// is not an error.
    pub async fn publish(&self, key: K, event: V) -> usize {
        let mut channels = self.channels.write().await;
        let channel = channels.entry(key).or_insert_with(|| Channel {
            sender: broadcast::channel(self.buffer_size).0,
            latest: None,
        });
        channel.latest = Some(event.clone());
        channel.sender.send(event).unwrap_or(0)
    }

    /// Last event published for a key, if the channel is still open.
    pub async fn latest(&self, key: &K) -> Option<V> {
        let channels = self.channels.read().await;
        channels.get(key).and_then(|channel| channel.latest.clone())
    }

    /// Tear down a key's channel. Receivers observe `RecvError::Closed` once
    /// they have drained buffered events.
    pub async fn close(&self, key: &K) -> bool {
        let mut channels = self.channels.write().await;
        channels.remove(key).is_some()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl<K, V> Clone for EventBroadcaster<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            buffer_size: self.buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let broadcaster = EventBroadcaster::<i32, String>::new(10);

        let (latest, mut receiver) = broadcaster.subscribe(1).await;
        assert!(latest.is_none());

        assert_eq!(broadcaster.publish(1, "checkpoint".to_string()).await, 1);
        assert_eq!(receiver.recv().await.unwrap(), "checkpoint");
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest() {
        let broadcaster = EventBroadcaster::<String, u8>::new(10);

        broadcaster.publish("task".to_string(), 20).await;
        broadcaster.publish("task".to_string(), 30).await;

        let (latest, mut receiver) = broadcaster.subscribe("task".to_string()).await;
        assert_eq!(latest, Some(30));

        broadcaster.publish("task".to_string(), 40).await;
        assert_eq!(receiver.recv().await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_publish_without_receivers() {
        let broadcaster = EventBroadcaster::<i32, String>::new(10);
        assert_eq!(broadcaster.publish(1, "nobody".to_string()).await, 0);
        assert_eq!(broadcaster.latest(&1).await.as_deref(), Some("nobody"));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let broadcaster = EventBroadcaster::<i32, i32>::new(10);
        let (_, mut receiver) = broadcaster.subscribe(7).await;

        broadcaster.publish(7, 100).await;
        assert!(broadcaster.close(&7).await);

        assert_eq!(receiver.recv().await.unwrap(), 100);
        assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
        assert_eq!(broadcaster.channel_count().await, 0);
        assert!(broadcaster.latest(&7).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let broadcaster = Arc::new(EventBroadcaster::<i32, i32>::new(100));
        let mut handles = vec![];

        for i in 0..10 {
            let bc = Arc::clone(&broadcaster);
            handles.push(tokio::spawn(async move {
                let (_, mut receiver) = bc.subscribe(i % 3).await;
                bc.publish(i % 3, i).await;
                receiver.recv().await.ok()
            }));
        }

        for handle in handles {
            assert!(handle.await.is_ok());
        }
    }
}
