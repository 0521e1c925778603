//! Fan-out of live events to subscribers.
//!
//! Each subscriber owns a bounded queue. Delivery is a non-blocking
//! `try_send`: a subscriber whose queue is full or closed is dropped from
//! the registry instead of slowing the publisher or anyone else, and the
//! rest are told it left. Dropping a subscriber closes its queue. The
//! registry lock is held only to copy senders out or to insert/remove.

use std::collections::HashMap;

use chrono::Utc;
use integrisense_core::classification::ClassificationResult;
use integrisense_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::message::{LiveEvent, Outbound};

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber {
    sender: mpsc::Sender<Outbound>,
    connected_at: Timestamp,
}

/// A registered delivery channel.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Outbound>,
}

/// Registry of live subscribers.
///
/// Designed to be wrapped in `Arc` and shared across the application.
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber.
    ///
    /// The new subscriber gets a `status` acknowledgment first; everyone,
    /// including it, then gets a `status` announcing the join.
    pub async fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.buffer);

        let ack = LiveEvent::new(
            integrisense_core::event_names::EVENT_STATUS,
            serde_json::json!({ "message": "Connected", "subscriber_id": id }),
        );
        let _ = sender.try_send(Outbound::Event(ack.to_text()));

        let count = {
            let mut subs = self.subscribers.write().await;
            subs.insert(
                id,
                Subscriber {
                    sender,
                    connected_at: Utc::now(),
                },
            );
            subs.len()
        };

        tracing::info!(subscriber_id = %id, subscribers = count, "Subscriber connected");
        self.broadcast_event(&LiveEvent::status("Subscriber connected", count))
            .await;

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        let (removed, count) = {
            let mut subs = self.subscribers.write().await;
            let removed = subs.remove(&id);
            (removed, subs.len())
        };

        let Some(sub) = removed else {
            return false;
        };

        let connected_secs = (Utc::now() - sub.connected_at).num_seconds();
        tracing::info!(
            subscriber_id = %id,
            subscribers = count,
            connected_secs,
            "Subscriber disconnected"
        );
        self.broadcast_event(&LiveEvent::status("Subscriber disconnected", count))
            .await;
        true
    }

    /// Deliver a classified reading as a `stream` event.
    ///
    /// Returns the number of subscribers it was queued for.
    pub async fn publish(&self, result: &ClassificationResult) -> usize {
        self.broadcast_event(&LiveEvent::stream(&result.payload()))
            .await
    }

    /// Deliver any event to every subscriber.
    pub async fn broadcast_event(&self, event: &LiveEvent) -> usize {
        self.deliver_all(Outbound::Event(event.to_text())).await
    }

    /// Deliver an event to one subscriber.
    pub async fn send_to(&self, id: Uuid, event: &LiveEvent) -> bool {
        let sender = {
            let subs = self.subscribers.read().await;
            match subs.get(&id) {
                Some(sub) => sub.sender.clone(),
                None => return false,
            }
        };

        if sender.try_send(Outbound::Event(event.to_text())).is_ok() {
            true
        } else {
            self.drop_subscribers(vec![id]).await;
            false
        }
    }

    /// Queue a liveness ping for every subscriber.
    pub async fn ping_all(&self) {
        self.deliver_all(Outbound::Ping).await;
    }

    /// Send `Close` to every subscriber and clear the registry.
    pub async fn shutdown_all(&self) {
        let mut subs = self.subscribers.write().await;
        let count = subs.len();
        for sub in subs.values() {
            let _ = sub.sender.try_send(Outbound::Close);
        }
        subs.clear();
        tracing::info!(count, "Closed all subscribers");
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    // ---- private helpers ----

    async fn deliver_all(&self, message: Outbound) -> usize {
        let (delivered, dead) = self.try_deliver(&message).await;
        self.drop_subscribers(dead).await;
        delivered
    }

    /// Queue `message` for every subscriber without waiting. Returns the
    /// delivered count and the ids whose queue was full or closed.
    async fn try_deliver(&self, message: &Outbound) -> (usize, Vec<Uuid>) {
        let targets: Vec<(Uuid, mpsc::Sender<Outbound>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(id, sub)| (*id, sub.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = %id, "Subscriber queue full, dropping subscriber");
                    dead.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %id, "Subscriber channel closed");
                    dead.push(id);
                }
            }
        }
        (delivered, dead)
    }

    /// Remove `dead` and announce the departure to whoever is left. The
    /// announcement can itself find dead subscribers, so repeat until a
    /// round removes nobody.
    async fn drop_subscribers(&self, mut dead: Vec<Uuid>) {
        while !dead.is_empty() {
            let (removed, count) = {
                let mut subs = self.subscribers.write().await;
                let removed = dead.iter().filter(|id| subs.remove(id).is_some()).count();
                (removed, subs.len())
            };
            if removed == 0 {
                return;
            }

            tracing::info!(dropped = removed, subscribers = count, "Subscriber disconnected");
            let notice = Outbound::Event(
                LiveEvent::status("Subscriber disconnected", count).to_text(),
            );
            dead = self.try_deliver(&notice).await.1;
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
