//! Topic-based fan-out from the ingestion pipeline to subscriber connections.
//!
//! Every connection owns a bounded channel; a slow consumer is disconnected
//! rather than allowed to stall delivery to its peers.

#![deny(unsafe_code)]

use dashmap::DashMap;
use emstream_types::{AlertInstance, AnomalyResult, StreamMessage};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Wildcard topic receiving every published event.
pub const TOPIC_ALL: &str = "all";

/// Per-connection channel depth before the subscriber is considered stuck.
pub const DEFAULT_CHANNEL_DEPTH: usize = 256;

/// Event delivered to subscribers, tagged for the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrokerEvent {
    /// A scored reading, with the original message nested alongside its
    /// analysis.
    Reading {
        message: StreamMessage,
        analysis: AnomalyResult,
    },
    /// An alert instance transition.
    Alert { data: AlertInstance },
}

struct Connection {
    sender: mpsc::Sender<BrokerEvent>,
    topics: HashSet<String>,
}

/// Registry of connections and their topic subscriptions.
pub struct SubscriptionBroker {
    connections: DashMap<String, Connection>,
    channel_depth: usize,
}

impl SubscriptionBroker {
    pub fn new(channel_depth: usize) -> Self {
        Self {
            connections: DashMap::new(),
            channel_depth: channel_depth.max(1),
        }
    }

    /// Register a connection and hand back its event receiver. Re-registering
    /// an id replaces the old channel, dropping the previous receiver.
    pub fn register(&self, connection_id: &str) -> mpsc::Receiver<BrokerEvent> {
        let (sender, receiver) = mpsc::channel(self.channel_depth);
        self.connections.insert(
            connection_id.to_string(),
            Connection {
                sender,
                topics: HashSet::new(),
            },
        );
        tracing::debug!(connection_id, "connection registered");
        receiver
    }

    /// Subscribe a connection to a topic. Unknown connections are ignored.
    pub fn subscribe(&self, connection_id: &str, topic: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut connection) => {
                connection.topics.insert(topic.to_string());
                tracing::debug!(connection_id, topic, "subscribed");
                true
            }
            None => false,
        }
    }

    /// Drop one topic subscription. Idempotent.
    pub fn unsubscribe(&self, connection_id: &str, topic: &str) {
        if let Some(mut connection) = self.connections.get_mut(connection_id) {
            connection.topics.remove(topic);
            tracing::debug!(connection_id, topic, "unsubscribed");
        }
    }

    /// Remove a connection and all of its subscriptions. Idempotent.
    pub fn disconnect(&self, connection_id: &str) {
        if self.connections.remove(connection_id).is_some() {
            tracing::debug!(connection_id, "connection removed");
        }
    }

    /// Deliver an event to every subscriber of `topic` plus the `all`
    /// wildcard. Publishing on the `all` topic itself reaches every
    /// registered connection regardless of its subscriptions. Subscribers
    /// with a full or closed channel are disconnected.
    pub fn broadcast(&self, topic: &str, event: &BrokerEvent) {
        let to_everyone = topic == TOPIC_ALL;
        let mut stuck = Vec::new();
        for entry in self.connections.iter() {
            let connection = entry.value();
            if !to_everyone
                && !connection.topics.contains(topic)
                && !connection.topics.contains(TOPIC_ALL)
            {
                continue;
            }
            match connection.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %entry.key(), "subscriber channel full, dropping connection");
                    stuck.push(entry.key().clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stuck.push(entry.key().clone());
                }
            }
        }
        for connection_id in stuck {
            self.disconnect(&connection_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections subscribed to `topic` (wildcard included).
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.connections
            .iter()
            .filter(|entry| {
                entry.value().topics.contains(topic) || entry.value().topics.contains(TOPIC_ALL)
            })
            .count()
    }

    /// Topics a connection currently holds, for confirmation replies.
    pub fn topics_of(&self, connection_id: &str) -> Vec<String> {
        self.connections
            .get(connection_id)
            .map(|connection| {
                let mut topics: Vec<String> = connection.topics.iter().cloned().collect();
                topics.sort();
                topics
            })
            .unwrap_or_default()
    }
}

impl Default for SubscriptionBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_DEPTH)
    }
}
