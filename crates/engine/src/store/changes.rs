//! In-process change feed using tokio broadcast channels.
//!
//! Writers publish a topic after their commit; live queries re-read their
//! full result set on every notification. Because readers always re-read,
//! a lagged receiver loses nothing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::WorkspaceId;

const CHANNEL_CAPACITY: usize = 64;

/// What changed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Transactions(WorkspaceId),
    /// Invitations addressed to an email.
    Invitations(String),
}

#[derive(Clone, Debug, Default)]
pub struct ChangeFeed {
    channels: Arc<DashMap<Topic, broadcast::Sender<()>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifies the live readers of `topic`. A topic whose readers are all
    /// gone is dropped from the feed.
    pub fn publish(&self, topic: &Topic) {
        if let Some(tx) = self.channels.get(topic) {
            // Fails only when nobody listens; pruned below.
            let _ = tx.send(());
        }
        self.channels.remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }

    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<()> {
        self.channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}
