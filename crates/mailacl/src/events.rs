//! Change notifications for committed ACL updates.

use async_trait::async_trait;
use tokio::sync::broadcast;

use mailacl_core::{AclDiff, MailboxId};

/// Emitted once per successful `update_acl`, after the rights index was
/// updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclChangedEvent {
    pub mailbox_id: MailboxId,
    /// Version of the record the update committed.
    pub version: u64,
    pub diff: AclDiff,
}

/// Receives [`AclChangedEvent`]s.
///
/// Listeners run after the write committed. A failing listener is logged and
/// skipped; it cannot undo the update or stop later listeners.
#[async_trait]
pub trait AclListener: Send + Sync {
    async fn on_acl_changed(&self, event: &AclChangedEvent) -> anyhow::Result<()>;
}

/// Fans events out over a `tokio::sync::broadcast` channel.
///
/// Slow subscribers lag and lose the oldest events; the channel never blocks
/// the writer.
#[derive(Debug, Clone)]
pub struct BroadcastListener {
    sender: broadcast::Sender<AclChangedEvent>,
}

impl BroadcastListener {
    /// Create a listener buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AclChangedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl AclListener for BroadcastListener {
    async fn on_acl_changed(&self, event: &AclChangedEvent) -> anyhow::Result<()> {
        // Err only means nobody is subscribed right now.
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!(mailbox = %event.mailbox_id, "no ACL event subscribers");
        }
        Ok(())
    }
}
