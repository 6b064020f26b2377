//! Inbox transport interface and an in-memory hub
//!
//! Message bodies are opaque to the transport: senders seal them to the
//! recipient's public key before handing them over.

use crate::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fula_crypto::PublicKey;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A message as stored in an inbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxMessage {
    pub id: String,
    pub from: PublicKey,
    pub to: PublicKey,
    /// Sealed payload
    pub body: Bytes,
    pub created_at: DateTime<Utc>,
}

/// Trait for inbox transports
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Deliver a sealed body to `recipient`
    async fn send_message(&self, recipient: &PublicKey, body: Bytes) -> Result<InboxMessage>;

    /// Up to `limit` messages after `cursor` (a message id), oldest first
    async fn list_inbox_messages(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InboxMessage>>;

    /// Messages arriving from now on
    async fn watch_inbox(&self) -> Result<BoxStream<'static, InboxMessage>>;
}

#[derive(Default)]
struct Inbox {
    messages: Vec<InboxMessage>,
    watchers: Vec<mpsc::UnboundedSender<InboxMessage>>,
}

/// Shared delivery hub; hand out one [`MemoryMailbox`] per user
#[derive(Clone, Default)]
pub struct MemoryMailboxHub {
    inboxes: Arc<DashMap<PublicKey, Mutex<Inbox>>>,
}

impl MemoryMailboxHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox acting as `owner`
    pub fn mailbox_for(&self, owner: PublicKey) -> MemoryMailbox {
        MemoryMailbox {
            hub: self.clone(),
            owner,
        }
    }
}

/// One user's view of a [`MemoryMailboxHub`]
#[derive(Clone)]
pub struct MemoryMailbox {
    hub: MemoryMailboxHub,
    owner: PublicKey,
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn send_message(&self, recipient: &PublicKey, body: Bytes) -> Result<InboxMessage> {
        let message = InboxMessage {
            id: uuid::Uuid::new_v4().to_string(),
            from: self.owner,
            to: *recipient,
            body,
            created_at: Utc::now(),
        };
        let inbox = self.hub.inboxes.entry(*recipient).or_default();
        let mut inbox = inbox.lock();
        inbox
            .watchers
            .retain(|tx| tx.send(message.clone()).is_ok());
        inbox.messages.push(message.clone());
        debug!(to = %recipient, id = %message.id, "message delivered");
        Ok(message)
    }

    async fn list_inbox_messages(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InboxMessage>> {
        let Some(inbox) = self.hub.inboxes.get(&self.owner) else {
            return Ok(Vec::new());
        };
        let inbox = inbox.lock();
        let start = match cursor {
            None => 0,
            Some(id) => {
                inbox
                    .messages
                    .iter()
                    .position(|m| m.id == id)
                    .ok_or_else(|| ClientError::NotFound(format!("inbox cursor {}", id)))?
                    + 1
            }
        };
        Ok(inbox.messages.iter().skip(start).take(limit).cloned().collect())
    }

    async fn watch_inbox(&self) -> Result<BoxStream<'static, InboxMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .inboxes
            .entry(self.owner)
            .or_default()
            .lock()
            .watchers
            .push(tx);
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed())
    }
}
