use std::sync::Arc;

use shared::{
    domain::ChannelId,
    protocol::{EventKind, MessageDeletedPayload, MessagePayload},
};
use tokio::sync::watch;
use tracing::trace;

use crate::dispatcher::{Disposer, EventDispatcher};

/// Live message list for one channel, kept current from gateway events.
pub struct ChannelFeed {
    channel_id: ChannelId,
    messages: Arc<watch::Sender<Vec<MessagePayload>>>,
    listeners: Vec<Disposer>,
}

impl ChannelFeed {
    /// `history` is whatever the host already fetched, oldest first.
    pub fn new(
        dispatcher: &EventDispatcher,
        channel_id: ChannelId,
        history: Vec<MessagePayload>,
    ) -> Self {
        let messages = Arc::new(watch::Sender::new(history));

        let created = {
            let (messages, channel_id) = (Arc::clone(&messages), channel_id.clone());
            dispatcher.register_typed(EventKind::MessageCreate, move |message: MessagePayload| {
                if message.channel_id != channel_id {
                    return;
                }
                messages.send_if_modified(|list| {
                    if list.iter().any(|existing| existing.id == message.id) {
                        trace!(message_id = %message.id, "feed: duplicate create ignored");
                        return false;
                    }
                    list.push(message);
                    true
                });
            })
        };

        let updated = {
            let (messages, channel_id) = (Arc::clone(&messages), channel_id.clone());
            dispatcher.register_typed(EventKind::MessageUpdate, move |message: MessagePayload| {
                if message.channel_id != channel_id {
                    return;
                }
                messages.send_if_modified(|list| {
                    match list.iter_mut().find(|existing| existing.id == message.id) {
                        Some(existing) => {
                            *existing = message;
                            true
                        }
                        None => false,
                    }
                });
            })
        };

        let deleted = {
            let (messages, channel_id) = (Arc::clone(&messages), channel_id.clone());
            dispatcher.register_typed(
                EventKind::MessageDelete,
                move |deleted: MessageDeletedPayload| {
                    if deleted.channel_id != channel_id {
                        return;
                    }
                    messages.send_if_modified(|list| {
                        let before = list.len();
                        list.retain(|existing| existing.id != deleted.id);
                        list.len() != before
                    });
                },
            )
        };

        Self {
            channel_id,
            messages,
            listeners: vec![created, updated, deleted],
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn messages(&self) -> Vec<MessagePayload> {
        self.messages.borrow().clone()
    }

    /// Notified after every change to the list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<MessagePayload>> {
        self.messages.subscribe()
    }

    pub fn close(&self) {
        for listener in &self.listeners {
            listener.dispose();
        }
    }
}

impl Drop for ChannelFeed {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
