use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use shared::{
    domain::{ChannelId, UserId},
    protocol::{EventKind, TypingStartPayload},
};
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};
use tracing::{debug, trace, warn};

use crate::{
    connection::ConnectionManager,
    dispatcher::{Disposer, EventDispatcher},
};

pub trait TypingSink: Send + Sync {
    /// Returns whether the signal actually left the client.
    fn send_typing(&self, channel_id: &ChannelId) -> bool;
}

impl TypingSink for ConnectionManager {
    fn send_typing(&self, channel_id: &ChannelId) -> bool {
        ConnectionManager::send_typing(self, channel_id)
    }
}

pub struct TypingDebouncer {
    sink: Arc<dyn TypingSink>,
    window: Duration,
    windows: Mutex<HashMap<ChannelId, Instant>>,
}

impl TypingDebouncer {
    pub fn new(sink: Arc<dyn TypingSink>, window: Duration) -> Self {
        Self {
            sink,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// A signal the sink dropped does not open a window.
    pub fn notify_typing(&self, channel_id: &ChannelId) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(until) = windows.get(channel_id) {
            if now < *until {
                trace!(channel_id = %channel_id, "typing: suppressed inside window");
                return false;
            }
        }

        let sent = self.sink.send_typing(channel_id);
        if sent {
            windows.insert(channel_id.clone(), now + self.window);
        } else {
            windows.remove(channel_id);
        }
        sent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUpdate {
    pub channel_id: ChannelId,
    /// Sorted by user id.
    pub users: Vec<UserId>,
}

struct TypingEntry {
    seq: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct AggregatorInner {
    next_seq: u64,
    channels: HashMap<ChannelId, BTreeMap<UserId, TypingEntry>>,
}

struct AggregatorShared {
    expiry: Duration,
    inner: Mutex<AggregatorInner>,
    updates: broadcast::Sender<TypingUpdate>,
}

pub struct TypingAggregator {
    shared: Arc<AggregatorShared>,
    listener: Disposer,
}

impl TypingAggregator {
    pub fn new(dispatcher: &EventDispatcher, expiry: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        let shared = Arc::new(AggregatorShared {
            expiry,
            inner: Mutex::new(AggregatorInner::default()),
            updates,
        });
        let for_listener = Arc::clone(&shared);
        let listener = dispatcher.register_typed(
            EventKind::TypingStart,
            move |payload: TypingStartPayload| for_listener.record(payload),
        );
        Self { shared, listener }
    }

    pub fn typing_users(&self, channel_id: &ChannelId) -> Vec<UserId> {
        let inner = self.shared.lock();
        AggregatorShared::users_in(&inner, channel_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TypingUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn shutdown(&self) {
        self.listener.dispose();
        let mut inner = self.shared.lock();
        for (_, users) in inner.channels.drain() {
            for (_, entry) in users {
                entry.timer.abort();
            }
        }
    }
}

impl Drop for TypingAggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AggregatorShared {
    fn lock(&self) -> MutexGuard<'_, AggregatorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn users_in(inner: &AggregatorInner, channel_id: &ChannelId) -> Vec<UserId> {
        inner
            .channels
            .get(channel_id)
            .map(|users| users.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn record(self: &Arc<Self>, payload: TypingStartPayload) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("typing: no runtime available for expiry timer");
            return;
        };
        let TypingStartPayload {
            user_id,
            channel_id,
        } = payload;

        let update = {
            let mut inner = self.lock();
            inner.next_seq += 1;
            let seq = inner.next_seq;

            let shared = Arc::clone(self);
            let (timer_channel, timer_user) = (channel_id.clone(), user_id.clone());
            let expiry = self.expiry;
            let timer = runtime.spawn(async move {
                tokio::time::sleep(expiry).await;
                shared.expire(&timer_channel, &timer_user, seq);
            });

            let previous = inner
                .channels
                .entry(channel_id.clone())
                .or_default()
                .insert(user_id.clone(), TypingEntry { seq, timer });
            if let Some(previous) = previous {
                previous.timer.abort();
            }
            TypingUpdate {
                users: Self::users_in(&inner, &channel_id),
                channel_id,
            }
        };
        debug!(channel_id = %update.channel_id, user_id = %user_id, "typing: started");
        let _ = self.updates.send(update);
    }

    fn expire(&self, channel_id: &ChannelId, user_id: &UserId, seq: u64) {
        let update = {
            let mut inner = self.lock();
            let Some(users) = inner.channels.get_mut(channel_id) else {
                return;
            };
            if users.get(user_id).map(|entry| entry.seq) != Some(seq) {
                return;
            }
            users.remove(user_id);
            if users.is_empty() {
                inner.channels.remove(channel_id);
            }
            TypingUpdate {
                channel_id: channel_id.clone(),
                users: Self::users_in(&inner, channel_id),
            }
        };
        debug!(channel_id = %channel_id, user_id = %user_id, "typing: expired");
        let _ = self.updates.send(update);
    }
}

#[cfg(test)]
#[path = "tests/typing_tests.rs"]
mod tests;
