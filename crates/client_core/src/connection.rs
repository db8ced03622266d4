use std::sync::{Arc, Mutex, MutexGuard};

use shared::{
    domain::{ChannelId, GuildId},
    protocol::{ClientOp, InboundEnvelope},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::{redacted, ClientConfig, SessionToken},
    dispatcher::EventDispatcher,
    error::ConnectionError,
    transport::{InboundFrame, OutboundFrame, TransportConnector, TransportLink},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    ReconnectWait,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subscription {
    Channel(ChannelId),
    Guild(GuildId),
}

impl Subscription {
    pub fn subscribe_op(&self) -> ClientOp {
        match self {
            Subscription::Channel(channel_id) => ClientOp::Subscribe {
                channel_id: channel_id.clone(),
            },
            Subscription::Guild(guild_id) => ClientOp::SubscribeGuild {
                guild_id: guild_id.clone(),
            },
        }
    }

    /// The gateway has no guild unsubscribe operation.
    pub fn unsubscribe_op(&self) -> Option<ClientOp> {
        match self {
            Subscription::Channel(channel_id) => Some(ClientOp::Unsubscribe {
                channel_id: channel_id.clone(),
            }),
            Subscription::Guild(_) => None,
        }
    }
}

/// Deduplicated subscriptions in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    entries: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn insert(&mut self, subscription: Subscription) -> bool {
        if self.entries.contains(&subscription) {
            return false;
        }
        self.entries.push(subscription);
        true
    }

    pub fn remove(&mut self, subscription: &Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry != subscription);
        self.entries.len() != before
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.entries.contains(subscription)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct ConnectionInner {
    state: ConnectionState,
    // bumped by connect/disconnect
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    subscriptions: SubscriptionSet,
    driver: Option<JoinHandle<()>>,
}

struct Shared {
    config: ClientConfig,
    token: SessionToken,
    connector: Arc<dyn TransportConnector>,
    dispatcher: EventDispatcher,
    inner: Mutex<ConnectionInner>,
    state_tx: watch::Sender<ConnectionState>,
}

#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        token: SessionToken,
        connector: Arc<dyn TransportConnector>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            shared: Arc::new(Shared {
                config,
                token,
                connector,
                dispatcher,
                inner: Mutex::new(ConnectionInner {
                    state: ConnectionState::Closed,
                    generation: 0,
                    outbound: None,
                    subscriptions: SubscriptionSet::default(),
                    driver: None,
                }),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscriptions(&self) -> SubscriptionSet {
        self.shared.lock().subscriptions.clone()
    }

    pub fn connect(&self) -> Result<(), ConnectionError> {
        self.shared.gateway_url()?;

        let mut inner = self.shared.lock();
        if matches!(
            inner.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return Ok(());
        }
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
        inner.generation += 1;
        let generation = inner.generation;
        self.shared.set_state(&mut inner, ConnectionState::Connecting);
        inner.driver = Some(tokio::spawn(Arc::clone(&self.shared).drive(generation)));
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
        if let Some(outbound) = inner.outbound.take() {
            let _ = outbound.send(OutboundFrame::Close);
        }
        if inner.state != ConnectionState::Closed {
            info!("gateway: disconnected by client");
        }
        self.shared.set_state(&mut inner, ConnectionState::Closed);
    }

    pub fn subscribe(&self, subscription: Subscription) {
        let mut inner = self.shared.lock();
        if inner.subscriptions.insert(subscription.clone()) {
            Shared::send_op(&inner, &subscription.subscribe_op());
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut inner = self.shared.lock();
        if inner.subscriptions.remove(subscription) {
            if let Some(op) = subscription.unsubscribe_op() {
                Shared::send_op(&inner, &op);
            }
        }
    }

    pub fn subscribe_channel(&self, channel_id: ChannelId) {
        self.subscribe(Subscription::Channel(channel_id));
    }

    pub fn unsubscribe_channel(&self, channel_id: ChannelId) {
        self.unsubscribe(&Subscription::Channel(channel_id));
    }

    pub fn subscribe_guild(&self, guild_id: GuildId) {
        self.subscribe(Subscription::Guild(guild_id));
    }

    pub fn unsubscribe_guild(&self, guild_id: GuildId) {
        self.unsubscribe(&Subscription::Guild(guild_id));
    }

    pub fn send_typing(&self, channel_id: &ChannelId) -> bool {
        let inner = self.shared.lock();
        Shared::send_op(
            &inner,
            &ClientOp::Typing {
                channel_id: channel_id.clone(),
            },
        )
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn gateway_url(&self) -> Result<Url, ConnectionError> {
        let token = self.token.get().ok_or(ConnectionError::MissingCredential)?;
        self.config.gateway_url(&token)
    }

    fn set_state(&self, inner: &mut ConnectionInner, state: ConnectionState) {
        if inner.state != state {
            debug!(from = ?inner.state, to = ?state, "gateway: state change");
        }
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    fn send_op(inner: &ConnectionInner, op: &ClientOp) -> bool {
        if inner.state != ConnectionState::Open {
            debug!(?op, "gateway: not open, control message dropped");
            return false;
        }
        let Some(outbound) = inner.outbound.as_ref() else {
            return false;
        };
        match op.encode() {
            Ok(text) => outbound.send(OutboundFrame::Text(text)).is_ok(),
            Err(err) => {
                warn!(error = %err, "gateway: failed to encode control message");
                false
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    async fn drive(self: Arc<Self>, generation: u64) {
        loop {
            let url = match self.gateway_url() {
                Ok(url) => url,
                Err(err) => {
                    warn!(error = %err, "gateway: cannot connect");
                    self.close_if_current(generation);
                    return;
                }
            };

            info!(url = %redacted(&url), "gateway: connecting");
            match self.connector.open(&url).await {
                Ok(TransportLink {
                    outbound,
                    mut inbound,
                }) => {
                    if !self.mark_open(generation, outbound) {
                        return;
                    }
                    self.pump(generation, &mut inbound).await;
                }
                Err(err) => warn!(error = %err, "gateway: connect failed"),
            }

            if !self.enter_reconnect_wait(generation) {
                return;
            }
            tokio::time::sleep(self.config.timings.reconnect_delay).await;
            if !self.resume_connecting(generation) {
                return;
            }
        }
    }

    fn mark_open(&self, generation: u64, outbound: mpsc::UnboundedSender<OutboundFrame>) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            let _ = outbound.send(OutboundFrame::Close);
            return false;
        }
        inner.outbound = Some(outbound);
        self.set_state(&mut inner, ConnectionState::Open);

        let replay: Vec<ClientOp> = inner
            .subscriptions
            .iter()
            .map(Subscription::subscribe_op)
            .collect();
        for op in &replay {
            Shared::send_op(&inner, op);
        }
        info!(replayed = replay.len(), "gateway: open");
        true
    }

    async fn pump(&self, generation: u64, inbound: &mut mpsc::UnboundedReceiver<InboundFrame>) {
        while let Some(frame) = inbound.recv().await {
            if !self.is_current(generation) {
                return;
            }
            match frame {
                InboundFrame::Text(text) => match InboundEnvelope::decode(&text) {
                    Ok(envelope) => {
                        self.dispatcher.dispatch(envelope.t, &envelope.d);
                    }
                    Err(err) => debug!(error = %err, "gateway: dropping undecodable frame"),
                },
                InboundFrame::Error(err) => {
                    warn!(error = %err, "gateway: transport error, forcing close");
                    return;
                }
            }
        }
        info!("gateway: transport closed");
    }

    fn enter_reconnect_wait(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        if let Some(outbound) = inner.outbound.take() {
            let _ = outbound.send(OutboundFrame::Close);
        }
        self.set_state(&mut inner, ConnectionState::ReconnectWait);
        info!(
            delay_ms = self.config.timings.reconnect_delay.as_millis() as u64,
            "gateway: reconnect scheduled"
        );
        true
    }

    fn resume_connecting(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        if !self.token.is_present() {
            info!("gateway: credential gone, not reconnecting");
            inner.driver = None;
            self.set_state(&mut inner, ConnectionState::Closed);
            return false;
        }
        self.set_state(&mut inner, ConnectionState::Connecting);
        true
    }

    fn close_if_current(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.driver = None;
            self.set_state(&mut inner, ConnectionState::Closed);
        }
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
