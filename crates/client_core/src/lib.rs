use std::sync::Arc;

use livekit_integration::LiveKitRoomConnector;
use shared::{
    domain::{ChannelId, UserId},
    protocol::MessagePayload,
};
use tokio::sync::broadcast;
use tracing::info;

pub mod config;
pub mod connection;
pub mod control_plane;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod media_settings;
pub mod transport;
pub mod typing;
pub mod voice;

pub use config::{ClientConfig, SessionToken, SyncTimings};
pub use connection::{ConnectionManager, ConnectionState, Subscription};
pub use control_plane::{
    HttpControlPlane, LiveKitControlPlane, LiveKitCredentials, MissingLiveKitConnector,
    MissingLiveKitControlPlane,
};
pub use dispatcher::{Disposer, EventDispatcher};
pub use error::{ConnectionError, VoiceSessionError};
pub use feed::ChannelFeed;
pub use media_settings::{MediaSettings, MediaSettingsStore, MediaSettingsUpdate};
pub use transport::{TransportConnector, WsConnector};
pub use typing::{TypingAggregator, TypingDebouncer, TypingUpdate};
pub use voice::{VoicePhase, VoiceSessionManager, VoiceStateSnapshot};

/// Realtime state for one signed-in host session: the gateway connection,
/// its event dispatcher and consumers, and the voice session.
pub struct RealtimeClient {
    config: ClientConfig,
    token: SessionToken,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    typing_debouncer: TypingDebouncer,
    typing: TypingAggregator,
    voice: VoiceSessionManager,
}

impl RealtimeClient {
    /// Production wiring. Voice stays unavailable until a room connector is
    /// injected through [`RealtimeClient::new_with_dependencies`].
    pub fn new(config: ClientConfig, token: SessionToken) -> Arc<Self> {
        let control_plane = Arc::new(HttpControlPlane::new(config.clone(), token.clone()));
        Self::new_with_dependencies(
            config,
            token,
            Arc::new(WsConnector),
            control_plane,
            Arc::new(MissingLiveKitConnector),
        )
    }

    pub fn new_with_dependencies(
        config: ClientConfig,
        token: SessionToken,
        transport: Arc<dyn TransportConnector>,
        livekit_control_plane: Arc<dyn LiveKitControlPlane>,
        livekit_connector: Arc<dyn LiveKitRoomConnector>,
    ) -> Arc<Self> {
        let dispatcher = EventDispatcher::new();
        let connection = ConnectionManager::new(
            config.clone(),
            token.clone(),
            transport,
            dispatcher.clone(),
        );
        let typing_debouncer = TypingDebouncer::new(
            Arc::new(connection.clone()),
            config.timings.typing_send_window,
        );
        let typing = TypingAggregator::new(&dispatcher, config.timings.typing_expiry);
        let voice = VoiceSessionManager::new(
            livekit_control_plane,
            livekit_connector,
            MediaSettingsStore::default(),
        );

        Arc::new(Self {
            config,
            token,
            dispatcher,
            connection,
            typing_debouncer,
            typing,
            voice,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn voice(&self) -> &VoiceSessionManager {
        &self.voice
    }

    pub fn connect(&self) -> Result<(), ConnectionError> {
        self.connection.connect()
    }

    pub fn notify_typing(&self, channel_id: &ChannelId) -> bool {
        self.typing_debouncer.notify_typing(channel_id)
    }

    pub fn typing_users(&self, channel_id: &ChannelId) -> Vec<UserId> {
        self.typing.typing_users(channel_id)
    }

    pub fn typing_updates(&self) -> broadcast::Receiver<TypingUpdate> {
        self.typing.subscribe()
    }

    /// Subscribes to `channel_id` and returns a feed seeded with `history`.
    /// Dropping the feed stops applying events but keeps the subscription.
    pub fn open_channel_feed(
        &self,
        channel_id: ChannelId,
        history: Vec<MessagePayload>,
    ) -> ChannelFeed {
        self.connection.subscribe_channel(channel_id.clone());
        ChannelFeed::new(&self.dispatcher, channel_id, history)
    }

    pub async fn shutdown(&self) {
        info!("realtime client shutting down");
        self.connection.disconnect();
        self.voice.leave().await;
        self.typing.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
