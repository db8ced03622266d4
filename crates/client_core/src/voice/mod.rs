mod snapshot;

use std::sync::Arc;

use livekit_integration::{
    DisconnectReason, LiveKitRoomConnector, LiveKitRoomEvent, LiveKitRoomOptions,
    LiveKitRoomSession,
};
use serde::Serialize;
use shared::domain::{ChannelId, GuildId};
use tokio::{
    sync::{broadcast::error::RecvError, watch, Mutex, MutexGuard},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub use snapshot::{build_participant_list, VoiceParticipant};

use crate::{
    config::websocket_url,
    control_plane::LiveKitControlPlane,
    error::VoiceSessionError,
    media_settings::{MediaSettings, MediaSettingsStore, MediaSettingsUpdate},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceStateSnapshot {
    pub phase: VoicePhase,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub muted: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    pub deafened: bool,
    pub error: Option<String>,
    pub participants: Vec<VoiceParticipant>,
}

struct VoiceInner {
    // bumped on every join and leave
    epoch: u64,
    state: VoiceStateSnapshot,
    room: Option<Arc<dyn LiveKitRoomSession>>,
    events: Option<JoinHandle<()>>,
}

struct VoiceShared {
    control_plane: Arc<dyn LiveKitControlPlane>,
    connector: Arc<dyn LiveKitRoomConnector>,
    settings: MediaSettingsStore,
    inner: Mutex<VoiceInner>,
    snapshots: watch::Sender<VoiceStateSnapshot>,
}

#[derive(Clone)]
pub struct VoiceSessionManager {
    shared: Arc<VoiceShared>,
}

impl VoiceSessionManager {
    pub fn new(
        control_plane: Arc<dyn LiveKitControlPlane>,
        connector: Arc<dyn LiveKitRoomConnector>,
        settings: MediaSettingsStore,
    ) -> Self {
        let (snapshots, _) = watch::channel(VoiceStateSnapshot::default());
        Self {
            shared: Arc::new(VoiceShared {
                control_plane,
                connector,
                settings,
                inner: Mutex::new(VoiceInner {
                    epoch: 0,
                    state: VoiceStateSnapshot::default(),
                    room: None,
                    events: None,
                }),
                snapshots,
            }),
        }
    }

    pub fn snapshot(&self) -> VoiceStateSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceStateSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn media_settings(&self) -> MediaSettings {
        self.shared.settings.current()
    }

    pub fn update_media_settings(&self, update: MediaSettingsUpdate) -> MediaSettings {
        self.shared.settings.update(update)
    }

    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), VoiceSessionError> {
        self.leave().await;

        let epoch = {
            let mut inner = self.shared.inner.lock().await;
            inner.epoch += 1;
            inner.state = VoiceStateSnapshot {
                phase: VoicePhase::Connecting,
                guild_id: Some(guild_id.clone()),
                channel_id: Some(channel_id.clone()),
                ..VoiceStateSnapshot::default()
            };
            self.shared.publish(&inner);
            inner.epoch
        };
        info!(guild_id = %guild_id, channel_id = %channel_id, "voice: joining");

        let credentials = match self.shared.control_plane.request_livekit_token(&channel_id).await {
            Ok(credentials) => credentials,
            Err(err) => {
                let err = VoiceSessionError::TokenRequest(format!("{err:#}"));
                return Err(self.shared.fail(epoch, err).await);
            }
        };
        if !self.shared.is_current(epoch).await {
            return Err(VoiceSessionError::Superseded);
        }

        let connected = self
            .shared
            .connector
            .connect(LiveKitRoomOptions {
                url: websocket_url(&credentials.server_url),
                token: credentials.access_token,
                adaptive_stream: true,
                dynacast: true,
            })
            .await;
        let room = match connected {
            Ok(room) => room,
            Err(err) => {
                let err = VoiceSessionError::Connect(format!("{err:#}"));
                return Err(self.shared.fail(epoch, err).await);
            }
        };

        {
            let mut inner = self.shared.inner.lock().await;
            if inner.epoch != epoch {
                drop(inner);
                debug!(channel_id = %channel_id, "voice: join superseded after connect");
                disconnect_room(&room).await;
                return Err(VoiceSessionError::Superseded);
            }
            inner.events = Some(Arc::clone(&self.shared).spawn_event_task(epoch, Arc::clone(&room)));
            inner.room = Some(Arc::clone(&room));
        }

        if let Err(err) = room.set_microphone_enabled(true).await {
            let err = VoiceSessionError::Microphone(format!("{err:#}"));
            return Err(self.shared.fail(epoch, err).await);
        }

        let mut inner = self.shared.inner.lock().await;
        if inner.epoch != epoch {
            return Err(VoiceSessionError::Superseded);
        }
        inner.state.phase = VoicePhase::Connected;
        inner.state.muted = false;
        self.shared.rebuild(&mut inner);
        info!(
            guild_id = %guild_id,
            channel_id = %channel_id,
            participants = inner.state.participants.len(),
            "voice: connected"
        );
        Ok(())
    }

    pub async fn leave(&self) {
        let (room, events) = {
            let mut inner = self.shared.inner.lock().await;
            inner.epoch += 1;
            let room = inner.room.take();
            let events = inner.events.take();
            if inner.state != VoiceStateSnapshot::default() {
                inner.state = VoiceStateSnapshot::default();
                self.shared.publish(&inner);
            }
            (room, events)
        };

        if let Some(events) = events {
            events.abort();
        }
        if let Some(room) = room {
            info!("voice: leaving");
            disconnect_room(&room).await;
        }
    }

    pub async fn toggle_mute(&self) {
        let Some((epoch, room, state)) = self.shared.active_room().await else {
            return;
        };
        let enable = state.muted;
        if let Err(err) = room.set_microphone_enabled(enable).await {
            warn!(error = %format!("{err:#}"), "voice: microphone toggle failed");
            return;
        }
        self.shared
            .apply(epoch, |state| state.muted = !enable)
            .await;
    }

    // undeafen keeps the mute
    pub async fn toggle_deafen(&self) {
        let Some((epoch, room, state)) = self.shared.active_room().await else {
            return;
        };

        if state.deafened {
            room.set_remote_audio_attached(true);
            self.shared
                .apply(epoch, |state| state.deafened = false)
                .await;
            return;
        }

        room.set_remote_audio_attached(false);
        if !state.muted {
            if let Err(err) = room.set_microphone_enabled(false).await {
                warn!(error = %format!("{err:#}"), "voice: deafen could not mute microphone");
                room.set_remote_audio_attached(true);
                return;
            }
        }
        self.shared
            .apply(epoch, |state| {
                state.deafened = true;
                state.muted = true;
            })
            .await;
    }

    pub async fn toggle_video(&self) {
        let Some((epoch, room, state)) = self.shared.active_room().await else {
            return;
        };
        let enable = !state.video_enabled;
        let options = enable.then(|| self.shared.settings.current().camera_capture_options());

        if let Err(err) = room.set_camera_enabled(enable, options).await {
            warn!(enable, error = %format!("{err:#}"), "voice: camera toggle failed");
            return;
        }
        if let Some(options) = options {
            debug!(
                width = options.resolution.width,
                height = options.resolution.height,
                codec = ?options.codec,
                "voice: camera published"
            );
        }
        self.shared
            .apply(epoch, |state| state.video_enabled = enable)
            .await;
    }

    pub async fn toggle_screen_share(&self) {
        let Some((epoch, room, state)) = self.shared.active_room().await else {
            return;
        };
        let enable = !state.screen_sharing;
        let options =
            enable.then(|| self.shared.settings.current().screen_share_capture_options());

        if let Err(err) = room.set_screen_share_enabled(enable, options).await {
            warn!(enable, error = %format!("{err:#}"), "voice: screen share toggle failed");
            return;
        }
        self.shared
            .apply(epoch, |state| state.screen_sharing = enable)
            .await;
    }
}

impl VoiceShared {
    fn publish(&self, inner: &VoiceInner) {
        self.snapshots.send_replace(inner.state.clone());
    }

    fn rebuild(&self, inner: &mut MutexGuard<'_, VoiceInner>) {
        inner.state.participants = match inner.room.as_ref() {
            Some(room) => build_participant_list(&room.state()),
            None => Vec::new(),
        };
        self.publish(inner);
    }

    async fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().await.epoch == epoch
    }

    async fn active_room(&self) -> Option<(u64, Arc<dyn LiveKitRoomSession>, VoiceStateSnapshot)> {
        let inner = self.inner.lock().await;
        if inner.state.phase != VoicePhase::Connected {
            return None;
        }
        let room = inner.room.clone()?;
        Some((inner.epoch, room, inner.state.clone()))
    }

    async fn apply(&self, epoch: u64, change: impl FnOnce(&mut VoiceStateSnapshot)) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!("voice: dropping toggle result for a replaced session");
            return;
        }
        change(&mut inner.state);
        self.rebuild(&mut inner);
    }

    async fn fail(&self, epoch: u64, err: VoiceSessionError) -> VoiceSessionError {
        let (room, events) = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch {
                return VoiceSessionError::Superseded;
            }
            let room = inner.room.take();
            let events = inner.events.take();
            inner.state = VoiceStateSnapshot {
                phase: VoicePhase::Error,
                guild_id: inner.state.guild_id.take(),
                channel_id: inner.state.channel_id.take(),
                error: Some(err.to_string()),
                ..VoiceStateSnapshot::default()
            };
            self.publish(&inner);
            (room, events)
        };
        warn!(error = %err, "voice: join failed");

        if let Some(events) = events {
            events.abort();
        }
        if let Some(room) = room {
            disconnect_room(&room).await;
        }
        err
    }

    fn spawn_event_task(
        self: Arc<Self>,
        epoch: u64,
        room: Arc<dyn LiveKitRoomSession>,
    ) -> JoinHandle<()> {
        let mut events = room.subscribe_events();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "voice: room events lagged, rebuilding");
                        None
                    }
                    Err(RecvError::Closed) => {
                        debug!("voice: room event stream closed");
                        Some(LiveKitRoomEvent::Disconnected {
                            reason: DisconnectReason::Unknown,
                        })
                    }
                };

                let mut inner = self.inner.lock().await;
                if inner.epoch != epoch {
                    break;
                }
                if let Some(LiveKitRoomEvent::Disconnected { reason }) = event {
                    inner.epoch += 1;
                    inner.room = None;
                    inner.events = None;
                    inner.state = VoiceStateSnapshot::default();
                    self.publish(&inner);
                    info!(?reason, "voice: room disconnected");
                    break;
                }
                self.rebuild(&mut inner);
            }
        })
    }
}

async fn disconnect_room(room: &Arc<dyn LiveKitRoomSession>) {
    if let Err(err) = room.disconnect().await {
        warn!(error = %format!("{err:#}"), "voice: room disconnect failed");
    }
}

#[cfg(test)]
#[path = "tests/voice_tests.rs"]
mod tests;
