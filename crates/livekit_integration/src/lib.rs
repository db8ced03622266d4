use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveKitRoomOptions {
    pub url: String,
    pub token: String,
    pub adaptive_stream: bool,
    pub dynacast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    ScreenShareAudio,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    Av1,
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl VideoResolution {
    pub const H720: Self = Self::new(1280, 720, 30);
    pub const H1080: Self = Self::new(1920, 1080, 30);
    pub const H1440: Self = Self::new(2560, 1440, 30);
    pub const H2160: Self = Self::new(3840, 2160, 30);

    pub const fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCaptureOptions {
    pub resolution: VideoResolution,
    pub codec: VideoCodec,
    pub max_bitrate: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenShareCaptureOptions {
    pub resolution: VideoResolution,
    pub capture_audio: bool,
    pub codec: VideoCodec,
    pub max_bitrate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPublicationState {
    pub sid: String,
    pub source: TrackSource,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantState {
    pub identity: String,
    pub name: Option<String>,
    pub is_speaking: bool,
    pub tracks: Vec<TrackPublicationState>,
}

impl ParticipantState {
    /// First publication for `source`, matching how the SDK resolves a
    /// participant's track by source.
    pub fn track(&self, source: TrackSource) -> Option<&TrackPublicationState> {
        self.tracks.iter().find(|track| track.source == source)
    }
}

/// Provider-side view of a room at one instant. Remote participants are kept
/// in the order the provider reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    pub local: ParticipantState,
    pub remotes: Vec<ParticipantState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    ClientInitiated,
    ServerShutdown,
    ParticipantRemoved,
    RoomDeleted,
    SignalLost,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveKitRoomEvent {
    ParticipantConnected { identity: String },
    ParticipantDisconnected { identity: String },
    TrackSubscribed { identity: String, source: TrackSource },
    TrackUnsubscribed { identity: String, source: TrackSource },
    TrackMuted { identity: String, source: TrackSource },
    TrackUnmuted { identity: String, source: TrackSource },
    ActiveSpeakersChanged { speakers: Vec<String> },
    LocalTrackPublished { source: TrackSource },
    LocalTrackUnpublished { source: TrackSource },
    Disconnected { reason: DisconnectReason },
}

#[async_trait]
pub trait LiveKitRoomSession: Send + Sync {
    async fn set_microphone_enabled(&self, enabled: bool) -> anyhow::Result<()>;
    async fn set_camera_enabled(
        &self,
        enabled: bool,
        options: Option<VideoCaptureOptions>,
    ) -> anyhow::Result<()>;
    async fn set_screen_share_enabled(
        &self,
        enabled: bool,
        options: Option<ScreenShareCaptureOptions>,
    ) -> anyhow::Result<()>;
    /// Detach (`false`) or reattach (`true`) every remote audio track from
    /// local playback.
    fn set_remote_audio_attached(&self, attached: bool);
    fn state(&self) -> RoomState;
    async fn disconnect(&self) -> anyhow::Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<LiveKitRoomEvent>;
}

#[async_trait]
pub trait LiveKitRoomConnector: Send + Sync {
    async fn connect(
        &self,
        options: LiveKitRoomOptions,
    ) -> anyhow::Result<Arc<dyn LiveKitRoomSession>>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
