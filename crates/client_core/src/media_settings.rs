use std::{
    ops::RangeInclusive,
    sync::{Arc, RwLock},
};

use livekit_integration::{
    ScreenShareCaptureOptions, VideoCaptureOptions, VideoCodec, VideoResolution,
};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const VIDEO_BITRATE_RANGE: RangeInclusive<u64> = 300_000..=8_000_000;
pub const SCREEN_SHARE_BITRATE_RANGE: RangeInclusive<u64> = 500_000..=15_000_000;
pub const SCREEN_SHARE_FRAMERATE_RANGE: RangeInclusive<u32> = 5..=60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoResolutionPreset {
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "4k")]
    P2160,
}

impl VideoResolutionPreset {
    pub fn dimensions(self) -> VideoResolution {
        match self {
            VideoResolutionPreset::P720 => VideoResolution::H720,
            VideoResolutionPreset::P1080 => VideoResolution::H1080,
            VideoResolutionPreset::P1440 => VideoResolution::H1440,
            VideoResolutionPreset::P2160 => VideoResolution::H2160,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    pub video_codec: VideoCodec,
    pub screen_share_codec: VideoCodec,
    pub video_resolution: VideoResolutionPreset,
    pub video_bitrate: u64,
    pub screen_share_bitrate: u64,
    pub screen_share_framerate: u32,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            video_codec: VideoCodec::Vp9,
            screen_share_codec: VideoCodec::Vp9,
            video_resolution: VideoResolutionPreset::P720,
            video_bitrate: 1_500_000,
            screen_share_bitrate: 3_000_000,
            screen_share_framerate: 30,
        }
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettingsUpdate {
    pub video_codec: Option<VideoCodec>,
    pub screen_share_codec: Option<VideoCodec>,
    pub video_resolution: Option<VideoResolutionPreset>,
    pub video_bitrate: Option<u64>,
    pub screen_share_bitrate: Option<u64>,
    pub screen_share_framerate: Option<u32>,
}

impl MediaSettings {
    /// Merges `update`, clamping numeric values into their allowed ranges.
    pub fn apply(&mut self, update: MediaSettingsUpdate) {
        if let Some(codec) = update.video_codec {
            self.video_codec = codec;
        }
        if let Some(codec) = update.screen_share_codec {
            self.screen_share_codec = codec;
        }
        if let Some(preset) = update.video_resolution {
            self.video_resolution = preset;
        }
        if let Some(bitrate) = update.video_bitrate {
            self.video_bitrate = clamp(bitrate, &VIDEO_BITRATE_RANGE);
        }
        if let Some(bitrate) = update.screen_share_bitrate {
            self.screen_share_bitrate = clamp(bitrate, &SCREEN_SHARE_BITRATE_RANGE);
        }
        if let Some(framerate) = update.screen_share_framerate {
            self.screen_share_framerate = clamp(framerate, &SCREEN_SHARE_FRAMERATE_RANGE);
        }
    }

    pub fn camera_capture_options(&self) -> VideoCaptureOptions {
        VideoCaptureOptions {
            resolution: self.video_resolution.dimensions(),
            codec: self.video_codec,
            max_bitrate: self.video_bitrate,
        }
    }

    /// Screen capture is always 1080p; only the frame rate is configurable.
    pub fn screen_share_capture_options(&self) -> ScreenShareCaptureOptions {
        ScreenShareCaptureOptions {
            resolution: VideoResolution::new(1920, 1080, self.screen_share_framerate),
            capture_audio: true,
            codec: self.screen_share_codec,
            max_bitrate: self.screen_share_bitrate,
        }
    }
}

fn clamp<T: Ord + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    value.clamp(*range.start(), *range.end())
}

/// Shared settings read by the voice session when a capability is enabled.
#[derive(Debug, Clone, Default)]
pub struct MediaSettingsStore {
    inner: Arc<RwLock<MediaSettings>>,
}

impl MediaSettingsStore {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn current(&self) -> MediaSettings {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update(&self, update: MediaSettingsUpdate) -> MediaSettings {
        let mut settings = self.inner.write().unwrap_or_else(|e| e.into_inner());
        settings.apply(update);
        info!(
            video_codec = ?settings.video_codec,
            video_bitrate = %format_bitrate(settings.video_bitrate),
            screen_share_bitrate = %format_bitrate(settings.screen_share_bitrate),
            screen_share_framerate = settings.screen_share_framerate,
            "voice: media settings updated"
        );
        *settings
    }
}

/// `1.5 Mbps`, `800 kbps`.
pub fn format_bitrate(bps: u64) -> String {
    if bps >= 1_000_000 {
        format!("{:.1} Mbps", bps as f64 / 1_000_000.0)
    } else {
        format!("{:.0} kbps", bps as f64 / 1_000.0)
    }
}

#[cfg(test)]
#[path = "tests/media_settings_tests.rs"]
mod tests;
