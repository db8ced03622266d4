use super::*;

#[test]
fn defaults_match_the_stock_profile() {
    let settings = MediaSettings::default();
    assert_eq!(settings.video_codec, VideoCodec::Vp9);
    assert_eq!(settings.screen_share_codec, VideoCodec::Vp9);
    assert_eq!(settings.video_resolution, VideoResolutionPreset::P720);
    assert_eq!(settings.video_bitrate, 1_500_000);
    assert_eq!(settings.screen_share_bitrate, 3_000_000);
    assert_eq!(settings.screen_share_framerate, 30);
}

#[test]
fn partial_update_only_touches_given_fields() {
    let store = MediaSettingsStore::default();

    let updated = store.update(MediaSettingsUpdate {
        video_resolution: Some(VideoResolutionPreset::P1440),
        screen_share_codec: Some(VideoCodec::Av1),
        ..MediaSettingsUpdate::default()
    });

    assert_eq!(updated, store.current());
    assert_eq!(updated.video_resolution, VideoResolutionPreset::P1440);
    assert_eq!(updated.screen_share_codec, VideoCodec::Av1);
    assert_eq!(updated.video_codec, VideoCodec::Vp9);
    assert_eq!(updated.video_bitrate, 1_500_000);
}

#[test]
fn numeric_updates_are_clamped() {
    let mut settings = MediaSettings::default();

    settings.apply(MediaSettingsUpdate {
        video_bitrate: Some(50_000_000),
        screen_share_bitrate: Some(1),
        screen_share_framerate: Some(240),
        ..MediaSettingsUpdate::default()
    });
    assert_eq!(settings.video_bitrate, 8_000_000);
    assert_eq!(settings.screen_share_bitrate, 500_000);
    assert_eq!(settings.screen_share_framerate, 60);

    settings.apply(MediaSettingsUpdate {
        video_bitrate: Some(0),
        screen_share_framerate: Some(1),
        ..MediaSettingsUpdate::default()
    });
    assert_eq!(settings.video_bitrate, 300_000);
    assert_eq!(settings.screen_share_framerate, 5);
}

#[test]
fn capture_options_follow_settings() {
    let mut settings = MediaSettings::default();
    settings.apply(MediaSettingsUpdate {
        video_resolution: Some(VideoResolutionPreset::P1080),
        screen_share_framerate: Some(15),
        ..MediaSettingsUpdate::default()
    });

    let camera = settings.camera_capture_options();
    assert_eq!(camera.resolution, VideoResolution::new(1920, 1080, 30));
    assert_eq!(camera.max_bitrate, 1_500_000);

    let screen = settings.screen_share_capture_options();
    assert_eq!(screen.resolution, VideoResolution::new(1920, 1080, 15));
    assert!(screen.capture_audio);
    assert_eq!(screen.max_bitrate, 3_000_000);
}

#[test]
fn presets_use_short_wire_names() {
    assert_eq!(
        serde_json::to_string(&VideoResolutionPreset::P2160).expect("encode"),
        "\"4k\""
    );
    let preset: VideoResolutionPreset = serde_json::from_str("\"1080p\"").expect("decode");
    assert_eq!(preset.dimensions(), VideoResolution::H1080);
}

#[test]
fn bitrates_render_for_humans() {
    assert_eq!(format_bitrate(1_500_000), "1.5 Mbps");
    assert_eq!(format_bitrate(8_000_000), "8.0 Mbps");
    assert_eq!(format_bitrate(800_000), "800 kbps");
    assert_eq!(format_bitrate(300_000), "300 kbps");
}
