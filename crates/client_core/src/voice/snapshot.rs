use livekit_integration::{ParticipantState, RoomState, TrackSource};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceParticipant {
    pub identity: String,
    pub display_name: String,
    pub is_speaking: bool,
    pub is_muted: bool,
    pub has_video: bool,
    pub is_screen_sharing: bool,
}

/// Rebuilds the renderable participant list from provider state. The local
/// participant comes first, remotes follow in provider order; a remote that
/// reports the local identity is skipped.
pub fn build_participant_list(room: &RoomState) -> Vec<VoiceParticipant> {
    let mut participants = Vec::with_capacity(room.remotes.len() + 1);
    participants.push(participant(&room.local));
    participants.extend(
        room.remotes
            .iter()
            .filter(|remote| remote.identity != room.local.identity)
            .map(participant),
    );
    participants
}

fn participant(state: &ParticipantState) -> VoiceParticipant {
    let display_name = state
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&state.identity)
        .to_string();
    let publishing = |source| state.track(source).is_some_and(|track| !track.muted);

    VoiceParticipant {
        identity: state.identity.clone(),
        display_name,
        is_speaking: state.is_speaking,
        // No microphone publication counts as muted.
        is_muted: !publishing(TrackSource::Microphone),
        has_video: publishing(TrackSource::Camera),
        is_screen_sharing: publishing(TrackSource::ScreenShare),
    }
}

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod tests;
