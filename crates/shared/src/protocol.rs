use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ChannelId, GuildId, MessageId, PresenceStatus, UserId},
    error::ProtocolError,
};

/// Every event type the gateway pushes. Envelopes tagged with anything else
/// fail to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    TypingStart,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberJoin,
    MemberLeave,
    PresenceUpdate,
    VoiceStateUpdate,
    LfgCreate,
    LfgUpdate,
    LfgDelete,
}

impl EventKind {
    pub const ALL: [EventKind; 14] = [
        EventKind::MessageCreate,
        EventKind::MessageUpdate,
        EventKind::MessageDelete,
        EventKind::TypingStart,
        EventKind::ChannelCreate,
        EventKind::ChannelUpdate,
        EventKind::ChannelDelete,
        EventKind::MemberJoin,
        EventKind::MemberLeave,
        EventKind::PresenceUpdate,
        EventKind::VoiceStateUpdate,
        EventKind::LfgCreate,
        EventKind::LfgUpdate,
        EventKind::LfgDelete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::MessageCreate => "MESSAGE_CREATE",
            EventKind::MessageUpdate => "MESSAGE_UPDATE",
            EventKind::MessageDelete => "MESSAGE_DELETE",
            EventKind::TypingStart => "TYPING_START",
            EventKind::ChannelCreate => "CHANNEL_CREATE",
            EventKind::ChannelUpdate => "CHANNEL_UPDATE",
            EventKind::ChannelDelete => "CHANNEL_DELETE",
            EventKind::MemberJoin => "MEMBER_JOIN",
            EventKind::MemberLeave => "MEMBER_LEAVE",
            EventKind::PresenceUpdate => "PRESENCE_UPDATE",
            EventKind::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            EventKind::LfgCreate => "LFG_CREATE",
            EventKind::LfgUpdate => "LFG_UPDATE",
            EventKind::LfgDelete => "LFG_DELETE",
        }
    }
}

/// Inbound gateway frame: `{"t": <event type>, "d": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub t: EventKind,
    #[serde(default)]
    pub d: Value,
}

impl InboundEnvelope {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedEnvelope)
    }
}

/// Outbound control frame: `{"op": <operation>, "d": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientOp {
    Subscribe { channel_id: ChannelId },
    Unsubscribe { channel_id: ChannelId },
    SubscribeGuild { guild_id: GuildId },
    Typing { channel_id: ChannelId },
}

impl ClientOp {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

pub fn decode_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ProtocolError> {
    T::deserialize(payload).map_err(|source| ProtocolError::Payload {
        expected: std::any::type_name::<T>(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
    pub me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub user: UserSummary,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeletedPayload {
    pub id: MessageId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStartPayload {
    pub user_id: UserId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: UserId,
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}
