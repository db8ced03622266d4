use crate::{
    domain::{ChannelId, GuildId, UserId},
    protocol::{
        decode_payload, ClientOp, EventKind, InboundEnvelope, MessageDeletedPayload,
        MessagePayload, TypingStartPayload,
    },
};
use serde_json::json;

#[test]
fn event_kind_tags_match_wire_names() {
    for kind in EventKind::ALL {
        let encoded = serde_json::to_value(kind).expect("encode kind");
        assert_eq!(encoded, json!(kind.as_str()));
    }
}

#[test]
fn decodes_typing_start_envelope() {
    let envelope = InboundEnvelope::decode(
        r#"{"t":"TYPING_START","d":{"user_id":"u1","channel_id":"c1"}}"#,
    )
    .expect("decode");
    assert_eq!(envelope.t, EventKind::TypingStart);

    let payload: TypingStartPayload = decode_payload(&envelope.d).expect("payload");
    assert_eq!(payload.user_id, UserId::new("u1"));
    assert_eq!(payload.channel_id, ChannelId::new("c1"));
}

#[test]
fn envelope_without_payload_defaults_to_null() {
    let envelope = InboundEnvelope::decode(r#"{"t":"MEMBER_LEAVE"}"#).expect("decode");
    assert_eq!(envelope.t, EventKind::MemberLeave);
    assert!(envelope.d.is_null());
}

#[test]
fn rejects_unknown_event_type_and_garbage() {
    assert!(InboundEnvelope::decode(r#"{"t":"SOMETHING_NEW","d":{}}"#).is_err());
    assert!(InboundEnvelope::decode("not json").is_err());
    assert!(InboundEnvelope::decode(r#"{"d":{}}"#).is_err());
}

#[test]
fn client_ops_use_op_and_d_fields() {
    let subscribe = ClientOp::Subscribe {
        channel_id: ChannelId::new("c1"),
    };
    assert_eq!(
        serde_json::to_value(&subscribe).expect("encode"),
        json!({"op": "SUBSCRIBE", "d": {"channel_id": "c1"}})
    );

    let guild = ClientOp::SubscribeGuild {
        guild_id: GuildId::new("g1"),
    };
    assert_eq!(
        serde_json::to_value(&guild).expect("encode"),
        json!({"op": "SUBSCRIBE_GUILD", "d": {"guild_id": "g1"}})
    );

    let typing = ClientOp::Typing {
        channel_id: ChannelId::new("c9"),
    };
    let text = typing.encode().expect("encode");
    let parsed: ClientOp = serde_json::from_str(&text).expect("parse back");
    assert_eq!(parsed, typing);
}

#[test]
fn message_payload_ignores_unknown_user_fields() {
    let payload = json!({
        "id": "m1",
        "channel_id": "c1",
        "content": "hello",
        "attachment_url": null,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": null,
        "user": {
            "id": "u1",
            "username": "alice",
            "email": "alice@example.com",
            "avatar_url": null,
            "created_at": "2024-01-01T00:00:00Z"
        },
        "reactions": [{"emoji": "+1", "count": 2, "me": true}]
    });

    let message: MessagePayload = decode_payload(&payload).expect("message");
    assert_eq!(message.user.username, "alice");
    assert_eq!(message.reactions.len(), 1);
    assert!(message.updated_at.is_none());
}

#[test]
fn payload_mismatch_names_expected_type() {
    let err = decode_payload::<MessageDeletedPayload>(&json!({"id": 5}))
        .expect_err("must fail");
    assert!(err.to_string().contains("MessageDeletedPayload"));
}
