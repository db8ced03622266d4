use super::*;
use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::Mutex};

const DELETE_EVENT: &str = r#"{"t":"MESSAGE_DELETE","d":{"id":"m1","channel_id":"c1"}}"#;

#[derive(Clone, Copy, PartialEq, Eq)]
enum PeerBehaviour {
    Echo,
    CloseImmediately,
    Silent,
}

#[derive(Clone)]
struct GatewayState {
    tokens: Arc<Mutex<Vec<String>>>,
    received: mpsc::UnboundedSender<String>,
    behaviour: PeerBehaviour,
}

async fn gateway(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<GatewayState>,
) -> Response {
    if let Some(token) = params.get("token") {
        state.tokens.lock().await.push(token.clone());
    }
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: GatewayState) {
    match state.behaviour {
        PeerBehaviour::Echo => {}
        PeerBehaviour::CloseImmediately => {
            let _ = socket.send(AxumMessage::Close(None)).await;
            return;
        }
        PeerBehaviour::Silent => {
            // Never reads, so a close from the client goes unanswered.
            std::future::pending::<()>().await;
            drop(socket);
            return;
        }
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let AxumMessage::Text(text) = msg {
            let _ = state.received.send(text);
            if socket
                .send(AxumMessage::Text(DELETE_EVENT.to_string()))
                .await
                .is_err()
            {
                break;
            }
        }
    }
}

async fn spawn_gateway(
    behaviour: PeerBehaviour,
) -> (Url, Arc<Mutex<Vec<String>>>, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (received, received_rx) = mpsc::unbounded_channel();
    let state = GatewayState {
        tokens: Arc::new(Mutex::new(Vec::new())),
        received,
        behaviour,
    };
    let tokens = Arc::clone(&state.tokens);
    let app = Router::new().route("/ws", get(gateway)).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("ws://{addr}/ws?token=bearer-1")).expect("url");
    (url, tokens, received_rx)
}

#[tokio::test]
async fn websocket_link_carries_frames_both_ways() {
    let (url, tokens, mut received) = spawn_gateway(PeerBehaviour::Echo).await;

    let mut link = WsConnector.open(&url).await.expect("open");
    link.outbound
        .send(OutboundFrame::Text(
            r#"{"op":"SUBSCRIBE","d":{"channel_id":"c1"}}"#.to_string(),
        ))
        .expect("queue frame");

    let seen = received.recv().await.expect("server received frame");
    assert_eq!(seen, r#"{"op":"SUBSCRIBE","d":{"channel_id":"c1"}}"#);

    let frame = link.inbound.recv().await.expect("inbound frame");
    assert_eq!(frame, InboundFrame::Text(DELETE_EVENT.to_string()));
    assert_eq!(*tokens.lock().await, vec!["bearer-1".to_string()]);

    link.outbound.send(OutboundFrame::Close).expect("close");
}

#[tokio::test]
async fn server_close_ends_inbound_stream() {
    let (url, _tokens, _received) = spawn_gateway(PeerBehaviour::CloseImmediately).await;

    let mut link = WsConnector.open(&url).await.expect("open");

    while let Some(frame) = link.inbound.recv().await {
        assert!(
            !matches!(frame, InboundFrame::Text(_)),
            "no text expected from a closing server"
        );
    }
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws?token=secret")).expect("url");
    let err = match WsConnector.open(&url).await {
        Ok(_) => panic!("connection should be refused"),
        Err(err) => err,
    };
    let text = format!("{err:#}");
    assert!(text.contains("failed to connect websocket"));
    assert!(!text.contains("secret"));
}

#[tokio::test]
async fn client_close_ends_inbound_stream_without_peer_reply() {
    let (url, _tokens, _received) = spawn_gateway(PeerBehaviour::Silent).await;

    let mut link = WsConnector.open(&url).await.expect("open");
    link.outbound.send(OutboundFrame::Close).expect("close");

    let end = tokio::time::timeout(Duration::from_secs(5), link.inbound.recv())
        .await
        .expect("reader stopped after client close");
    assert!(end.is_none());
}
