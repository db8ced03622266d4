use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

use crate::config::redacted;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// The transport failed; the link must not be used any further.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// One open duplex connection. The link is closed once `inbound` yields
/// `None`; dropping `outbound` or sending `Close` closes it from our side.
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<TransportLink>;
}

/// WebSocket transport backed by tokio-tungstenite.
pub struct WsConnector;

#[async_trait]
impl TransportConnector for WsConnector {
    async fn open(&self, url: &Url) -> Result<TransportLink> {
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {}", redacted(url)))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<InboundFrame>();
        let (writer_done, mut writer_closed) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _writer_done = writer_done;
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if let Err(err) = ws_writer.send(Message::Text(text)).await {
                            debug!(error = %err, "gateway: websocket send failed");
                            break;
                        }
                    }
                    OutboundFrame::Close => break,
                }
            }
            let _ = ws_writer.close().await;
        });

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = ws_reader.next() => msg,
                    _ = &mut writer_closed => {
                        debug!("gateway: writer closed, ending reader");
                        break;
                    }
                };
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(InboundFrame::Text(text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let _ = inbound_tx.send(InboundFrame::Error(err.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(TransportLink { outbound, inbound })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
