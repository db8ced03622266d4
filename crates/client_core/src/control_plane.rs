use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use livekit_integration::{LiveKitRoomConnector, LiveKitRoomOptions, LiveKitRoomSession};
use reqwest::Client;
use serde::Deserialize;
use shared::{
    domain::ChannelId,
    error::{ApiErrorBody, ApiException},
};
use tracing::debug;

use crate::config::{ClientConfig, SessionToken};

/// Short-lived media credential scoped to one channel.
#[derive(Clone, PartialEq, Eq)]
pub struct LiveKitCredentials {
    pub access_token: String,
    pub server_url: String,
}

impl std::fmt::Debug for LiveKitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveKitCredentials")
            .field("server_url", &self.server_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait LiveKitControlPlane: Send + Sync {
    async fn request_livekit_token(&self, channel_id: &ChannelId) -> Result<LiveKitCredentials>;
}

pub struct MissingLiveKitControlPlane;

#[async_trait]
impl LiveKitControlPlane for MissingLiveKitControlPlane {
    async fn request_livekit_token(&self, _channel_id: &ChannelId) -> Result<LiveKitCredentials> {
        Err(anyhow!("livekit control plane is unavailable"))
    }
}

pub struct MissingLiveKitConnector;

#[async_trait]
impl LiveKitRoomConnector for MissingLiveKitConnector {
    async fn connect(&self, _options: LiveKitRoomOptions) -> Result<Arc<dyn LiveKitRoomSession>> {
        Err(anyhow!("livekit connector is unavailable"))
    }
}

#[derive(Debug, Deserialize)]
struct LiveKitTokenResponse {
    token: String,
    url: String,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    identity: Option<String>,
}

/// `GET /api/channels/{id}/livekit-token` with the session bearer.
pub struct HttpControlPlane {
    http: Client,
    config: ClientConfig,
    token: SessionToken,
}

impl HttpControlPlane {
    pub fn new(config: ClientConfig, token: SessionToken) -> Self {
        Self {
            http: Client::new(),
            config,
            token,
        }
    }
}

#[async_trait]
impl LiveKitControlPlane for HttpControlPlane {
    async fn request_livekit_token(&self, channel_id: &ChannelId) -> Result<LiveKitCredentials> {
        let bearer = self
            .token
            .get()
            .ok_or_else(|| anyhow!("no bearer credential available"))?;
        let url = self.config.livekit_token_url(channel_id)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .context("livekit token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            return Err(ApiException::new(status.as_u16(), message).into());
        }

        let body: LiveKitTokenResponse = response
            .json()
            .await
            .context("invalid livekit token response")?;
        debug!(
            channel_id = %channel_id,
            room = body.room.as_deref().unwrap_or_default(),
            identity = body.identity.as_deref().unwrap_or_default(),
            "voice: livekit token issued"
        );
        Ok(LiveKitCredentials {
            access_token: body.token,
            server_url: body.url,
        })
    }
}

#[cfg(test)]
#[path = "tests/control_plane_tests.rs"]
mod tests;
