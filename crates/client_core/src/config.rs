use std::{
    fmt,
    sync::{Arc, RwLock},
    time::Duration,
};

use shared::domain::ChannelId;
use url::Url;

use crate::error::ConnectionError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const TYPING_SEND_WINDOW: Duration = Duration::from_secs(2);
const TYPING_EXPIRY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub reconnect_delay: Duration,
    pub typing_send_window: Duration,
    pub typing_expiry: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            reconnect_delay: RECONNECT_DELAY,
            typing_send_window: TYPING_SEND_WINDOW,
            typing_expiry: TYPING_EXPIRY,
        }
    }
}

/// Host-supplied settings for one realtime session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub timings: SyncTimings,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Result<Self, ConnectionError> {
        let api_base_url = Url::parse(api_base_url.trim())
            .map_err(|err| ConnectionError::InvalidUrl(format!("{api_base_url}: {err}")))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(ConnectionError::InvalidUrl(format!(
                "{api_base_url}: api base url must start with http:// or https://"
            )));
        }
        Ok(Self {
            api_base_url,
            timings: SyncTimings::default(),
        })
    }

    pub fn with_timings(mut self, timings: SyncTimings) -> Self {
        self.timings = timings;
        self
    }

    /// `ws(s)://<base>/ws?token=<bearer>`
    pub fn gateway_url(&self, token: &str) -> Result<Url, ConnectionError> {
        let mut url = self.api_base_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ConnectionError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        url.path_segments_mut()
            .map_err(|_| ConnectionError::InvalidUrl(self.api_base_url.to_string()))?
            .pop_if_empty()
            .push("ws");
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }

    pub fn livekit_token_url(&self, channel_id: &ChannelId) -> Result<Url, ConnectionError> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConnectionError::InvalidUrl(self.api_base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "channels", channel_id.as_str(), "livekit-token"]);
        Ok(url)
    }
}

/// Rewrites an http(s) address to its websocket form; anything else is
/// returned untouched.
pub fn websocket_url(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        raw.to_string()
    }
}

/// URL without its query string, for log lines.
pub fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Shared bearer credential. The host clears it on logout, which also stops
/// the gateway from reconnecting.
#[derive(Clone, Default)]
pub struct SessionToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        let session = Self::default();
        session.set(token);
        session
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = if token.is_empty() { None } else { Some(token) };
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("present", &self.is_present())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
