//! HTTP reply dispatcher.
//!
//! Posts signed replies back to the messaging platform. Every outbound
//! request carries a fresh nonce and an HMAC signature over nonce || body,
//! mirroring the inbound verification scheme.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use chorus_core::dispatch::ReplyDispatcher;
use chorus_types::config::DispatchConfig;
use chorus_types::error::DispatchError;
use chorus_types::webhook::OutboundReply;

use crate::webhook::signature;

/// Header carrying the hex HMAC signature.
pub const SIGNATURE_HEADER: &str = "x-chorus-signature";
/// Header carrying the signature nonce.
pub const NONCE_HEADER: &str = "x-chorus-nonce";

/// Reqwest-based implementation of `ReplyDispatcher`.
pub struct HttpReplyDispatcher {
    client: reqwest::Client,
    secret: SecretString,
    platform_base_url: Option<String>,
    timeout_ms: u64,
}

// No Debug derive; the signing secret stays out of logs.

impl HttpReplyDispatcher {
    pub fn new(secret: SecretString, config: &DispatchConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DispatchError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            secret,
            platform_base_url: config
                .platform_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            timeout_ms: config.timeout_ms,
        })
    }

    /// The delivery URL: the caller-supplied callback wins, otherwise the
    /// configured platform REST endpoint for the room.
    fn target_url(&self, room_token: &str, callback_url: Option<&str>) -> Result<String, DispatchError> {
        if let Some(url) = callback_url {
            return Ok(url.to_string());
        }
        match &self.platform_base_url {
            Some(base) => Ok(format!("{base}/rooms/{room_token}/messages")),
            None => Err(DispatchError::Http(
                "no callback url and no platform base url configured".to_string(),
            )),
        }
    }
}

impl ReplyDispatcher for HttpReplyDispatcher {
    async fn deliver(
        &self,
        reply: &OutboundReply,
        room_token: &str,
        callback_url: Option<&str>,
    ) -> Result<(), DispatchError> {
        let url = self.target_url(room_token, callback_url)?;

        let body = serde_json::to_vec(reply)
            .map_err(|e| DispatchError::Http(format!("failed to serialize reply: {e}")))?;
        let nonce = signature::fresh_nonce();
        let sig = signature::sign(self.secret.expose_secret().as_bytes(), &nonce, &body)
            .map_err(|e| DispatchError::Http(format!("failed to sign reply: {e}")))?;

        let response = self
            .client
            .post(&url)
            .header(SIGNATURE_HEADER, sig)
            .header(NONCE_HEADER, nonce)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(self.timeout_ms)
                } else {
                    DispatchError::Http(format!("delivery request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        tracing::debug!(room = %room_token, status = status.as_u16(), "reply delivered");
        Ok(())
    }
}
