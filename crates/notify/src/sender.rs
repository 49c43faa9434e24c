//! Outbound channel senders.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Channel, ChannelSender, CredentialResolver, SendReceipt};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookAck {
    id: Option<String>,
}

/// Production sender: voice/SMS/TTS post to per-channel webhooks, the
/// system channel lands on the structured log.
#[derive(Debug)]
pub struct WebhookSender {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialResolver>,
}

impl WebhookSender {
    pub fn new(credentials: Arc<dyn CredentialResolver>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    async fn send(&self, channel: Channel, subject: &str, body: &str) -> Result<SendReceipt> {
        if channel == Channel::System {
            info!(target: "sonic_alert", subject = subject, body = body, "system notification");
            return Ok(SendReceipt::default());
        }

        let creds = match self.credentials.resolve(channel) {
            Some(creds) => creds,
            None => bail!("no credentials for channel {channel}"),
        };

        let payload = WebhookPayload {
            channel: channel.as_str(),
            subject,
            body,
            to: creds.to.as_deref(),
        };
        let mut request = self.client.post(&creds.url).json(&payload);
        if let Some(token) = &creds.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("webhook request for {channel} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("webhook for {channel} returned {status}");
        }
        // Providers that answer with JSON may include a message id.
        let ack: WebhookAck = response.json().await.unwrap_or_default();
        Ok(SendReceipt { id: ack.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelCredentials;

    #[derive(Debug)]
    struct NoCreds;

    impl CredentialResolver for NoCreds {
        fn resolve(&self, channel: Channel) -> Option<ChannelCredentials> {
            (channel == Channel::System).then(|| ChannelCredentials {
                url: String::new(),
                token: None,
                to: None,
            })
        }
    }

    #[tokio::test]
    async fn system_channel_never_touches_the_network() {
        let sender = WebhookSender::new(Arc::new(NoCreds));
        let receipt = sender
            .send(Channel::System, "[LIQUID] BTC BREACH", "details")
            .await
            .unwrap();
        assert!(receipt.id.is_none());
    }

    #[tokio::test]
    async fn external_channel_without_credentials_errors() {
        let sender = WebhookSender::new(Arc::new(NoCreds));
        let err = sender
            .send(Channel::Voice, "subject", "body")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no credentials"));
    }
}
