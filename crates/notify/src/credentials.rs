//! Credential resolution for external channels.

use std::fmt;

use crate::Channel;

/// Credentials for one external channel.
#[derive(Debug, Clone)]
pub struct ChannelCredentials {
    /// Provider webhook endpoint.
    pub url: String,
    /// Bearer token, when the provider requires one.
    pub token: Option<String>,
    /// Destination (phone number etc.) passed through to the provider.
    pub to: Option<String>,
}

/// Resolves credentials per channel; `None` means the channel cannot fire
/// and is skipped with `missing_credentials`.
pub trait CredentialResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, channel: Channel) -> Option<ChannelCredentials>;
}

/// Environment-backed resolver.
///
/// Reads `XCOM_<CHANNEL>_WEBHOOK_URL` (required), `XCOM_<CHANNEL>_TOKEN`
/// and `XCOM_<CHANNEL>_TO` (optional) for voice/sms/tts. The system channel
/// needs no credentials and always resolves.
#[derive(Debug, Default)]
pub struct EnvCredentialResolver;

impl EnvCredentialResolver {
    pub fn new() -> Self {
        Self
    }

    fn var(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, channel: Channel) -> Option<ChannelCredentials> {
        if channel == Channel::System {
            return Some(ChannelCredentials {
                url: String::new(),
                token: None,
                to: None,
            });
        }
        let upper = channel.as_str().to_ascii_uppercase();
        let url = Self::var(&format!("XCOM_{upper}_WEBHOOK_URL"))?;
        Some(ChannelCredentials {
            url,
            token: Self::var(&format!("XCOM_{upper}_TOKEN")),
            to: Self::var(&format!("XCOM_{upper}_TO")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_always_resolves() {
        let resolver = EnvCredentialResolver::new();
        assert!(resolver.resolve(Channel::System).is_some());
    }

    #[test]
    fn external_channel_requires_url() {
        let resolver = EnvCredentialResolver::new();
        std::env::remove_var("XCOM_VOICE_WEBHOOK_URL");
        assert!(resolver.resolve(Channel::Voice).is_none());

        std::env::set_var("XCOM_VOICE_WEBHOOK_URL", "https://example.test/voice");
        std::env::set_var("XCOM_VOICE_TOKEN", "secret");
        let creds = resolver.resolve(Channel::Voice).unwrap();
        assert_eq!(creds.url, "https://example.test/voice");
        assert_eq!(creds.token.as_deref(), Some("secret"));
        std::env::remove_var("XCOM_VOICE_WEBHOOK_URL");
        std::env::remove_var("XCOM_VOICE_TOKEN");
    }
}
