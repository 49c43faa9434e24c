//! Channel model and dispatch outcome records.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Notification channels the dispatcher can fire.
///
/// `System` is the in-app/log surface; the other three reach external
/// providers and require credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    System,
    Voice,
    Sms,
    Tts,
}

impl Channel {
    /// All channels, in dispatch-report order.
    pub const ALL: [Channel; 4] = [Channel::System, Channel::Voice, Channel::Sms, Channel::Tts];

    /// External channels, gated by breach state, credentials and cooldown.
    pub const EXTERNAL: [Channel; 3] = [Channel::Voice, Channel::Sms, Channel::Tts];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Voice => "voice",
            Self::Sms => "sms",
            Self::Tts => "tts",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason a channel did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoBreach,
    XcomOffline,
    MissingCredentials,
    CooldownActive,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::NoBreach => "no_breach",
            Self::XcomOffline => "xcom_offline",
            Self::MissingCredentials => "missing_credentials",
            Self::CooldownActive => "cooldown_active",
        }
    }
}

/// Provider acknowledgement for a successful send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-side message id, when the provider returns one.
    pub id: Option<String>,
}

/// Outcome of one channel for one dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChannelOutcome {
    pub fn sent(id: Option<String>) -> Self {
        Self {
            ok: true,
            skip: None,
            error: None,
            id,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            ok: false,
            skip: Some(reason),
            error: None,
            id: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            skip: None,
            error: Some(error.into()),
            id: None,
        }
    }
}

/// One normalized status row as the dispatcher sees it.
///
/// The engine maps its monitor statuses into this boundary type; the
/// dispatcher only needs the breach flag and the display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub label: String,
    pub breach: bool,
    pub value: Option<f64>,
    pub unit: String,
    /// Rendered threshold, e.g. `<= 5%`.
    pub threshold: Option<String>,
    pub source: String,
}

/// Outbound send seam. One implementation serves all channels so tests
/// can swap in a recorder.
#[async_trait]
pub trait ChannelSender: Send + Sync + fmt::Debug {
    async fn send(&self, channel: Channel, subject: &str, body: &str) -> Result<SendReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_serialize_as_lowercase_keys() {
        assert_eq!(serde_json::to_string(&Channel::Voice).unwrap(), "\"voice\"");
        assert_eq!(Channel::Tts.as_str(), "tts");
    }

    #[test]
    fn skip_reasons_are_machine_readable() {
        let outcome = ChannelOutcome::skipped(SkipReason::CooldownActive);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["skip"], "cooldown_active");
        assert_eq!(json["ok"], false);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn sent_outcome_carries_provider_id() {
        let outcome = ChannelOutcome::sent(Some("msg-1".into()));
        assert!(outcome.ok);
        assert_eq!(outcome.id.as_deref(), Some("msg-1"));
    }
}
