//! Notification dispatch for the sonic monitor.
//!
//! This crate provides:
//! - Channel model and per-channel dispatch outcomes
//! - Credential resolution for external channels
//! - A webhook-backed channel sender (voice/SMS/TTS) plus the in-app
//!   system surface
//! - Persistent per-(monitor, channel) cooldowns
//! - The dispatcher that gates, rate-limits and fans out alerts

mod channel;
mod compose;
mod cooldown;
mod credentials;
mod dispatcher;
mod sender;

pub use channel::{Alert, Channel, ChannelOutcome, ChannelSender, SendReceipt, SkipReason};
pub use compose::AlertText;
pub use cooldown::{CooldownDecision, CooldownLedger};
pub use credentials::{ChannelCredentials, CredentialResolver, EnvCredentialResolver};
pub use dispatcher::{ChannelFlags, DispatchOutcome, DispatchRequest, NotificationDispatcher};
pub use sender::WebhookSender;
