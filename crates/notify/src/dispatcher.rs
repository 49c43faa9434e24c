//! Breach-gated, rate-limited notification dispatch.
//!
//! Each (monitor, channel) pair moves IDLE → FIRING → COOLING → IDLE: the
//! cooldown mark is written when the fire decision is made, the send runs
//! under a bounded timeout, and the pair stays cooling until the window
//! expires. External channels (voice/sms/tts) are gated, in order, on the
//! channel enable flag, breach presence, the live master switch, resolvable
//! credentials and the cooldown. The system channel is informational: it
//! fires whenever enabled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compose::{compose, AlertText};
use crate::{
    Alert, Channel, ChannelOutcome, ChannelSender, CooldownDecision, CooldownLedger,
    CredentialResolver, SkipReason,
};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SNOOZE_SECONDS: u64 = 600;
const PROFIT_SNOOZE_SECONDS: u64 = 1200;

/// Per-monitor channel enable flags, as resolved from config.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub system: bool,
    pub voice: bool,
    pub sms: bool,
    pub tts: bool,
}

impl ChannelFlags {
    pub fn enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::System => self.system,
            Channel::Voice => self.voice,
            Channel::Sms => self.sms,
            Channel::Tts => self.tts,
        }
    }
}

/// One dispatch call: a monitor's fresh statuses plus its channel policy.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub monitor: String,
    pub alerts: Vec<Alert>,
    pub channels: ChannelFlags,
    /// Monitor-level cooldown override, seconds.
    pub snooze_seconds: Option<u64>,
    /// Bundle-level fallback, seconds.
    pub global_snooze_seconds: Option<u64>,
    /// Master switch for external channels.
    pub live: bool,
}

/// Per-channel outcomes for one dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub monitor: String,
    pub channels: BTreeMap<Channel, ChannelOutcome>,
}

impl DispatchOutcome {
    pub fn any_sent(&self) -> bool {
        self.channels.values().any(|outcome| outcome.ok)
    }

    pub fn sent_count(&self) -> usize {
        self.channels.values().filter(|outcome| outcome.ok).count()
    }
}

/// Decides which channels fire for a monitor's statuses and reports one
/// outcome per channel. Never returns an error: every failure mode ends
/// up machine-readable inside the outcome.
#[derive(Debug)]
pub struct NotificationDispatcher {
    sender: Arc<dyn ChannelSender>,
    credentials: Arc<dyn CredentialResolver>,
    cooldowns: CooldownLedger,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        sender: Arc<dyn ChannelSender>,
        credentials: Arc<dyn CredentialResolver>,
        cooldowns: CooldownLedger,
    ) -> Self {
        Self {
            sender,
            credentials,
            cooldowns,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-channel send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchOutcome {
        let any_breach = request.alerts.iter().any(|alert| alert.breach);
        let text = compose(&request.monitor, &request.alerts);
        let window = effective_snooze(request);
        let mut channels = BTreeMap::new();

        // System surface: informational, no breach/credential/cooldown gates.
        let system = if request.channels.enabled(Channel::System) {
            self.send_one(Channel::System, &text).await
        } else {
            ChannelOutcome::skipped(SkipReason::Disabled)
        };
        channels.insert(Channel::System, system);

        let mut firing = Vec::new();
        for channel in Channel::EXTERNAL {
            if !request.channels.enabled(channel) {
                channels.insert(channel, ChannelOutcome::skipped(SkipReason::Disabled));
                continue;
            }
            if !any_breach {
                channels.insert(channel, ChannelOutcome::skipped(SkipReason::NoBreach));
                continue;
            }
            if !request.live {
                channels.insert(channel, ChannelOutcome::skipped(SkipReason::XcomOffline));
                continue;
            }
            if self.credentials.resolve(channel).is_none() {
                channels.insert(channel, ChannelOutcome::skipped(SkipReason::MissingCredentials));
                continue;
            }
            match self
                .cooldowns
                .try_mark(&request.monitor, channel, window)
                .await
            {
                Ok(CooldownDecision::Fire) => firing.push(channel),
                Ok(CooldownDecision::Held { remaining_seconds }) => {
                    debug!(
                        monitor = %request.monitor,
                        channel = %channel,
                        remaining_seconds,
                        "channel cooling down"
                    );
                    channels.insert(channel, ChannelOutcome::skipped(SkipReason::CooldownActive));
                }
                Err(err) => {
                    // Fail open: a broken cooldown store must not silence alerts.
                    warn!(
                        monitor = %request.monitor,
                        channel = %channel,
                        error = %err,
                        "cooldown check failed, firing anyway"
                    );
                    firing.push(channel);
                }
            }
        }

        let sends = firing.iter().map(|channel| self.send_one(*channel, &text));
        let outcomes = join_all(sends).await;
        for (channel, outcome) in firing.into_iter().zip(outcomes) {
            channels.insert(channel, outcome);
        }

        DispatchOutcome {
            monitor: request.monitor.clone(),
            channels,
        }
    }

    async fn send_one(&self, channel: Channel, text: &AlertText) -> ChannelOutcome {
        // Spoken channels get the plain-words body.
        let body = match channel {
            Channel::Voice | Channel::Tts => text.speech.as_str(),
            Channel::System | Channel::Sms => text.body.as_str(),
        };
        match tokio::time::timeout(
            self.send_timeout,
            self.sender.send(channel, &text.subject, body),
        )
        .await
        {
            Ok(Ok(receipt)) => ChannelOutcome::sent(receipt.id),
            Ok(Err(err)) => ChannelOutcome::failed(format!("{err:#}")),
            Err(_) => ChannelOutcome::failed(format!(
                "timeout after {}s",
                self.send_timeout.as_secs()
            )),
        }
    }
}

fn effective_snooze(request: &DispatchRequest) -> u64 {
    request
        .snooze_seconds
        .or(request.global_snooze_seconds)
        .unwrap_or_else(|| default_snooze(&request.monitor))
}

fn default_snooze(monitor: &str) -> u64 {
    if monitor == "profit" {
        PROFIT_SNOOZE_SECONDS
    } else {
        DEFAULT_SNOOZE_SECONDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelCredentials, SendReceipt};
    use anyhow::bail;
    use async_trait::async_trait;
    use sonic_store::{StoreHandle, VarStore};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSender {
        calls: Mutex<Vec<(Channel, String, String)>>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        async fn send(&self, channel: Channel, subject: &str, body: &str) -> anyhow::Result<SendReceipt> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push((channel, subject.to_string(), body.to_string()));
            if self.fail {
                bail!("provider unavailable");
            }
            Ok(SendReceipt {
                id: Some("msg-1".into()),
            })
        }
    }

    #[derive(Debug)]
    struct AllowAll;

    impl CredentialResolver for AllowAll {
        fn resolve(&self, _channel: Channel) -> Option<ChannelCredentials> {
            Some(ChannelCredentials {
                url: "https://example.test/hook".into(),
                token: None,
                to: None,
            })
        }
    }

    #[derive(Debug)]
    struct DenyExternal;

    impl CredentialResolver for DenyExternal {
        fn resolve(&self, channel: Channel) -> Option<ChannelCredentials> {
            (channel == Channel::System).then(|| ChannelCredentials {
                url: String::new(),
                token: None,
                to: None,
            })
        }
    }

    async fn ledger() -> CooldownLedger {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        CooldownLedger::new(VarStore::new(handle.pool()))
    }

    fn breach_alert() -> Alert {
        Alert {
            label: "BTC liquidation".into(),
            breach: true,
            value: Some(-6.0),
            unit: "%".into(),
            threshold: Some("<= 5%".into()),
            source: "liq".into(),
        }
    }

    fn ok_alert() -> Alert {
        Alert {
            breach: false,
            ..breach_alert()
        }
    }

    fn request(alerts: Vec<Alert>, flags: ChannelFlags, live: bool) -> DispatchRequest {
        DispatchRequest {
            monitor: "liquid".into(),
            alerts,
            channels: flags,
            snooze_seconds: None,
            global_snooze_seconds: None,
            live,
        }
    }

    const ALL_ON: ChannelFlags = ChannelFlags {
        system: true,
        voice: true,
        sms: true,
        tts: true,
    };

    #[tokio::test]
    async fn breach_gate_blocks_external_channels() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingSender::default()),
            Arc::new(AllowAll),
            ledger().await,
        );
        let outcome = dispatcher
            .dispatch(&request(vec![ok_alert()], ALL_ON, true))
            .await;

        assert_eq!(
            outcome.channels[&Channel::Voice].skip,
            Some(SkipReason::NoBreach)
        );
        assert_eq!(
            outcome.channels[&Channel::Sms].skip,
            Some(SkipReason::NoBreach)
        );
        // System is informational and still fires.
        assert!(outcome.channels[&Channel::System].ok);
        assert_eq!(outcome.sent_count(), 1);
    }

    #[tokio::test]
    async fn disabled_channels_report_disabled() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingSender::default()),
            Arc::new(AllowAll),
            ledger().await,
        );
        let flags = ChannelFlags {
            system: false,
            voice: false,
            sms: false,
            tts: false,
        };
        let outcome = dispatcher
            .dispatch(&request(vec![breach_alert()], flags, true))
            .await;
        for channel in Channel::ALL {
            assert_eq!(
                outcome.channels[&channel].skip,
                Some(SkipReason::Disabled),
                "{channel}"
            );
        }
        assert!(!outcome.any_sent());
    }

    #[tokio::test]
    async fn offline_master_switch_holds_external_channels() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingSender::default()),
            Arc::new(AllowAll),
            ledger().await,
        );
        let outcome = dispatcher
            .dispatch(&request(vec![breach_alert()], ALL_ON, false))
            .await;
        assert_eq!(
            outcome.channels[&Channel::Voice].skip,
            Some(SkipReason::XcomOffline)
        );
        assert!(outcome.channels[&Channel::System].ok);
    }

    #[tokio::test]
    async fn missing_credentials_is_reported_not_silent() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingSender::default()),
            Arc::new(DenyExternal),
            ledger().await,
        );
        let outcome = dispatcher
            .dispatch(&request(vec![breach_alert()], ALL_ON, true))
            .await;
        for channel in Channel::EXTERNAL {
            assert_eq!(
                outcome.channels[&channel].skip,
                Some(SkipReason::MissingCredentials),
                "{channel}"
            );
        }
    }

    #[tokio::test]
    async fn cooldown_allows_exactly_one_fire_per_window() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = NotificationDispatcher::new(
            sender.clone(),
            Arc::new(AllowAll),
            ledger().await,
        );
        let req = request(
            vec![breach_alert()],
            ChannelFlags {
                system: false,
                voice: true,
                sms: false,
                tts: false,
            },
            true,
        );

        let first = dispatcher.dispatch(&req).await;
        let second = dispatcher.dispatch(&req).await;

        let ok_count = [&first, &second]
            .iter()
            .filter(|o| o.channels[&Channel::Voice].ok)
            .count();
        let held_count = [&first, &second]
            .iter()
            .filter(|o| o.channels[&Channel::Voice].skip == Some(SkipReason::CooldownActive))
            .count();
        assert_eq!(ok_count, 1);
        assert_eq!(held_count, 1);
        assert_eq!(sender.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_records_error_and_consumes_window() {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        let failing = NotificationDispatcher::new(
            Arc::new(RecordingSender {
                fail: true,
                ..Default::default()
            }),
            Arc::new(AllowAll),
            CooldownLedger::new(VarStore::new(handle.pool())),
        );
        let req = request(
            vec![breach_alert()],
            ChannelFlags {
                system: false,
                voice: true,
                sms: false,
                tts: false,
            },
            true,
        );

        let outcome = failing.dispatch(&req).await;
        let voice = &outcome.channels[&Channel::Voice];
        assert!(!voice.ok);
        assert!(voice.error.as_deref().unwrap().contains("provider unavailable"));

        // Same window, healthy sender: the failed fire already consumed it.
        let healthy = NotificationDispatcher::new(
            Arc::new(RecordingSender::default()),
            Arc::new(AllowAll),
            CooldownLedger::new(VarStore::new(handle.pool())),
        );
        let retry = healthy.dispatch(&req).await;
        assert_eq!(
            retry.channels[&Channel::Voice].skip,
            Some(SkipReason::CooldownActive)
        );
    }

    #[tokio::test]
    async fn spoken_channels_receive_speech_body() {
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = NotificationDispatcher::new(
            sender.clone(),
            Arc::new(AllowAll),
            ledger().await,
        );
        dispatcher
            .dispatch(&request(
                vec![breach_alert()],
                ChannelFlags {
                    system: false,
                    voice: true,
                    sms: true,
                    tts: false,
                },
                true,
            ))
            .await;

        let calls = sender.calls.lock().unwrap();
        let voice = calls.iter().find(|(c, _, _)| *c == Channel::Voice).unwrap();
        let sms = calls.iter().find(|(c, _, _)| *c == Channel::Sms).unwrap();
        assert!(voice.2.contains("versus threshold"));
        assert!(sms.2.contains("value=-6%"));
    }

    #[tokio::test]
    async fn hung_sender_times_out_as_error() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingSender {
                delay: Some(Duration::from_millis(200)),
                ..Default::default()
            }),
            Arc::new(AllowAll),
            ledger().await,
        )
        .with_send_timeout(Duration::from_millis(20));
        let outcome = dispatcher
            .dispatch(&request(
                vec![breach_alert()],
                ChannelFlags {
                    system: false,
                    voice: true,
                    sms: false,
                    tts: false,
                },
                true,
            ))
            .await;
        let voice = &outcome.channels[&Channel::Voice];
        assert!(!voice.ok);
        assert!(voice.error.as_deref().unwrap().contains("timeout"));
    }
}
