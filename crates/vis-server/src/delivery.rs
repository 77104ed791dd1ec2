//! Bounded delivery of notifications to subscriber channels.
//!
//! Subscriber channels are bounded tokio mpsc channels owned by the caller.
//! The provider never waits on a full channel for longer than the configured
//! send timeout:
//!
//! - a timed-out notification is dropped and counts a strike against its channel
//! - a successful send clears the channel's strikes
//! - a channel reaching `max_consecutive_timeouts` strikes, or whose receiver
//!   is gone, is evicted (all of its subscriptions are removed)

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use vis_core::config::ProviderSettings;
use vis_core::{ChannelKey, SubscriptionOutput};

/// Sending half of a subscriber's delivery channel.
pub type NotificationSender = mpsc::Sender<SubscriptionOutput>;

/// A subscriber delivery channel as known to the registry.
///
/// Identity is the underlying channel: clones of the same sender are the
/// same subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberChannel(NotificationSender);

impl SubscriberChannel {
    pub fn new(sender: NotificationSender) -> Self {
        Self(sender)
    }

    pub fn sender(&self) -> &NotificationSender {
        &self.0
    }
}

impl From<NotificationSender> for SubscriberChannel {
    fn from(sender: NotificationSender) -> Self {
        Self(sender)
    }
}

impl ChannelKey for SubscriberChannel {
    fn same_channel(&self, other: &Self) -> bool {
        self.0.same_channel(&other.0)
    }
}

/// How long delivery may wait, and how much slowness is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub send_timeout: Duration,
    pub max_consecutive_timeouts: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from(&ProviderSettings::default())
    }
}

impl From<&ProviderSettings> for DeliveryPolicy {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            max_consecutive_timeouts: settings.max_consecutive_timeouts.max(1),
        }
    }
}

/// Why a channel was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// The receiving side was dropped.
    Closed,
    /// Too many consecutive sends timed out.
    TooSlow { timeouts: u32 },
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The notification was dropped after a timeout; the channel stays subscribed.
    Dropped { timeouts: u32 },
    /// The notification was dropped and the channel must be unsubscribed.
    Evict(EvictReason),
}

/// Tracks consecutive timeouts per channel.
#[derive(Debug)]
pub(crate) struct DeliveryTracker {
    policy: DeliveryPolicy,
    strikes: Vec<(SubscriberChannel, u32)>,
}

impl DeliveryTracker {
    pub(crate) fn new(policy: DeliveryPolicy) -> Self {
        Self {
            policy,
            strikes: Vec::new(),
        }
    }

    /// Send one notification, waiting at most the policy's send timeout.
    pub(crate) async fn deliver(
        &mut self,
        channel: &SubscriberChannel,
        output: SubscriptionOutput,
    ) -> DeliveryOutcome {
        match channel.sender().send_timeout(output, self.policy.send_timeout).await {
            Ok(()) => {
                self.forget(channel);
                DeliveryOutcome::Delivered
            }
            Err(SendTimeoutError::Closed(_)) => DeliveryOutcome::Evict(EvictReason::Closed),
            Err(SendTimeoutError::Timeout(_)) => {
                let timeouts = self.strike(channel);
                if timeouts >= self.policy.max_consecutive_timeouts {
                    DeliveryOutcome::Evict(EvictReason::TooSlow { timeouts })
                } else {
                    DeliveryOutcome::Dropped { timeouts }
                }
            }
        }
    }

    /// Drop any strike record for a channel.
    pub(crate) fn forget(&mut self, channel: &SubscriberChannel) {
        self.strikes.retain(|(c, _)| !c.same_channel(channel));
    }

    fn strike(&mut self, channel: &SubscriberChannel) -> u32 {
        match self.strikes.iter_mut().find(|(c, _)| c.same_channel(channel)) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                self.strikes.push((channel.clone(), 1));
                1
            }
        }
    }

    pub(crate) fn tracked_channels(&self) -> usize {
        self.strikes.len()
    }
}
