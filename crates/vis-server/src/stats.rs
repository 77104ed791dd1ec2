//! Provider statistics.
//!
//! The provider loop is the only writer, so counters are plain integers
//! owned by the loop; callers get a [`ProviderStats`] snapshot on request.

use serde::{Deserialize, Serialize};

/// Snapshot of the provider's counters and current sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    /// Update batches processed.
    pub cycles: u64,

    /// Updates applied to known paths.
    pub updates_applied: u64,

    /// Updates that changed a stored value.
    pub changes: u64,

    /// Updates ignored because their path is not in the store.
    pub unknown_updates: u64,

    /// Notifications handed to subscriber channels.
    pub notifications_delivered: u64,

    /// Notifications dropped (timeout, closed or evicted channel).
    pub notifications_dropped: u64,

    /// Channels unsubscribed because they were closed or too slow.
    pub channels_evicted: u64,

    /// Number of stored paths.
    pub paths: usize,

    /// Active subscriptions.
    pub subscriptions: usize,

    /// Channels with at least one subscription.
    pub channels: usize,
}

/// Counters accumulated by the provider loop.
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    pub(crate) cycles: u64,
    pub(crate) updates_applied: u64,
    pub(crate) changes: u64,
    pub(crate) unknown_updates: u64,
    pub(crate) notifications_delivered: u64,
    pub(crate) notifications_dropped: u64,
    pub(crate) channels_evicted: u64,
}

impl StatsCounter {
    pub(crate) fn record_cycle(&mut self, report: &crate::provider::CycleReport) {
        self.cycles += 1;
        self.updates_applied += report.applied as u64;
        self.changes += report.changed as u64;
        self.unknown_updates += report.unknown as u64;
        self.notifications_delivered += report.delivered as u64;
        self.notifications_dropped += report.dropped as u64;
        self.channels_evicted += report.evicted as u64;
    }

    /// Snapshot with the current store and registry sizes.
    pub(crate) fn snapshot(&self, paths: usize, subscriptions: usize, channels: usize) -> ProviderStats {
        ProviderStats {
            cycles: self.cycles,
            updates_applied: self.updates_applied,
            changes: self.changes,
            unknown_updates: self.unknown_updates,
            notifications_delivered: self.notifications_delivered,
            notifications_dropped: self.notifications_dropped,
            channels_evicted: self.channels_evicted,
            paths,
            subscriptions,
            channels,
        }
    }
}
