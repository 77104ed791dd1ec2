//! Per-cycle notification batching.
//!
//! The changed updates of one ingestion cycle are grouped per subscription
//! so every affected subscription gets exactly one message for the cycle.

use std::collections::{BTreeMap, HashMap};

use crate::model::{SubscriptionOutput, Update, Value};
use crate::subscription::{ChannelKey, SubscriptionId, SubscriptionRegistry};

/// A message ready to be delivered on a subscriber channel.
#[derive(Debug, Clone)]
pub struct Notification<C> {
    pub channel: C,
    pub output: SubscriptionOutput,
}

/// Build the notifications for one ingestion cycle.
///
/// `changed` must only contain updates that changed the store. Messages are
/// returned in registry order (channel insertion, then subscription id).
/// If a path appears more than once, its last value wins.
pub fn build_notifications<C: ChannelKey>(
    registry: &SubscriptionRegistry<C>,
    changed: &[Update],
) -> Vec<Notification<C>> {
    let mut pending: HashMap<SubscriptionId, BTreeMap<String, Value>> = HashMap::new();

    for update in changed {
        for (_, id) in registry.matches_for(&update.path) {
            pending
                .entry(id)
                .or_default()
                .insert(update.path.clone(), update.value.clone());
        }
    }

    if pending.is_empty() {
        return Vec::new();
    }

    let mut notifications = Vec::with_capacity(pending.len());
    for (channel, subscription) in registry.iter() {
        if let Some(data) = pending.remove(&subscription.id) {
            notifications.push(Notification {
                channel: channel.clone(),
                output: SubscriptionOutput {
                    id: subscription.id.to_string(),
                    data,
                },
            });
        }
    }
    notifications
}
