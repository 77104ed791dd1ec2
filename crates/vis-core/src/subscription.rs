//! Subscription registry.
//!
//! Subscriptions are grouped by the delivery channel they were registered
//! on. Groups keep insertion order, and so do subscriptions within a group,
//! so path lookups return matches in a reproducible order.

use std::fmt;
use std::str::FromStr;

use crate::error::VisError;
use crate::path::{PathPattern, PatternError};

/// Identity of a delivery channel.
///
/// Two handles are the same channel when they deliver to the same receiver,
/// which is not necessarily value equality of the handles.
pub trait ChannelKey: Clone {
    fn same_channel(&self, other: &Self) -> bool;
}

/// Process-unique subscription identifier.
///
/// Assigned in increasing order starting at 1 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = VisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(SubscriptionId)
            .map_err(|_| VisError::NotFound(format!("subscription '{}'", s)))
    }
}

/// One registered interest in a path pattern.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub pattern: PathPattern,
}

/// A delivery channel and its active subscriptions.
#[derive(Debug, Clone)]
struct ChannelGroup<C> {
    channel: C,
    subscriptions: Vec<Subscription>,
}

/// Registry of subscriptions keyed by delivery channel.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry<C> {
    groups: Vec<ChannelGroup<C>>,
    last_id: u64,
}

impl<C> Default for SubscriptionRegistry<C> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            last_id: 0,
        }
    }
}

impl<C: ChannelKey> SubscriptionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern on a channel and return its new id.
    ///
    /// The id counter only advances when the pattern compiles.
    pub fn subscribe(&mut self, channel: &C, pattern: &str) -> Result<SubscriptionId, PatternError> {
        let pattern = PathPattern::new(pattern)?;
        self.last_id += 1;
        let id = SubscriptionId(self.last_id);
        let subscription = Subscription { id, pattern };

        match self.group_mut(channel) {
            Some(group) => group.subscriptions.push(subscription),
            None => self.groups.push(ChannelGroup {
                channel: channel.clone(),
                subscriptions: vec![subscription],
            }),
        }
        Ok(id)
    }

    /// Remove one subscription from a channel.
    ///
    /// The channel group is dropped with its last subscription.
    pub fn unsubscribe(&mut self, channel: &C, id: SubscriptionId) -> Result<(), VisError> {
        let not_found = || VisError::NotFound(format!("subscription '{}'", id));

        let index = self
            .groups
            .iter()
            .position(|g| g.channel.same_channel(channel))
            .ok_or_else(not_found)?;
        let group = &mut self.groups[index];

        let before = group.subscriptions.len();
        group.subscriptions.retain(|s| s.id != id);
        if group.subscriptions.len() == before {
            return Err(not_found());
        }

        if group.subscriptions.is_empty() {
            self.groups.remove(index);
        }
        Ok(())
    }

    /// Remove every subscription of a channel and return how many were removed.
    pub fn unsubscribe_all(&mut self, channel: &C) -> usize {
        match self.groups.iter().position(|g| g.channel.same_channel(channel)) {
            Some(index) => self.groups.remove(index).subscriptions.len(),
            None => 0,
        }
    }

    /// Every subscription whose pattern matches `path`, as (channel, id).
    pub fn matches_for(&self, path: &str) -> Vec<(&C, SubscriptionId)> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.subscriptions
                    .iter()
                    .filter(|s| s.pattern.matches(path))
                    .map(move |s| (&g.channel, s.id))
            })
            .collect()
    }

    /// Iterate over all subscriptions in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&C, &Subscription)> {
        self.groups
            .iter()
            .flat_map(|g| g.subscriptions.iter().map(move |s| (&g.channel, s)))
    }

    /// Subscriptions registered on a channel.
    pub fn subscriptions_of(&self, channel: &C) -> &[Subscription] {
        self.groups
            .iter()
            .find(|g| g.channel.same_channel(channel))
            .map(|g| g.subscriptions.as_slice())
            .unwrap_or(&[])
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.subscriptions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of channels with at least one subscription.
    pub fn channel_count(&self) -> usize {
        self.groups.len()
    }

    fn group_mut(&mut self, channel: &C) -> Option<&mut ChannelGroup<C>> {
        self.groups
            .iter_mut()
            .find(|g| g.channel.same_channel(channel))
    }
}
