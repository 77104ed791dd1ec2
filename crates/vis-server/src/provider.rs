//! The serialized data provider loop.
//!
//! [`DataProvider`] is the sole owner of the value store and the
//! subscription registry. It processes two kinds of events, strictly one at
//! a time:
//!
//! - update batches from data-source adapters (apply, then notify)
//! - requests from handles (get, subscribe, unsubscribe, stats, ...)
//!
//! Because an update batch is applied and all of its notifications are sent
//! before the next event is taken, every query observes whole cycles and no
//! notification is built for a subscription removed by an earlier request.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vis_core::config::ProviderSettings;
use vis_core::{
    build_notifications, ChannelKey, DataPoint, SubscriptionId, SubscriptionRegistry, Update,
    Value, ValueStore, VisError,
};

use crate::delivery::{DeliveryOutcome, DeliveryPolicy, DeliveryTracker, NotificationSender, SubscriberChannel};
use crate::stats::{ProviderStats, StatsCounter};
use crate::ProviderError;

/// One batch of updates from a data source.
pub type UpdateBatch = Vec<Update>;

/// What happened while processing one update batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Updates for known paths.
    pub applied: usize,
    /// Updates that changed the stored value.
    pub changed: usize,
    /// Updates for paths not in the store.
    pub unknown: usize,
    /// Notifications sent.
    pub delivered: usize,
    /// Notifications dropped.
    pub dropped: usize,
    /// Channels unsubscribed during delivery.
    pub evicted: usize,
}

/// Requests served by the provider loop.
#[derive(Debug)]
enum Request {
    GetByPath {
        pattern: String,
        reply: oneshot::Sender<Result<BTreeMap<String, Value>, VisError>>,
    },
    Subscribe {
        channel: SubscriberChannel,
        pattern: String,
        reply: oneshot::Sender<Result<SubscriptionId, VisError>>,
    },
    Unsubscribe {
        channel: SubscriberChannel,
        id: String,
        reply: oneshot::Sender<Result<(), VisError>>,
    },
    UnsubscribeAll {
        channel: SubscriberChannel,
        reply: oneshot::Sender<usize>,
    },
    Apply {
        batch: UpdateBatch,
        reply: oneshot::Sender<CycleReport>,
    },
    Stats {
        reply: oneshot::Sender<ProviderStats>,
    },
    Shutdown,
}

/// The provider loop. Create with [`DataProvider::new`], start with
/// [`DataProvider::spawn`] or [`DataProvider::run`].
pub struct DataProvider {
    store: ValueStore,
    registry: SubscriptionRegistry<SubscriberChannel>,
    delivery: DeliveryTracker,
    stats: StatsCounter,
    requests: mpsc::Receiver<Request>,
    updates: mpsc::Receiver<UpdateBatch>,
}

impl DataProvider {
    /// Create a provider seeded with the given data points, and its handle.
    pub fn new(
        settings: &ProviderSettings,
        seed: impl IntoIterator<Item = DataPoint>,
    ) -> (Self, DataProviderHandle) {
        let (request_tx, request_rx) = mpsc::channel(settings.request_capacity.max(1));
        let (update_tx, update_rx) = mpsc::channel(settings.update_capacity.max(1));

        let provider = Self {
            store: ValueStore::with_points(seed),
            registry: SubscriptionRegistry::new(),
            delivery: DeliveryTracker::new(DeliveryPolicy::from(settings)),
            stats: StatsCounter::default(),
            requests: request_rx,
            updates: update_rx,
        };
        let handle = DataProviderHandle {
            requests: request_tx,
            updates: update_tx,
        };
        (provider, handle)
    }

    /// Run the loop on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!(paths = self.store.len(), "Data provider started");

        let mut requests_open = true;
        let mut updates_open = true;

        loop {
            tokio::select! {
                request = self.requests.recv(), if requests_open => match request {
                    Some(Request::Shutdown) => {
                        info!("Data provider shutdown requested");
                        break;
                    }
                    Some(request) => self.handle_request(request).await,
                    None => requests_open = false,
                },
                batch = self.updates.recv(), if updates_open => match batch {
                    Some(batch) => {
                        self.process_batch(batch).await;
                    }
                    None => updates_open = false,
                },
                else => break,
            }
        }

        info!(
            cycles = self.stats.cycles,
            subscriptions = self.registry.len(),
            "Data provider stopped"
        );
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::GetByPath { pattern, reply } => {
                let result = self.store.get_by_path(&pattern);
                if let Err(e) = &result {
                    debug!(%pattern, error = %e, "Query failed");
                }
                let _ = reply.send(result);
            }
            Request::Subscribe {
                channel,
                pattern,
                reply,
            } => {
                let result = self
                    .registry
                    .subscribe(&channel, &pattern)
                    .map_err(VisError::from);
                match &result {
                    Ok(id) => debug!(%id, %pattern, "Subscription added"),
                    Err(e) => debug!(%pattern, error = %e, "Subscription rejected"),
                }
                let _ = reply.send(result);
            }
            Request::Unsubscribe { channel, id, reply } => {
                let result = id
                    .parse::<SubscriptionId>()
                    .and_then(|id| self.registry.unsubscribe(&channel, id));
                if result.is_ok() {
                    debug!(%id, "Subscription removed");
                    if self.registry.subscriptions_of(&channel).is_empty() {
                        self.delivery.forget(&channel);
                    }
                }
                let _ = reply.send(result);
            }
            Request::UnsubscribeAll { channel, reply } => {
                let removed = self.registry.unsubscribe_all(&channel);
                self.delivery.forget(&channel);
                if removed > 0 {
                    debug!(removed, "Channel unsubscribed");
                }
                let _ = reply.send(removed);
            }
            Request::Apply { batch, reply } => {
                let report = self.process_batch(batch).await;
                let _ = reply.send(report);
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.stats.snapshot(
                    self.store.len(),
                    self.registry.len(),
                    self.registry.channel_count(),
                ));
            }
            Request::Shutdown => {}
        }
    }

    /// Apply one batch and deliver its notifications.
    async fn process_batch(&mut self, batch: UpdateBatch) -> CycleReport {
        let mut report = CycleReport::default();
        let mut changed = Vec::new();

        for update in batch {
            let result = self.store.apply(&update);
            if !result.known {
                warn!(path = %update.path, "Ignoring update for unknown path");
                report.unknown += 1;
                continue;
            }
            report.applied += 1;
            if result.changed {
                debug!(path = %update.path, value = %update.value, "Value changed");
                changed.push(update);
            }
        }
        report.changed = changed.len();

        let notifications = build_notifications(&self.registry, &changed);
        let mut evicted: Vec<SubscriberChannel> = Vec::new();

        for notification in notifications {
            if evicted.iter().any(|c| c.same_channel(&notification.channel)) {
                report.dropped += 1;
                continue;
            }

            let id = notification.output.id.clone();
            match self
                .delivery
                .deliver(&notification.channel, notification.output)
                .await
            {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Dropped { timeouts } => {
                    warn!(subscription = %id, timeouts, "Subscriber channel full, notification dropped");
                    report.dropped += 1;
                }
                DeliveryOutcome::Evict(reason) => {
                    let removed = self.registry.unsubscribe_all(&notification.channel);
                    self.delivery.forget(&notification.channel);
                    warn!(
                        subscription = %id,
                        ?reason,
                        removed,
                        "Subscriber channel evicted"
                    );
                    report.dropped += 1;
                    report.evicted += 1;
                    evicted.push(notification.channel);
                }
            }
        }

        self.stats.record_cycle(&report);
        report
    }
}

/// Cloneable handle to a running [`DataProvider`].
#[derive(Debug, Clone)]
pub struct DataProviderHandle {
    requests: mpsc::Sender<Request>,
    updates: mpsc::Sender<UpdateBatch>,
}

impl DataProviderHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, ProviderError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| ProviderError::Stopped)?;
        response.await.map_err(|_| ProviderError::Stopped)
    }

    /// Current values of every path matching the pattern.
    pub async fn get_by_path(&self, pattern: &str) -> Result<BTreeMap<String, Value>, ProviderError> {
        let pattern = pattern.to_string();
        Ok(self
            .request(|reply| Request::GetByPath { pattern, reply })
            .await??)
    }

    /// Subscribe a delivery channel to changes matching the pattern.
    pub async fn subscribe(
        &self,
        channel: &NotificationSender,
        pattern: &str,
    ) -> Result<SubscriptionId, ProviderError> {
        let channel = SubscriberChannel::new(channel.clone());
        let pattern = pattern.to_string();
        Ok(self
            .request(|reply| Request::Subscribe {
                channel,
                pattern,
                reply,
            })
            .await??)
    }

    /// Remove one subscription of a channel.
    ///
    /// An id that was never issued on this channel is `NotFound`.
    pub async fn unsubscribe(&self, channel: &NotificationSender, id: &str) -> Result<(), ProviderError> {
        let channel = SubscriberChannel::new(channel.clone());
        let id = id.to_string();
        Ok(self
            .request(|reply| Request::Unsubscribe { channel, id, reply })
            .await??)
    }

    /// Remove every subscription of a channel. Succeeds even if there were none.
    pub async fn unsubscribe_all(&self, channel: &NotificationSender) -> Result<(), ProviderError> {
        let channel = SubscriberChannel::new(channel.clone());
        self.request(|reply| Request::UnsubscribeAll { channel, reply })
            .await
            .map(|_| ())
    }

    /// Apply a batch and wait until its notifications have been delivered.
    pub async fn apply(&self, batch: UpdateBatch) -> Result<CycleReport, ProviderError> {
        self.request(|reply| Request::Apply { batch, reply }).await
    }

    /// Queue a batch without waiting for it to be processed.
    pub async fn ingest(&self, batch: UpdateBatch) -> Result<(), ProviderError> {
        self.updates
            .send(batch)
            .await
            .map_err(|_| ProviderError::Stopped)
    }

    /// Sender for data-source adapters.
    pub fn update_sender(&self) -> mpsc::Sender<UpdateBatch> {
        self.updates.clone()
    }

    /// Snapshot of the provider statistics.
    pub async fn stats(&self) -> Result<ProviderStats, ProviderError> {
        self.request(|reply| Request::Stats { reply }).await
    }

    /// Ask the loop to stop after the event it is currently processing.
    pub async fn shutdown(&self) -> Result<(), ProviderError> {
        self.requests
            .send(Request::Shutdown)
            .await
            .map_err(|_| ProviderError::Stopped)
    }

    /// True while the provider loop is accepting requests.
    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }
}
