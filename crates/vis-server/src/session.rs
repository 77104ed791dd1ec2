//! Per-client view of the data provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;
use vis_core::{PathPattern, SubscriptionId, SubscriptionOutput, Value, VisError};

use crate::access::PathAccess;
use crate::delivery::NotificationSender;
use crate::provider::DataProviderHandle;
use crate::ProviderError;

/// One client connection: a provider handle, an access policy and the
/// client's delivery channel.
///
/// Patterns are compiled before the access check, so a malformed pattern is
/// reported as `InvalidPattern` rather than `Forbidden`.
#[derive(Clone)]
pub struct ClientSession {
    handle: DataProviderHandle,
    access: Arc<dyn PathAccess>,
    channel: NotificationSender,
}

impl ClientSession {
    /// Open a session with a fresh delivery channel of the given capacity.
    pub fn open(
        handle: DataProviderHandle,
        access: Arc<dyn PathAccess>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<SubscriptionOutput>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(handle, access, tx), rx)
    }

    pub fn new(handle: DataProviderHandle, access: Arc<dyn PathAccess>, channel: NotificationSender) -> Self {
        Self {
            handle,
            access,
            channel,
        }
    }

    pub fn channel(&self) -> &NotificationSender {
        &self.channel
    }

    fn authorize(&self, pattern: &str) -> Result<(), ProviderError> {
        let compiled = PathPattern::new(pattern).map_err(VisError::from)?;
        if self.access.is_permitted(&compiled) {
            Ok(())
        } else {
            debug!(%pattern, "Access denied");
            Err(ProviderError::Forbidden(pattern.to_string()))
        }
    }

    pub async fn get(&self, pattern: &str) -> Result<BTreeMap<String, Value>, ProviderError> {
        self.authorize(pattern)?;
        self.handle.get_by_path(pattern).await
    }

    pub async fn subscribe(&self, pattern: &str) -> Result<SubscriptionId, ProviderError> {
        self.authorize(pattern)?;
        self.handle.subscribe(&self.channel, pattern).await
    }

    pub async fn unsubscribe(&self, id: &str) -> Result<(), ProviderError> {
        self.handle.unsubscribe(&self.channel, id).await
    }

    /// Drop every subscription of this session. Called on disconnect.
    pub async fn close(&self) -> Result<(), ProviderError> {
        self.handle.unsubscribe_all(&self.channel).await
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
