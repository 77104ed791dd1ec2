//! # vis-server
//!
//! Tokio runtime for the vehicle data provider.
//!
//! The [`DataProvider`] is a single serialized actor that owns the value
//! store and the subscription registry. Everything else talks to it through
//! a cloneable [`DataProviderHandle`]:
//!
//! ```text
//! adapter ──batches──► DataProvider ──SubscriptionOutput──► subscriber channels
//!                          ▲
//! sessions / HTTP ──requests (get, subscribe, unsubscribe)
//! ```

pub mod access;
pub mod delivery;
pub mod provider;
pub mod session;
pub mod stats;

pub use access::{AllowAll, PathAccess, PublicPaths};
pub use delivery::{DeliveryOutcome, DeliveryPolicy, EvictReason, NotificationSender, SubscriberChannel};
pub use provider::{CycleReport, DataProvider, DataProviderHandle, UpdateBatch};
pub use session::ClientSession;
pub use stats::ProviderStats;

pub use vis_core::{SubscriptionId, SubscriptionOutput, Update, Value, VisError};

use thiserror::Error;

/// Errors returned by the provider handle and client sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request reached the provider and failed there.
    #[error(transparent)]
    Vis(#[from] VisError),

    /// The access policy does not allow the requested pattern.
    #[error("Access to '{0}' is not permitted")]
    Forbidden(String),

    /// The provider loop is not running.
    #[error("Data provider is not running")]
    Stopped,
}
