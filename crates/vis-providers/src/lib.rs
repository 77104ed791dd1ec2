//! # vis-providers
//!
//! Data-source adapters for the vehicle data provider.
//!
//! An adapter reads signals from some source (a CAN bus, a simulator, a
//! recorded trace) and pushes ordered update batches into the provider's
//! update queue. Adapters never touch the store directly.
//!
//! - [`DemoEngineAdapter`]: simulated engine RPM and power

pub mod demo;

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;
use vis_core::Update;

pub use demo::DemoEngineAdapter;

/// Sending side of the provider's update queue.
pub type UpdateSink = mpsc::Sender<Vec<Update>>;

/// Errors that stop an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider's update queue is closed.
    #[error("Update sink closed")]
    SinkClosed,
}

/// A source of update batches.
pub trait VisDataAdapter {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produce batches into `sink` until the source ends or the sink closes.
    fn run(self, sink: UpdateSink) -> impl Future<Output = Result<(), AdapterError>> + Send;
}
