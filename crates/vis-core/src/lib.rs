//! # vis-core
//!
//! Core vehicle signal data store and subscription engine.
//!
//! This crate provides:
//! - Signal value model (Scalar / Array variants, DataPoint, Update)
//! - Path pattern parsing and wildcard matching
//! - The current-value store with change detection
//! - Subscription registry and per-cycle notification batching (without I/O)
//! - Seed and runtime configuration
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! The serialized actor that owns these structures lives in `vis-server`.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod path;
pub mod store;
pub mod subscription;

pub use dispatch::{build_notifications, Notification};
pub use error::VisError;
pub use model::*;
pub use path::{PathPattern, PatternError};
pub use store::{ChangeResult, ValueStore};
pub use subscription::{ChannelKey, Subscription, SubscriptionId, SubscriptionRegistry};
