//! Vehicle signal data model types.
//!
//! These types describe what flows through the store:
//! - Signal values as an explicit Scalar / Array variant
//! - Data points (the stored entry for one path)
//! - Updates produced by data-source adapters
//! - Subscription output records delivered to subscribers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar signal value.
///
/// The variant is part of equality: `Int(1)` and `Float(1.0)` are different
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A signal value: either a scalar or an array of scalars.
///
/// Serialized untagged, so JSON `3000` is `Scalar(Int(3000))` and
/// `["User1"]` is `Array([String("User1")])`. Objects and `null` have no
/// variant and fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => s.fmt(f),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt(f)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v.into())
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(v.into())
                }
            }

            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    Value::Array(items.into_iter().map(Scalar::from).collect())
                }
            }
        )*
    };
}

impl_scalar_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    &str => String,
    String => String,
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(items: Vec<Scalar>) -> Self {
        Value::Array(items)
    }
}

/// The stored entry for one monitored signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Dotted signal path (e.g., "Signal.Drivetrain.InternalCombustionEngine.RPM")
    pub path: String,

    /// Current value
    pub value: Value,

    /// True once a real update was applied, or when seeded with a known-good default
    #[serde(default)]
    pub initialized: bool,
}

impl DataPoint {
    /// Create an uninitialized data point holding a seed value.
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            initialized: false,
        }
    }

    /// Mark the seed value as known-good (or not).
    pub fn with_initialized(mut self, initialized: bool) -> Self {
        self.initialized = initialized;
        self
    }
}

/// A single path-value update produced by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// The signal path
    pub path: String,

    /// The new value at this path
    pub value: Value,
}

impl Update {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// One batched change notification for a single subscription.
///
/// # Example
/// ```json
/// {
///   "subscriptionID": "1",
///   "data": { "Signal.Drivetrain.InternalCombustionEngine.RPM": 3000 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOutput {
    /// Identifier returned by the subscribe call
    #[serde(rename = "subscriptionID")]
    pub id: String,

    /// Changed paths of one ingestion cycle, ordered by path
    pub data: BTreeMap<String, Value>,
}
