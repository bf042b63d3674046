//! Status envelope and plugin snapshot values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded status message, cheap to clone across subscriber queues.
pub type Frame = axum::extract::ws::Utf8Bytes;

/// Payload sent to a subscriber that joins before the first round.
pub const NO_DATA_YET: &str = "{}";

/// Errors produced while encoding or decoding status messages.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Failed to encode status: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode status: {0}")]
    Decode(#[source] serde_json::Error),
}

/// System load averages over 1, 5 and 15 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadAvg {
    pub load1min: f64,
    pub load5min: f64,
    pub load15min: f64,
}

/// Capacity usage of a resource such as memory or swap, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

impl Usage {
    /// Build usage figures from a total and a free amount.
    pub fn from_total_free(total: u64, free: u64) -> Self {
        let used = total.saturating_sub(free);
        let used_percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };
        Self {
            total,
            used,
            free,
            used_percent,
        }
    }
}

/// One plugin's value for a single collection round.
///
/// Serialized without a tag so the wire carries only the value itself.
/// Plugins outside this crate report through [`Snapshot::Value`].
///
/// Decoding picks the first variant whose shape fits, so an opaque value
/// shaped like [`LoadAvg`] comes back as `LoadAvg`. Equality therefore
/// compares the JSON each side encodes to, not the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    LoadAvg(LoadAvg),
    Usage(Usage),
    Value(serde_json::Value),
}

impl Snapshot {
    /// The JSON this snapshot puts on the wire.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Snapshot::Value(value) => value.clone(),
            typed => serde_json::to_value(typed).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Snapshot::LoadAvg(a), Snapshot::LoadAvg(b)) => a == b,
            (Snapshot::Usage(a), Snapshot::Usage(b)) => a == b,
            (Snapshot::Value(a), Snapshot::Value(b)) => a == b,
            _ => self.to_json() == other.to_json(),
        }
    }
}

impl From<LoadAvg> for Snapshot {
    fn from(value: LoadAvg) -> Self {
        Snapshot::LoadAvg(value)
    }
}

impl From<Usage> for Snapshot {
    fn from(value: Usage) -> Self {
        Snapshot::Usage(value)
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        Snapshot::Value(value)
    }
}

/// Aggregate of one collection round: `{"metrics": {name: value}}`.
///
/// `metrics` is `None` only for the "no data yet" sentinel, which encodes
/// as `{}`. An empty round still encodes as `{"metrics":{}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, Snapshot>>,
}

impl Status {
    /// The sentinel sent before any round has been published.
    pub fn pending() -> Self {
        Self { metrics: None }
    }

    /// Wrap the successful snapshots of one round.
    pub fn from_metrics(metrics: BTreeMap<String, Snapshot>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// True for the "no data yet" sentinel.
    pub fn is_pending(&self) -> bool {
        self.metrics.is_none()
    }

    /// Look up a single plugin's value.
    pub fn get(&self, plugin: &str) -> Option<&Snapshot> {
        self.metrics.as_ref().and_then(|m| m.get(plugin))
    }

    pub fn encode(&self) -> Result<Frame, WireError> {
        serde_json::to_string(self)
            .map(Frame::from)
            .map_err(WireError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Decode)
    }
}

/// Frame for [`NO_DATA_YET`].
pub fn no_data_yet() -> Frame {
    Frame::from(NO_DATA_YET)
}
