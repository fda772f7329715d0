use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::ChannelKind;

/// One channel registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Application-facing channel id.
    pub id: u8,
    /// Delivery policy.
    pub kind: ChannelKind,
}

/// Ordered list of channels to register on a handler.
///
/// Both peers must register the same channels in the same order: the
/// wire carries registration indices, not ids.
///
/// ```json
/// {
///   "channels": [
///     { "id": 0, "kind": "reliable_ordered" },
///     { "id": 1, "kind": "unreliable_ordered" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsConfig {
    pub channels: Vec<ChannelSpec>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelSpec {
                    id: 0,
                    kind: ChannelKind::ReliableOrdered,
                },
                ChannelSpec {
                    id: 1,
                    kind: ChannelKind::UnreliableOrdered,
                },
            ],
        }
    }
}

impl ChannelsConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
