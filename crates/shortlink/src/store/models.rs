//! Link data model.

use serde::{Deserialize, Serialize};

/// A short name pointing at a target URL, owned by the identity that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub key: String,
    pub value: String,
    pub owner: String,
}

impl Link {
    /// Serialized form stored in the `links` table.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a link previously produced by [`Link::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
