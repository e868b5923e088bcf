use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::BorkType;

/// A decoded social action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorkTxData {
    /// Timestamp of the containing block
    pub timestamp: DateTime<Utc>,
    pub txid: String,
    #[serde(rename = "type")]
    pub bork_type: BorkType,
    pub nonce: Option<u8>,
    /// Position of the first payload, for extensions
    pub position: Option<u8>,
    /// Position of the last extension payload reassembled into this record
    pub last_position: Option<u8>,
    /// Referenced bork id prefix, or referenced address
    pub reference_id: Option<String>,
    pub content: Option<String>,
    pub sender_address: String,
    pub recipient_address: Option<String>,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
}

impl BorkTxData {
    /// Position the next extension of this bork would carry
    pub fn next_position(&self) -> u16 {
        self.last_position.unwrap_or(0) as u16 + 1
    }
}
