use serde::{Deserialize, Serialize};

use crate::coin::{Bytes32, Coin};

/// Lifecycle state of a trade.
///
/// `PendingAccept`, `PendingConfirm`, and `PendingCancel` are open; the rest
/// are terminal and sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    PendingAccept = 0,
    PendingConfirm = 1,
    PendingCancel = 2,
    Confirmed = 3,
    Cancelled = 4,
    Failed = 5,
}

impl TradeStatus {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(TradeStatus::PendingAccept),
            1 => Some(TradeStatus::PendingConfirm),
            2 => Some(TradeStatus::PendingCancel),
            3 => Some(TradeStatus::Confirmed),
            4 => Some(TradeStatus::Cancelled),
            5 => Some(TradeStatus::Failed),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TradeStatus::PendingAccept | TradeStatus::PendingConfirm | TradeStatus::PendingCancel
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

/// Persisted record of a trade we initiated or accepted. Never destroyed;
/// only `status`, `confirmed_at_height`, and `sent_to` mutate after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Canonical hash of `offer`; equal offers collapse to one record.
    pub trade_id: Bytes32,
    pub created_at: u64,
    pub accepted_at: Option<u64>,
    pub confirmed_at_height: u32,
    pub is_my_offer: bool,
    /// The offer blob in canonical form.
    pub offer: Vec<u8>,
    /// The offer's involved coins, frozen at record creation.
    pub coins_of_interest: Vec<Coin>,
    pub status: TradeStatus,
    /// Peers the offer was sent to, maintained by the push pipeline.
    pub sent_to: Vec<String>,
}
