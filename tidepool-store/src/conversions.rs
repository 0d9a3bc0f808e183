use tidepool_sdk::{Bytes32, TradeRecord, TradeStatus, decode_coins, encode_coins};

use crate::error::StoreError;
use crate::models::{NewTradeRow, TradeRow};

pub fn vec_to_array32(v: &[u8], field: &str) -> Result<Bytes32, StoreError> {
    v.try_into().map_err(|_| {
        StoreError::InvalidData(format!("{field}: expected 32 bytes, got {}", v.len()))
    })
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_trade_row(record: &TradeRecord) -> NewTradeRow {
    NewTradeRow {
        trade_id: record.trade_id.to_vec(),
        status: record.status.as_i32(),
        offer_bytes: record.offer.clone(),
        created_at: record.created_at as i64,
        accepted_at: record.accepted_at.map(|t| t as i64),
        confirmed_at_height: record.confirmed_at_height as i32,
        is_my_offer: record.is_my_offer,
        coins_of_interest: encode_coins(&record.coins_of_interest),
        sent_to: serde_json::to_string(&record.sent_to).unwrap_or_else(|_| "[]".to_string()),
        updated_at: now_rfc3339(),
    }
}

impl TryFrom<&TradeRow> for TradeRecord {
    type Error = StoreError;

    fn try_from(row: &TradeRow) -> Result<Self, Self::Error> {
        let status = TradeStatus::from_i32(row.status).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid trade status: {}", row.status))
        })?;
        let coins_of_interest = decode_coins(&row.coins_of_interest)
            .map_err(|e| StoreError::InvalidData(format!("coins_of_interest: {e}")))?;
        let sent_to: Vec<String> = serde_json::from_str(&row.sent_to)
            .map_err(|e| StoreError::InvalidData(format!("sent_to: {e}")))?;

        Ok(TradeRecord {
            trade_id: vec_to_array32(&row.trade_id, "trade_id")?,
            created_at: row.created_at as u64,
            accepted_at: row.accepted_at.map(|t| t as u64),
            confirmed_at_height: row.confirmed_at_height as u32,
            is_my_offer: row.is_my_offer,
            offer: row.offer_bytes.clone(),
            coins_of_interest,
            status,
            sent_to,
        })
    }
}
