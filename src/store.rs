use std::collections::HashMap;

use crate::coin::Bytes32;
use crate::trade_record::{TradeRecord, TradeStatus};

/// Trait abstracting trade persistence as the manager needs it.
///
/// Defined here so persistence backends can live in their own crate without
/// a circular dependency; `tidepool-store` implements it over SQLite.
pub trait TradeStore: Send + 'static {
    /// Insert or replace the record keyed by its trade id. Re-adding an
    /// equal record is a no-op.
    fn add_trade_record(&mut self, record: &TradeRecord) -> Result<(), String>;

    fn get_trade_record(&mut self, trade_id: &Bytes32) -> Result<Option<TradeRecord>, String>;

    fn get_all_trades(&mut self) -> Result<Vec<TradeRecord>, String>;

    fn get_trades_with_status(
        &mut self,
        status: TradeStatus,
    ) -> Result<Vec<TradeRecord>, String>;

    /// Update a trade's status, and its confirmation height when given.
    fn set_status(
        &mut self,
        trade_id: &Bytes32,
        status: TradeStatus,
        confirmed_at_height: Option<u32>,
    ) -> Result<(), String>;
}

/// In-memory [`TradeStore`] for tests and store-less embedding.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    trades: HashMap<Bytes32, TradeRecord>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TradeStore for MemoryTradeStore {
    fn add_trade_record(&mut self, record: &TradeRecord) -> Result<(), String> {
        self.trades.insert(record.trade_id, record.clone());
        Ok(())
    }

    fn get_trade_record(&mut self, trade_id: &Bytes32) -> Result<Option<TradeRecord>, String> {
        Ok(self.trades.get(trade_id).cloned())
    }

    fn get_all_trades(&mut self) -> Result<Vec<TradeRecord>, String> {
        let mut trades: Vec<TradeRecord> = self.trades.values().cloned().collect();
        trades.sort_by_key(|t| (t.created_at, t.trade_id));
        Ok(trades)
    }

    fn get_trades_with_status(
        &mut self,
        status: TradeStatus,
    ) -> Result<Vec<TradeRecord>, String> {
        Ok(self
            .get_all_trades()?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    fn set_status(
        &mut self,
        trade_id: &Bytes32,
        status: TradeStatus,
        confirmed_at_height: Option<u32>,
    ) -> Result<(), String> {
        let record = self
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| format!("no trade with id {}", hex::encode(trade_id)))?;
        record.status = status;
        if let Some(height) = confirmed_at_height {
            record.confirmed_at_height = height;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::Coin;

    fn record(id: u8, status: TradeStatus) -> TradeRecord {
        TradeRecord {
            trade_id: [id; 32],
            created_at: id as u64,
            accepted_at: None,
            confirmed_at_height: 0,
            is_my_offer: true,
            offer: vec![id],
            coins_of_interest: vec![Coin::new([id; 32], [0x10; 32], 100)],
            status,
            sent_to: vec![],
        }
    }

    #[test]
    fn add_is_idempotent_on_equal_records() {
        let mut store = MemoryTradeStore::new();
        let r = record(1, TradeStatus::PendingAccept);
        store.add_trade_record(&r).unwrap();
        store.add_trade_record(&r).unwrap();
        assert_eq!(store.get_all_trades().unwrap(), vec![r]);
    }

    #[test]
    fn status_scan_filters() {
        let mut store = MemoryTradeStore::new();
        store
            .add_trade_record(&record(1, TradeStatus::PendingAccept))
            .unwrap();
        store
            .add_trade_record(&record(2, TradeStatus::Confirmed))
            .unwrap();
        let pending = store
            .get_trades_with_status(TradeStatus::PendingAccept)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].trade_id, [1; 32]);
    }

    #[test]
    fn set_status_updates_height_only_when_given() {
        let mut store = MemoryTradeStore::new();
        store
            .add_trade_record(&record(1, TradeStatus::PendingConfirm))
            .unwrap();
        store
            .set_status(&[1; 32], TradeStatus::Confirmed, Some(42))
            .unwrap();
        let r = store.get_trade_record(&[1; 32]).unwrap().unwrap();
        assert_eq!(r.status, TradeStatus::Confirmed);
        assert_eq!(r.confirmed_at_height, 42);

        store
            .set_status(&[1; 32], TradeStatus::Confirmed, None)
            .unwrap();
        let r = store.get_trade_record(&[1; 32]).unwrap().unwrap();
        assert_eq!(r.confirmed_at_height, 42);
    }

    #[test]
    fn set_status_on_unknown_trade_errors() {
        let mut store = MemoryTradeStore::new();
        assert!(
            store
                .set_status(&[9; 32], TradeStatus::Cancelled, None)
                .is_err()
        );
    }
}
