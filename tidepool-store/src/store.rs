use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use tidepool_sdk::store::TradeStore;
use tidepool_sdk::{Bytes32, TradeRecord, TradeStatus};

use crate::conversions::{new_trade_row, now_rfc3339};
use crate::error::StoreError;
use crate::models::TradeRow;
use crate::schema::trades;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Persistent storage for trade records.
///
/// All methods take `&mut self` because Diesel's `SqliteConnection` requires
/// `&mut` for all operations, including reads.
pub struct TidepoolStore {
    conn: SqliteConnection,
}

impl TidepoolStore {
    /// Open (or create) a store at the given file path. Runs migrations
    /// automatically.
    pub fn open(path: &str) -> crate::Result<Self> {
        let mut conn = SqliteConnection::establish(path)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(TidepoolStore { conn })
    }

    /// Open an in-memory store for tests.
    pub fn open_in_memory() -> crate::Result<Self> {
        let mut conn = SqliteConnection::establish(":memory:")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(TidepoolStore { conn })
    }

    /// Insert or replace the record keyed by its trade id.
    pub fn add_trade_record(&mut self, record: &TradeRecord) -> crate::Result<()> {
        let row = new_trade_row(record);
        diesel::replace_into(trades::table)
            .values(&row)
            .execute(&mut self.conn)?;
        Ok(())
    }

    pub fn get_trade_record(
        &mut self,
        trade_id: &Bytes32,
    ) -> crate::Result<Option<TradeRecord>> {
        let row: Option<TradeRow> = trades::table
            .filter(trades::trade_id.eq(trade_id.to_vec()))
            .select(TradeRow::as_select())
            .first(&mut self.conn)
            .optional()?;
        row.as_ref().map(TradeRecord::try_from).transpose()
    }

    pub fn get_all_trades(&mut self) -> crate::Result<Vec<TradeRecord>> {
        let rows: Vec<TradeRow> = trades::table
            .order((trades::created_at.asc(), trades::trade_id.asc()))
            .select(TradeRow::as_select())
            .load(&mut self.conn)?;
        rows.iter().map(TradeRecord::try_from).collect()
    }

    pub fn get_trades_with_status(
        &mut self,
        status: TradeStatus,
    ) -> crate::Result<Vec<TradeRecord>> {
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::status.eq(status.as_i32()))
            .order((trades::created_at.asc(), trades::trade_id.asc()))
            .select(TradeRow::as_select())
            .load(&mut self.conn)?;
        rows.iter().map(TradeRecord::try_from).collect()
    }

    /// Update a trade's status, and its confirmation height when given.
    pub fn set_status(
        &mut self,
        trade_id: &Bytes32,
        status: TradeStatus,
        confirmed_at_height: Option<u32>,
    ) -> crate::Result<()> {
        let target = trades::table.filter(trades::trade_id.eq(trade_id.to_vec()));
        let updated = match confirmed_at_height {
            Some(height) => diesel::update(target)
                .set((
                    trades::status.eq(status.as_i32()),
                    trades::confirmed_at_height.eq(height as i32),
                    trades::updated_at.eq(now_rfc3339()),
                ))
                .execute(&mut self.conn)?,
            None => diesel::update(target)
                .set((
                    trades::status.eq(status.as_i32()),
                    trades::updated_at.eq(now_rfc3339()),
                ))
                .execute(&mut self.conn)?,
        };
        if updated == 0 {
            return Err(StoreError::InvalidData(format!(
                "no trade with id {}",
                hex::encode(trade_id)
            )));
        }
        Ok(())
    }
}

impl TradeStore for TidepoolStore {
    fn add_trade_record(&mut self, record: &TradeRecord) -> Result<(), String> {
        TidepoolStore::add_trade_record(self, record).map_err(|e| e.to_string())
    }

    fn get_trade_record(&mut self, trade_id: &Bytes32) -> Result<Option<TradeRecord>, String> {
        TidepoolStore::get_trade_record(self, trade_id).map_err(|e| e.to_string())
    }

    fn get_all_trades(&mut self) -> Result<Vec<TradeRecord>, String> {
        TidepoolStore::get_all_trades(self).map_err(|e| e.to_string())
    }

    fn get_trades_with_status(
        &mut self,
        status: TradeStatus,
    ) -> Result<Vec<TradeRecord>, String> {
        TidepoolStore::get_trades_with_status(self, status).map_err(|e| e.to_string())
    }

    fn set_status(
        &mut self,
        trade_id: &Bytes32,
        status: TradeStatus,
        confirmed_at_height: Option<u32>,
    ) -> Result<(), String> {
        TidepoolStore::set_status(self, trade_id, status, confirmed_at_height)
            .map_err(|e| e.to_string())
    }
}
