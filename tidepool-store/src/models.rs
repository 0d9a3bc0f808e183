use diesel::prelude::*;

use crate::schema::trades;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = trades)]
pub struct TradeRow {
    pub trade_id: Vec<u8>,
    pub status: i32,
    pub offer_bytes: Vec<u8>,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub confirmed_at_height: i32,
    pub is_my_offer: bool,
    pub coins_of_interest: Vec<u8>,
    pub sent_to: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = trades)]
pub struct NewTradeRow {
    pub trade_id: Vec<u8>,
    pub status: i32,
    pub offer_bytes: Vec<u8>,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub confirmed_at_height: i32,
    pub is_my_offer: bool,
    pub coins_of_interest: Vec<u8>,
    pub sent_to: String,
    pub updated_at: String,
}
