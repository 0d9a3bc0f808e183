//! Trade management for a UTXO ledger with a native base asset and colored
//! fungible assets: build partial offers, complete counterparty offers into
//! atomic settlement bundles, and track every trade's lifecycle against
//! on-ledger coin events.

pub mod asset;
pub mod bundle;
pub mod codec;
pub mod coin;
pub mod error;
pub mod manager;
pub mod offer;
pub mod payment;
pub mod settlement;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trade_record;
pub mod wallet;

// Core types
pub use asset::Asset;
pub use bundle::{CoinSpend, Condition, Signature, SpendBundle};
pub use coin::{Bytes32, Coin, CoinState, WalletCoinRecord, hash_coin_id_list, hash_coin_list, hash_pair};
pub use error::{Error, Result};
pub use offer::Offer;
pub use payment::{NotarizedPayment, Payment};
pub use settlement::{Announcement, SETTLEMENT_PH, cat_puzzle_hash, settlement_puzzle_hash};

// Records and state machine
pub use trade_record::{TradeRecord, TradeStatus};
pub use wallet::{TransactionRecord, TransactionType, Wallet, WalletKind, WalletStateManager};

// Manager and persistence seam
pub use manager::TradeManager;
pub use store::{MemoryTradeStore, TradeStore};

// Offer blob helpers
pub use codec::{decode_coins, encode_coins, parse_offer, serialize_offer};
