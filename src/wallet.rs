use std::sync::Arc;

use async_trait::async_trait;

use crate::bundle::SpendBundle;
use crate::coin::{Bytes32, Coin, CoinState, WalletCoinRecord};
use crate::error::Result;

/// What a wallet trades as. Only base and colored wallets participate in
/// offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletKind {
    Base,
    Colored,
    Other,
}

/// Direction of a trade-derived transaction-history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    IncomingTrade,
    OutgoingTrade,
}

/// A wallet-side transaction row. Rows without a bundle are history entries;
/// the row carrying a bundle is picked up by the wallet push pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub name: Bytes32,
    pub created_at: u64,
    pub confirmed_at_height: u32,
    pub confirmed: bool,
    pub to_puzzle_hash: Bytes32,
    pub amount: u64,
    pub fee_amount: u64,
    pub wallet_id: u32,
    pub kind: TransactionType,
    pub trade_id: Option<Bytes32>,
    pub spend_bundle: Option<SpendBundle>,
    pub additions: Vec<Coin>,
    pub removals: Vec<Coin>,
    pub memos: Vec<(Bytes32, Vec<Vec<u8>>)>,
}

/// One wallet the trade manager can draw on. The wallet owns coin selection
/// and signing; the trade manager only names destinations and coin sets.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn id(&self) -> u32;

    fn kind(&self) -> WalletKind;

    /// The 32-byte color tag. `None` unless `kind()` is `Colored`.
    fn color(&self) -> Option<Bytes32>;

    async fn get_new_puzzle_hash(&self) -> Result<Bytes32>;

    async fn get_confirmed_balance(&self) -> Result<u64>;

    /// Pick unlocked confirmed coins totalling at least `amount`, reserving
    /// them against concurrent selection.
    async fn select_coins(&self, amount: u64) -> Result<Vec<Coin>>;

    /// Produce signed transactions paying `amounts[i]` to `puzzle_hashes[i]`,
    /// spending exactly `coins`. Colored wallets wrap destinations in the
    /// colored layer themselves.
    async fn generate_signed_transaction(
        &self,
        amounts: Vec<u64>,
        puzzle_hashes: Vec<Bytes32>,
        fee: u64,
        coins: Vec<Coin>,
        ignore_max_send_amount: bool,
    ) -> Result<Vec<TransactionRecord>>;

    /// Strip the colored wrapper from a puzzle hash; identity for base
    /// wallets.
    async fn convert_puzzle_hash(&self, puzzle_hash: Bytes32) -> Bytes32;
}

/// Capability handle onto the node's wallets and its ledger view. The trade
/// manager resolves wallets through this at call time and never keeps
/// per-wallet references of its own.
#[async_trait]
pub trait WalletStateManager: Send + Sync {
    async fn wallet(&self, wallet_id: u32) -> Option<Arc<dyn Wallet>>;

    /// The base-asset wallet, always present.
    async fn main_wallet(&self) -> Arc<dyn Wallet>;

    /// Look up which of the given coins are ours, with their owning wallets.
    async fn get_multiple_coin_records(
        &self,
        coin_ids: &[Bytes32],
    ) -> Result<Vec<WalletCoinRecord>>;

    /// Current ledger state for the given coin ids. Unknown ids are omitted.
    async fn get_coin_state(&self, coin_ids: &[Bytes32]) -> Result<Vec<CoinState>>;

    async fn get_wallet_for_coin(&self, coin_id: &Bytes32) -> Result<Option<Arc<dyn Wallet>>>;

    async fn get_wallet_for_color(&self, color: &Bytes32) -> Result<Option<Arc<dyn Wallet>>>;

    async fn get_wallet_id_for_puzzle_hash(&self, puzzle_hash: &Bytes32) -> Result<Option<u32>>;

    /// Queue a transaction for broadcast by the push pipeline.
    async fn add_pending_transaction(&self, tx: TransactionRecord) -> Result<()>;

    /// Record a history-only transaction row.
    async fn add_transaction(&self, tx: TransactionRecord) -> Result<()>;

    /// Create a tracking wallet for a colored asset we are about to receive.
    async fn create_colored_wallet(&self, color: Bytes32) -> Result<Arc<dyn Wallet>>;
}
