use thiserror::Error;

use crate::coin::Bytes32;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no wallet with id {0}")]
    UnknownWallet(u32),

    #[error("offers are not implemented for wallet {0} (unsupported asset type)")]
    UnsupportedAsset(u32),

    #[error("insufficient funds in wallet {wallet_id}: have {available}, need {needed}")]
    InsufficientFunds {
        wallet_id: u32,
        available: u64,
        needed: u64,
    },

    #[error("coin selection failed: {0}")]
    CoinSelection(String),

    #[error("do not have a colored asset wallet for asset ID: {}", hex::encode(.0))]
    AssetNotHeld(Bytes32),

    #[error("malformed offer blob: {0}")]
    Parse(String),

    #[error("offer is not self-consistent: {0}")]
    NotSelfConsistent(String),

    #[error("aggregated offer does not balance: {0}")]
    InvalidAggregate(String),

    #[error("trade store error: {0}")]
    Storage(String),

    #[error("wallet error: {0}")]
    Wallet(String),
}

pub type Result<T> = std::result::Result<T, Error>;
