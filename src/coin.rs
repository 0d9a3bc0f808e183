use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 32-byte hash, the ledger's universal identifier width.
pub type Bytes32 = [u8; 32];

/// An unspent output on the ledger. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    pub parent_coin_id: Bytes32,
    pub puzzle_hash: Bytes32,
    pub amount: u64,
}

impl Coin {
    pub fn new(parent_coin_id: Bytes32, puzzle_hash: Bytes32, amount: u64) -> Self {
        Self {
            parent_coin_id,
            puzzle_hash,
            amount,
        }
    }

    /// Unique coin id.
    ///
    /// ```text
    /// coin_id = SHA256(
    ///     "tidepool/coin_id" ||
    ///     parent_coin_id     ||    // 32 bytes
    ///     puzzle_hash        ||    // 32 bytes
    ///     amount                   //  8 bytes (big-endian)
    /// )
    /// ```
    pub fn coin_id(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool/coin_id");
        hasher.update(self.parent_coin_id);
        hasher.update(self.puzzle_hash);
        hasher.update(self.amount.to_be_bytes());
        hasher.finalize().into()
    }
}

/// SHA256 over the concatenation of two 32-byte values. Used for stable
/// derived names (`hash_pair(bundle_id, coin_id)` and the like).
pub fn hash_pair(a: &Bytes32, b: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// Hash a list of coin ids as a canonical list. Callers sort first when the
/// result must be order-insensitive.
pub fn hash_coin_id_list(ids: &[Bytes32]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"tidepool/coin_list");
    hasher.update((ids.len() as u32).to_be_bytes());
    for id in ids {
        hasher.update(id);
    }
    hasher.finalize().into()
}

/// Hash a list of full coins (parent, puzzle hash, amount) in their canonical
/// form. Used for stable transaction-history names over grouped removals.
pub fn hash_coin_list(coins: &[Coin]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"tidepool/coin_list");
    hasher.update((coins.len() as u32).to_be_bytes());
    for coin in coins {
        hasher.update(coin.parent_coin_id);
        hasher.update(coin.puzzle_hash);
        hasher.update(coin.amount.to_be_bytes());
    }
    hasher.finalize().into()
}

/// A coin's current ledger state as reported by the node view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinState {
    pub coin: Coin,
    pub created_height: Option<u32>,
    pub spent_height: Option<u32>,
}

/// A coin the wallet-state manager knows to be ours, with its owning wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletCoinRecord {
    pub coin: Coin,
    pub wallet_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(parent: u8, ph: u8, amount: u64) -> Coin {
        Coin::new([parent; 32], [ph; 32], amount)
    }

    #[test]
    fn coin_id_deterministic() {
        let a = coin(1, 2, 100);
        let b = coin(1, 2, 100);
        assert_eq!(a.coin_id(), b.coin_id());
    }

    #[test]
    fn coin_id_changes_with_each_field() {
        let base = coin(1, 2, 100);
        assert_ne!(base.coin_id(), coin(3, 2, 100).coin_id());
        assert_ne!(base.coin_id(), coin(1, 3, 100).coin_id());
        assert_ne!(base.coin_id(), coin(1, 2, 101).coin_id());
    }

    #[test]
    fn id_list_hash_is_order_sensitive() {
        let a = coin(1, 2, 100).coin_id();
        let b = coin(3, 4, 200).coin_id();
        assert_ne!(hash_coin_id_list(&[a, b]), hash_coin_id_list(&[b, a]));
    }

    #[test]
    fn id_list_hash_is_length_prefixed() {
        let a = coin(1, 2, 100).coin_id();
        assert_ne!(hash_coin_id_list(&[a]), hash_coin_id_list(&[a, a]));
    }
}
