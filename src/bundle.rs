use sha2::{Digest, Sha256};

use crate::asset::Asset;
use crate::coin::{Bytes32, Coin};

/// Output conditions of a coin spend, the subset the trade core inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Create a child coin of the spent coin's asset.
    CreateCoin {
        puzzle_hash: Bytes32,
        amount: u64,
        memos: Vec<Vec<u8>>,
    },
    /// Announce a 32-byte message from this coin's puzzle.
    CreatePuzzleAnnouncement { message: Bytes32 },
    /// Fail the bundle unless the named announcement is made within it.
    AssertPuzzleAnnouncement { announcement_id: Bytes32 },
}

/// One coin consumed by a bundle, with the conditions its spend emits.
/// Created coins inherit the spent coin's asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSpend {
    pub coin: Coin,
    pub asset: Asset,
    pub conditions: Vec<Condition>,
}

impl CoinSpend {
    pub fn new(coin: Coin, asset: Asset, conditions: Vec<Condition>) -> Self {
        Self {
            coin,
            asset,
            conditions,
        }
    }

    /// Coins this spend creates.
    pub fn additions(&self) -> Vec<Coin> {
        let parent = self.coin.coin_id();
        self.conditions
            .iter()
            .filter_map(|c| match c {
                Condition::CreateCoin {
                    puzzle_hash,
                    amount,
                    ..
                } => Some(Coin::new(parent, *puzzle_hash, *amount)),
                _ => None,
            })
            .collect()
    }
}

/// Aggregate signature over a bundle's spends.
///
/// Combination is commutative and associative; the identity is all zeros.
/// Producing member signatures is the wallet's concern, the core only ever
/// combines and transports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 96]);

impl Signature {
    pub const EMPTY: Signature = Signature([0u8; 96]);

    pub fn combine(&self, other: &Signature) -> Signature {
        let mut out = [0u8; 96];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Signature(out)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::EMPTY
    }
}

/// The unit of ledger acceptance: a set of coin spends with their combined
/// signature. Either every spend lands or none do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpendBundle {
    pub coin_spends: Vec<CoinSpend>,
    pub aggregated_signature: Signature,
}

impl SpendBundle {
    pub fn new(coin_spends: Vec<CoinSpend>, aggregated_signature: Signature) -> Self {
        Self {
            coin_spends,
            aggregated_signature,
        }
    }

    /// Combine bundles into one, in canonical form: spends sorted by coin id,
    /// signatures combined. Canonical ordering makes aggregation independent
    /// of argument order.
    pub fn aggregate(bundles: &[SpendBundle]) -> SpendBundle {
        let mut coin_spends: Vec<CoinSpend> = bundles
            .iter()
            .flat_map(|b| b.coin_spends.iter().cloned())
            .collect();
        coin_spends.sort_by_key(|s| s.coin.coin_id());

        let aggregated_signature = bundles
            .iter()
            .fold(Signature::EMPTY, |acc, b| acc.combine(&b.aggregated_signature));

        SpendBundle {
            coin_spends,
            aggregated_signature,
        }
    }

    /// Every coin created by this bundle, including ephemeral ones.
    pub fn additions(&self) -> Vec<Coin> {
        self.coin_spends.iter().flat_map(|s| s.additions()).collect()
    }

    /// Coins created by the bundle that are not also spent within it.
    pub fn not_ephemeral_additions(&self) -> Vec<Coin> {
        let removed: std::collections::HashSet<Bytes32> =
            self.removals().iter().map(|c| c.coin_id()).collect();
        self.additions()
            .into_iter()
            .filter(|c| !removed.contains(&c.coin_id()))
            .collect()
    }

    /// Every coin consumed by this bundle.
    pub fn removals(&self) -> Vec<Coin> {
        self.coin_spends.iter().map(|s| s.coin).collect()
    }

    /// Memos attached to created coins, keyed by the created coin's id.
    pub fn memos(&self) -> Vec<(Bytes32, Vec<Vec<u8>>)> {
        let mut out = Vec::new();
        for spend in &self.coin_spends {
            let parent = spend.coin.coin_id();
            for condition in &spend.conditions {
                if let Condition::CreateCoin {
                    puzzle_hash,
                    amount,
                    memos,
                } = condition
                    && !memos.is_empty()
                {
                    let created = Coin::new(parent, *puzzle_hash, *amount);
                    out.push((created.coin_id(), memos.clone()));
                }
            }
        }
        out
    }

    /// Canonical hash identifying this bundle.
    pub fn name(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool/spend_bundle");
        hasher.update((self.coin_spends.len() as u32).to_be_bytes());
        for spend in &self.coin_spends {
            hasher.update(spend.coin.parent_coin_id);
            hasher.update(spend.coin.puzzle_hash);
            hasher.update(spend.coin.amount.to_be_bytes());
            match spend.asset {
                Asset::Base => hasher.update([0x00]),
                Asset::Colored(color) => {
                    hasher.update([0x01]);
                    hasher.update(color);
                }
            }
            hasher.update((spend.conditions.len() as u32).to_be_bytes());
            for condition in &spend.conditions {
                match condition {
                    Condition::CreateCoin {
                        puzzle_hash,
                        amount,
                        memos,
                    } => {
                        hasher.update([0x00]);
                        hasher.update(puzzle_hash);
                        hasher.update(amount.to_be_bytes());
                        hasher.update((memos.len() as u32).to_be_bytes());
                        for memo in memos {
                            hasher.update((memo.len() as u32).to_be_bytes());
                            hasher.update(memo);
                        }
                    }
                    Condition::CreatePuzzleAnnouncement { message } => {
                        hasher.update([0x01]);
                        hasher.update(message);
                    }
                    Condition::AssertPuzzleAnnouncement { announcement_id } => {
                        hasher.update([0x02]);
                        hasher.update(announcement_id);
                    }
                }
            }
        }
        hasher.update(self.aggregated_signature.0);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(parent: u8, amount: u64, created_ph: Option<u8>) -> CoinSpend {
        let conditions = match created_ph {
            Some(ph) => vec![Condition::CreateCoin {
                puzzle_hash: [ph; 32],
                amount,
                memos: vec![],
            }],
            None => vec![],
        };
        CoinSpend::new(Coin::new([parent; 32], [0x10; 32], amount), Asset::Base, conditions)
    }

    fn sig(byte: u8) -> Signature {
        Signature([byte; 96])
    }

    #[test]
    fn signature_combine_commutes() {
        let a = sig(0b1010);
        let b = sig(0b0110);
        assert_eq!(a.combine(&b), b.combine(&a));
        assert_eq!(a.combine(&Signature::EMPTY), a);
    }

    #[test]
    fn aggregate_is_order_independent() {
        let b1 = SpendBundle::new(vec![spend(1, 100, Some(0x20))], sig(0x01));
        let b2 = SpendBundle::new(vec![spend(2, 50, Some(0x21))], sig(0x02));
        let ab = SpendBundle::aggregate(&[b1.clone(), b2.clone()]);
        let ba = SpendBundle::aggregate(&[b2, b1]);
        assert_eq!(ab, ba);
        assert_eq!(ab.name(), ba.name());
    }

    #[test]
    fn additions_inherit_spent_coin_as_parent() {
        let s = spend(1, 100, Some(0x20));
        let parent_id = s.coin.coin_id();
        let additions = s.additions();
        assert_eq!(additions.len(), 1);
        assert_eq!(additions[0].parent_coin_id, parent_id);
        assert_eq!(additions[0].amount, 100);
    }

    #[test]
    fn ephemeral_additions_are_filtered() {
        // Spend A creates coin X; a second spend consumes X inside the bundle.
        let a = spend(1, 100, Some(0x20));
        let x = a.additions()[0];
        let consume_x = CoinSpend::new(
            x,
            Asset::Base,
            vec![Condition::CreateCoin {
                puzzle_hash: [0x30; 32],
                amount: 100,
                memos: vec![],
            }],
        );
        let bundle = SpendBundle::new(vec![a, consume_x], Signature::EMPTY);

        let all = bundle.additions();
        let persistent = bundle.not_ephemeral_additions();
        assert_eq!(all.len(), 2);
        assert_eq!(persistent.len(), 1);
        assert_eq!(persistent[0].puzzle_hash, [0x30; 32]);
    }

    #[test]
    fn memos_keyed_by_created_coin() {
        let s = CoinSpend::new(
            Coin::new([1; 32], [0x10; 32], 5),
            Asset::Base,
            vec![Condition::CreateCoin {
                puzzle_hash: [0x20; 32],
                amount: 5,
                memos: vec![vec![0xaa]],
            }],
        );
        let bundle = SpendBundle::new(vec![s.clone()], Signature::EMPTY);
        let memos = bundle.memos();
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].0, s.additions()[0].coin_id());
        assert_eq!(memos[0].1, vec![vec![0xaa]]);
    }
}
