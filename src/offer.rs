use std::collections::{BTreeMap, HashSet};

use crate::asset::Asset;
use crate::bundle::{CoinSpend, Condition, Signature, SpendBundle};
use crate::coin::{Bytes32, Coin, hash_coin_id_list};
use crate::error::{Error, Result};
use crate::payment::{NotarizedPayment, Payment};
use crate::codec;
use crate::settlement::{Announcement, cat_puzzle_hash, settlement_puzzle_hash};

/// One side's view of a swap: the payments it requests, keyed by asset, and
/// the spend bundle escrowing what it offers into settlement coins.
///
/// A partial offer carries signatures over its own inputs only; aggregating
/// it with a complementary partial and promoting via [`Offer::to_valid_spend`]
/// yields a ledger-ready bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub requested_payments: BTreeMap<Asset, Vec<NotarizedPayment>>,
    pub bundle: SpendBundle,
}

impl Offer {
    pub fn new(
        requested_payments: BTreeMap<Asset, Vec<NotarizedPayment>>,
        bundle: SpendBundle,
    ) -> Self {
        Self {
            requested_payments,
            bundle,
        }
    }

    /// Bind requested payments to the coins offered alongside them.
    ///
    /// The nonce is the hash of the sorted ids of *all* offered coins, not
    /// the per-asset subset, so every payment transitively commits to every
    /// coin on the offering side. Reusing a subset of the coins in another
    /// composition changes the nonce and invalidates the commitment.
    pub fn notarize_payments(
        requested: BTreeMap<Asset, Vec<Payment>>,
        offered_coins: &[Coin],
    ) -> BTreeMap<Asset, Vec<NotarizedPayment>> {
        let mut ids: Vec<Bytes32> = offered_coins.iter().map(|c| c.coin_id()).collect();
        ids.sort();
        let nonce = hash_coin_id_list(&ids);

        requested
            .into_iter()
            .map(|(asset, payments)| {
                let notarized = payments
                    .into_iter()
                    .map(|p| NotarizedPayment::from_payment(nonce, p))
                    .collect();
                (asset, notarized)
            })
            .collect()
    }

    /// The announcements the counterparty's settlement spends will emit, one
    /// per notarized payment, originated at the payment asset's settlement
    /// puzzle.
    pub fn calculate_announcements(
        notarized: &BTreeMap<Asset, Vec<NotarizedPayment>>,
    ) -> Vec<Announcement> {
        let mut out = Vec::new();
        for (asset, payments) in notarized {
            let origin = settlement_puzzle_hash(asset);
            for payment in payments {
                out.push(Announcement::new(origin, payment.name()));
            }
        }
        out
    }

    /// Canonical identity of this offer: the hash of its serialized form.
    pub fn name(&self) -> Bytes32 {
        use sha2::{Digest, Sha256};
        Sha256::digest(self.to_bytes()).into()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::serialize_offer(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Offer> {
        codec::parse_offer(bytes)
    }

    // ── Derived coin views ──────────────────────────────────────────────

    /// Outputs of the bundle paying into settlement escrow, keyed by asset.
    pub fn offered_coins(&self) -> BTreeMap<Asset, Vec<Coin>> {
        let mut out: BTreeMap<Asset, Vec<Coin>> = BTreeMap::new();
        for spend in &self.bundle.coin_spends {
            let settlement_ph = settlement_puzzle_hash(&spend.asset);
            for addition in spend.additions() {
                if addition.puzzle_hash == settlement_ph {
                    out.entry(spend.asset).or_default().push(addition);
                }
            }
        }
        out
    }

    pub fn offered_amounts(&self) -> BTreeMap<Asset, u64> {
        self.offered_coins()
            .into_iter()
            .map(|(asset, coins)| (asset, coins.iter().map(|c| c.amount).sum()))
            .collect()
    }

    pub fn requested_amounts(&self) -> BTreeMap<Asset, u64> {
        self.requested_payments
            .iter()
            .map(|(asset, payments)| (*asset, payments.iter().map(|p| p.amount).sum()))
            .collect()
    }

    /// Per-asset signed delta, offered minus requested. All zeros means the
    /// offer balances and can settle on its own.
    pub fn arbitrage(&self) -> BTreeMap<Asset, i128> {
        let offered = self.offered_amounts();
        let requested = self.requested_amounts();
        let keys: HashSet<Asset> = offered.keys().chain(requested.keys()).copied().collect();
        let mut out = BTreeMap::new();
        for asset in keys {
            let o = *offered.get(&asset).unwrap_or(&0) as i128;
            let r = *requested.get(&asset).unwrap_or(&0) as i128;
            out.insert(asset, o - r);
        }
        out
    }

    /// The inputs being spent on the offering side: removals that are not
    /// themselves created within the bundle. Sorted by coin id.
    pub fn primary_coins(&self) -> Vec<Coin> {
        let created: HashSet<Bytes32> =
            self.bundle.additions().iter().map(|c| c.coin_id()).collect();
        let mut primary: Vec<Coin> = self
            .bundle
            .removals()
            .into_iter()
            .filter(|c| !created.contains(&c.coin_id()))
            .collect();
        primary.sort_by_key(|c| c.coin_id());
        primary.dedup();
        primary
    }

    /// Primary coins plus offered coins: everything the lifecycle manager
    /// must watch for this offer.
    pub fn involved_coins(&self) -> Vec<Coin> {
        let mut coins = self.primary_coins();
        for group in self.offered_coins().into_values() {
            coins.extend(group);
        }
        coins.sort_by_key(|c| c.coin_id());
        coins.dedup();
        coins
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// Check that a (partial) offer is self-consistent: every requested
    /// payment's nonce matches the hash of this offer's own primary-coin id
    /// list, and something is actually escrowed.
    pub fn verify_notarization(&self) -> Result<()> {
        let ids: Vec<Bytes32> = self.primary_coins().iter().map(|c| c.coin_id()).collect();
        if ids.is_empty() {
            return Err(Error::NotSelfConsistent("offer spends no coins".into()));
        }
        let expected = hash_coin_id_list(&ids);
        for (asset, payments) in &self.requested_payments {
            for payment in payments {
                if payment.nonce != expected {
                    return Err(Error::NotSelfConsistent(format!(
                        "payment nonce under asset {asset} does not match the offered coin set"
                    )));
                }
            }
        }
        if self.offered_coins().is_empty() {
            return Err(Error::NotSelfConsistent(
                "offer escrows no settlement coins".into(),
            ));
        }
        Ok(())
    }

    /// Whether every asset's arbitrage is zero.
    pub fn is_complete(&self) -> bool {
        self.arbitrage().values().all(|v| *v == 0)
    }

    /// Union two or more offers: requested payments merge per asset key in
    /// argument order, bundles aggregate canonically.
    pub fn aggregate(offers: &[Offer]) -> Offer {
        let mut requested_payments: BTreeMap<Asset, Vec<NotarizedPayment>> = BTreeMap::new();
        for offer in offers {
            for (asset, payments) in &offer.requested_payments {
                requested_payments
                    .entry(*asset)
                    .or_default()
                    .extend(payments.iter().cloned());
            }
        }
        let bundles: Vec<SpendBundle> = offers.iter().map(|o| o.bundle.clone()).collect();
        Offer::new(requested_payments, SpendBundle::aggregate(&bundles))
    }

    /// Promote a complete offer to a ledger-ready bundle by injecting the
    /// settlement spends.
    ///
    /// Within each asset group the first settlement coin's spend creates the
    /// group's payment coins and announces each of them; every settlement
    /// spend asserts the announcements of the payments it does not itself
    /// create, so the legs cross-bind and no subset of the bundle is
    /// independently valid.
    pub fn to_valid_spend(&self) -> Result<SpendBundle> {
        if !self.is_complete() {
            let unbalanced: Vec<String> = self
                .arbitrage()
                .into_iter()
                .filter(|(_, v)| *v != 0)
                .map(|(asset, v)| format!("{asset}: {v}"))
                .collect();
            return Err(Error::InvalidAggregate(unbalanced.join(", ")));
        }

        let offered = self.offered_coins();
        let mut settlement_spends = Vec::new();

        for (asset, coins) in &offered {
            let payments = self
                .requested_payments
                .get(asset)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            // Announcements this group depends on: every payment settled by
            // a different asset group.
            let cross_asserts: Vec<Condition> = self
                .requested_payments
                .iter()
                .filter(|(other, _)| *other != asset)
                .flat_map(|(other, other_payments)| {
                    let origin = settlement_puzzle_hash(other);
                    other_payments.iter().map(move |p| {
                        Condition::AssertPuzzleAnnouncement {
                            announcement_id: Announcement::new(origin, p.name()).name(),
                        }
                    })
                })
                .collect();

            for (index, coin) in coins.iter().enumerate() {
                let mut conditions = Vec::new();
                if index == 0 {
                    for payment in payments {
                        let puzzle_hash = match asset {
                            Asset::Base => payment.puzzle_hash,
                            Asset::Colored(color) => {
                                cat_puzzle_hash(color, &payment.puzzle_hash)
                            }
                        };
                        conditions.push(Condition::CreateCoin {
                            puzzle_hash,
                            amount: payment.amount,
                            memos: payment.memos.clone(),
                        });
                        conditions.push(Condition::CreatePuzzleAnnouncement {
                            message: payment.name(),
                        });
                    }
                }
                conditions.extend(cross_asserts.iter().cloned());
                settlement_spends.push(CoinSpend::new(*coin, *asset, conditions));
            }
        }

        let settlement_bundle = SpendBundle::new(settlement_spends, Signature::EMPTY);
        Ok(SpendBundle::aggregate(&[
            self.bundle.clone(),
            settlement_bundle,
        ]))
    }
}
