//! `TradeManager` — couples off-ledger trade records to on-ledger coin
//! events.
//!
//! Public operations suspend at store, wallet, and ledger accesses; there is
//! no internal parallelism. Transitions on one trade are serialized through a
//! per-trade lock, distinct trades proceed independently.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::asset::Asset;
use crate::bundle::SpendBundle;
use crate::coin::{Bytes32, Coin, CoinState, WalletCoinRecord, hash_coin_list, hash_pair};
use crate::error::{Error, Result};
use crate::offer::Offer;
use crate::payment::Payment;
use crate::settlement::SETTLEMENT_PH;
use crate::store::TradeStore;
use crate::trade_record::{TradeRecord, TradeStatus};
use crate::wallet::{
    TransactionRecord, TransactionType, Wallet, WalletKind, WalletStateManager,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct TradeManager<S: TradeStore> {
    wsm: Arc<dyn WalletStateManager>,
    store: Arc<Mutex<S>>,
    trade_locks: Mutex<HashMap<Bytes32, Arc<Mutex<()>>>>,
}

impl<S: TradeStore> TradeManager<S> {
    pub fn new(wsm: Arc<dyn WalletStateManager>, store: S) -> Self {
        Self {
            wsm,
            store: Arc::new(Mutex::new(store)),
            trade_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn trade_lock(&self, trade_id: &Bytes32) -> Arc<Mutex<()>> {
        let mut locks = self.trade_locks.lock().await;
        locks.entry(*trade_id).or_default().clone()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub async fn get_all_trades(&self) -> Result<Vec<TradeRecord>> {
        self.store.lock().await.get_all_trades().map_err(Error::Storage)
    }

    pub async fn get_trade_by_id(&self, trade_id: &Bytes32) -> Result<Option<TradeRecord>> {
        self.store
            .lock()
            .await
            .get_trade_record(trade_id)
            .map_err(Error::Storage)
    }

    pub async fn get_offers_with_status(
        &self,
        status: TradeStatus,
    ) -> Result<Vec<TradeRecord>> {
        self.store
            .lock()
            .await
            .get_trades_with_status(status)
            .map_err(Error::Storage)
    }

    async fn pending_trades(&self) -> Result<Vec<TradeRecord>> {
        let mut store = self.store.lock().await;
        let mut pending = Vec::new();
        for status in [
            TradeStatus::PendingAccept,
            TradeStatus::PendingConfirm,
            TradeStatus::PendingCancel,
        ] {
            pending.extend(store.get_trades_with_status(status).map_err(Error::Storage)?);
        }
        Ok(pending)
    }

    /// Coins the lifecycle manager must watch for on-ledger events: the
    /// coins of interest of every open trade, keyed by coin id.
    pub async fn coins_of_interest(&self) -> Result<HashMap<Bytes32, Coin>> {
        let mut interested = HashMap::new();
        for trade in self.pending_trades().await? {
            for coin in &trade.coins_of_interest {
                interested.insert(coin.coin_id(), *coin);
            }
        }
        Ok(interested)
    }

    /// Resolve a coin to the trade watching it. Cancelled trades are
    /// ignored so their coins can be re-offered.
    pub async fn get_trade_by_coin(&self, coin: &Coin) -> Result<Option<TradeRecord>> {
        for trade in self.get_all_trades().await? {
            if trade.status == TradeStatus::Cancelled {
                continue;
            }
            if trade.coins_of_interest.contains(coin) {
                return Ok(Some(trade));
            }
        }
        Ok(None)
    }

    /// Confirmed coins of ours locked by an open trade, optionally filtered
    /// to one wallet.
    pub async fn get_locked_coins(
        &self,
        wallet_id: Option<u32>,
    ) -> Result<HashMap<Bytes32, WalletCoinRecord>> {
        let mut ids = Vec::new();
        for trade in self.pending_trades().await? {
            ids.extend(trade.coins_of_interest.iter().map(|c| c.coin_id()));
        }

        let mut locked = HashMap::new();
        for record in self.wsm.get_multiple_coin_records(&ids).await? {
            if wallet_id.is_none() || wallet_id == Some(record.wallet_id) {
                locked.insert(record.coin.coin_id(), record);
            }
        }
        Ok(locked)
    }

    pub async fn save_trade(&self, record: &TradeRecord) -> Result<()> {
        self.store
            .lock()
            .await
            .add_trade_record(record)
            .map_err(Error::Storage)
    }

    // ── Offer construction ──────────────────────────────────────────────

    /// Build and persist a maker offer from a wallet-id → signed-amount map.
    /// Positive amounts are requested, negative amounts are offered. The fee
    /// rides the base-asset spend leg.
    pub async fn create_offer_for_ids(
        &self,
        offer_spec: &BTreeMap<u32, i64>,
        fee: u64,
    ) -> Result<TradeRecord> {
        let offer = self.build_offer(offer_spec, fee).await?;
        let record = TradeRecord {
            trade_id: offer.name(),
            created_at: unix_now(),
            accepted_at: None,
            confirmed_at_height: 0,
            is_my_offer: true,
            offer: offer.to_bytes(),
            coins_of_interest: offer.involved_coins(),
            status: TradeStatus::PendingAccept,
            sent_to: Vec::new(),
        };
        self.save_trade(&record).await?;
        log::info!(
            "created offer; trade {} pending acceptance",
            hex::encode(record.trade_id)
        );
        Ok(record)
    }

    /// Select, notarize, and sign one side of a swap. The result is
    /// self-consistent but deliberately unbalanced: its arbitrage mirrors
    /// `offer_spec`.
    async fn build_offer(
        &self,
        offer_spec: &BTreeMap<u32, i64>,
        fee: u64,
    ) -> Result<Offer> {
        let fee_wallet = self.pick_fee_wallet(offer_spec, fee).await?;

        let mut requested: BTreeMap<Asset, Vec<Payment>> = BTreeMap::new();
        let mut coins_to_offer: Vec<(u32, u64, Vec<Coin>)> = Vec::new();

        for (&wallet_id, &amount) in offer_spec {
            if amount == 0 {
                continue;
            }
            let wallet = self.resolve_wallet(wallet_id).await?;
            let asset = wallet_asset(wallet.as_ref())?;

            if amount > 0 {
                let p2_ph = wallet.get_new_puzzle_hash().await?;
                let memos = match asset {
                    Asset::Base => Vec::new(),
                    Asset::Colored(_) => vec![p2_ph.to_vec()],
                };
                requested
                    .entry(asset)
                    .or_default()
                    .push(Payment::new(p2_ph, amount as u64, memos));
            } else {
                let needed = amount.unsigned_abs();
                let balance = wallet.get_confirmed_balance().await?;
                if balance < needed {
                    return Err(Error::InsufficientFunds {
                        wallet_id,
                        available: balance,
                        needed,
                    });
                }
                let to_select = if fee_wallet == Some(wallet_id) {
                    needed + fee
                } else {
                    needed
                };
                let coins = wallet.select_coins(to_select).await?;
                coins_to_offer.push((wallet_id, needed, coins));
            }
        }

        if coins_to_offer.is_empty() {
            return Err(Error::CoinSelection(
                "offer spends nothing: at least one negative amount is required".into(),
            ));
        }

        let all_coins: Vec<Coin> = coins_to_offer
            .iter()
            .flat_map(|(_, _, coins)| coins.iter().copied())
            .collect();
        let notarized = Offer::notarize_payments(requested, &all_coins);
        let announcements = Offer::calculate_announcements(&notarized);
        log::debug!(
            "notarized {} payment group(s); counterparty must assert {} announcement(s)",
            notarized.len(),
            announcements.len()
        );

        let mut bundles: Vec<SpendBundle> = Vec::new();
        for (wallet_id, amount, coins) in coins_to_offer {
            let wallet = self.resolve_wallet(wallet_id).await?;
            let wallet_fee = if fee_wallet == Some(wallet_id) { fee } else { 0 };
            let txs = wallet
                .generate_signed_transaction(
                    vec![amount],
                    vec![SETTLEMENT_PH],
                    wallet_fee,
                    coins,
                    false,
                )
                .await?;
            bundles.extend(txs.into_iter().filter_map(|tx| tx.spend_bundle));
        }

        Ok(Offer::new(notarized, SpendBundle::aggregate(&bundles)))
    }

    async fn pick_fee_wallet(
        &self,
        offer_spec: &BTreeMap<u32, i64>,
        fee: u64,
    ) -> Result<Option<u32>> {
        if fee == 0 {
            return Ok(None);
        }
        for (&wallet_id, &amount) in offer_spec {
            if amount < 0 {
                let wallet = self.resolve_wallet(wallet_id).await?;
                if wallet.kind() == WalletKind::Base {
                    return Ok(Some(wallet_id));
                }
            }
        }
        Err(Error::CoinSelection(
            "a non-zero fee requires a base asset spend".into(),
        ))
    }

    async fn resolve_wallet(&self, wallet_id: u32) -> Result<Arc<dyn Wallet>> {
        self.wsm
            .wallet(wallet_id)
            .await
            .ok_or(Error::UnknownWallet(wallet_id))
    }

    // ── Taking an offer ─────────────────────────────────────────────────

    /// Complete a counterparty's partial offer: build the complementary leg,
    /// aggregate, promote to a valid spend, and persist the trade together
    /// with its transaction-history rows and the push transaction.
    pub async fn respond_to_offer(&self, offer: Offer, fee: u64) -> Result<TradeRecord> {
        offer.verify_notarization()?;

        let mut take_spec: BTreeMap<u32, i64> = BTreeMap::new();
        for (asset, amount) in offer.arbitrage() {
            if amount == 0 {
                continue;
            }
            let wallet = match asset {
                Asset::Base => self.wsm.main_wallet().await,
                Asset::Colored(color) => self
                    .wsm
                    .get_wallet_for_color(&color)
                    .await?
                    .ok_or(Error::AssetNotHeld(color))?,
            };
            let amount = i64::try_from(amount)
                .map_err(|_| Error::InvalidAggregate(format!("amount overflow for {asset}")))?;
            take_spec.insert(wallet.id(), amount);
        }

        let take_offer = self.build_offer(&take_spec, fee).await?;
        let complete = Offer::aggregate(&[offer, take_offer]);
        let final_bundle = complete.to_valid_spend()?;
        let trade_id = complete.name();
        let bundle_id = final_bundle.name();
        let now = unix_now();

        let txs = self
            .derive_history_rows(&complete, &final_bundle, trade_id, bundle_id, now)
            .await?;

        let record = TradeRecord {
            trade_id,
            created_at: now,
            accepted_at: Some(now),
            confirmed_at_height: 0,
            is_my_offer: false,
            offer: complete.to_bytes(),
            coins_of_interest: complete.involved_coins(),
            status: TradeStatus::PendingConfirm,
            sent_to: Vec::new(),
        };

        // Dummy transaction so the wallet push pipeline broadcasts the
        // aggregate bundle.
        let push_tx = TransactionRecord {
            name: bundle_id,
            created_at: now,
            confirmed_at_height: 0,
            confirmed: false,
            to_puzzle_hash: [0u8; 32],
            amount: 0,
            fee_amount: fee,
            wallet_id: 0,
            kind: TransactionType::OutgoingTrade,
            trade_id: Some(trade_id),
            spend_bundle: Some(final_bundle.clone()),
            additions: final_bundle.additions(),
            removals: final_bundle.removals(),
            memos: final_bundle.memos(),
        };

        // The record and its transactions must land together. Running the
        // group on its own task keeps a caller cancellation from splitting
        // it: either the task never started, or it runs to completion.
        let store = self.store.clone();
        let wsm = self.wsm.clone();
        let saved = record.clone();
        tokio::spawn(async move {
            store
                .lock()
                .await
                .add_trade_record(&saved)
                .map_err(Error::Storage)?;
            wsm.add_pending_transaction(push_tx).await?;
            for tx in txs {
                wsm.add_transaction(tx).await?;
            }
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Storage(format!("persistence task failed: {e}")))??;

        log::info!(
            "accepted offer; trade {} pending confirmation",
            hex::encode(trade_id)
        );
        Ok(record)
    }

    /// Incoming rows for settlement payouts to our wallets, one outgoing row
    /// per wallet whose coins fund a settlement coin.
    async fn derive_history_rows(
        &self,
        complete: &Offer,
        final_bundle: &SpendBundle,
        trade_id: Bytes32,
        bundle_id: Bytes32,
        now: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let settlement_coins: Vec<Coin> = complete
            .offered_coins()
            .into_values()
            .flatten()
            .collect();
        let settlement_ids: HashSet<Bytes32> =
            settlement_coins.iter().map(|c| c.coin_id()).collect();
        let settlement_parents: HashSet<Bytes32> =
            settlement_coins.iter().map(|c| c.parent_coin_id).collect();

        let mut txs = Vec::new();

        for addition in final_bundle.not_ephemeral_additions() {
            if !settlement_ids.contains(&addition.parent_coin_id) {
                continue;
            }
            let Some(wallet_id) = self
                .wsm
                .get_wallet_id_for_puzzle_hash(&addition.puzzle_hash)
                .await?
            else {
                continue;
            };
            let wallet = self.resolve_wallet(wallet_id).await?;
            let to_puzzle_hash = wallet.convert_puzzle_hash(addition.puzzle_hash).await;
            txs.push(TransactionRecord {
                name: hash_pair(&bundle_id, &addition.coin_id()),
                created_at: now,
                confirmed_at_height: 0,
                confirmed: false,
                to_puzzle_hash,
                amount: addition.amount,
                fee_amount: 0,
                wallet_id,
                kind: TransactionType::IncomingTrade,
                trade_id: Some(trade_id),
                spend_bundle: None,
                additions: Vec::new(),
                removals: Vec::new(),
                memos: Vec::new(),
            });
        }

        // Additions show as separate records; removals of one wallet group
        // into a single row.
        let mut removal_groups: BTreeMap<u32, Vec<Coin>> = BTreeMap::new();
        for removal in final_bundle.removals() {
            if !settlement_parents.contains(&removal.coin_id()) {
                continue;
            }
            if let Some(wallet_id) = self
                .wsm
                .get_wallet_id_for_puzzle_hash(&removal.puzzle_hash)
                .await?
            {
                removal_groups.entry(wallet_id).or_default().push(removal);
            }
        }

        for (wallet_id, grouped) in removal_groups {
            txs.push(TransactionRecord {
                name: hash_pair(&bundle_id, &hash_coin_list(&grouped)),
                created_at: now,
                confirmed_at_height: 0,
                confirmed: false,
                // All zeros: the value leaves the wallet with no local
                // recipient.
                to_puzzle_hash: [0u8; 32],
                amount: grouped.iter().map(|c| c.amount).sum(),
                fee_amount: 0,
                wallet_id,
                kind: TransactionType::OutgoingTrade,
                trade_id: Some(trade_id),
                spend_bundle: None,
                additions: Vec::new(),
                removals: grouped,
                memos: Vec::new(),
            });
        }

        Ok(txs)
    }

    /// Create tracking wallets for any colored asset in the offer we do not
    /// hold yet, so incoming settlement payouts have somewhere to land.
    async fn maybe_create_wallets_for_offer(&self, offer: &Offer) -> Result<()> {
        for asset in offer.arbitrage().keys() {
            if let Asset::Colored(color) = asset
                && self.wsm.get_wallet_for_color(color).await?.is_none()
            {
                log::info!("creating wallet for asset ID: {}", hex::encode(color));
                self.wsm.create_colored_wallet(*color).await?;
            }
        }
        Ok(())
    }

    // ── Cancellation ────────────────────────────────────────────────────

    /// Forget a pending offer. The counterparty can still settle it as long
    /// as our inputs remain unspent.
    pub async fn cancel_pending_offer(&self, trade_id: &Bytes32) -> Result<()> {
        let lock = self.trade_lock(trade_id).await;
        let _guard = lock.lock().await;

        let Some(trade) = self.get_trade_by_id(trade_id).await? else {
            return Err(Error::Storage(format!(
                "no trade with id {}",
                hex::encode(trade_id)
            )));
        };
        if trade.status.is_terminal() {
            return Ok(());
        }
        self.store
            .lock()
            .await
            .set_status(trade_id, TradeStatus::Cancelled, None)
            .map_err(Error::Storage)?;
        log::info!("trade {} cancelled", hex::encode(trade_id));
        Ok(())
    }

    /// Cancel by spending our primary coins back to ourselves; the offer
    /// becomes unsatisfiable once those self-spends confirm.
    pub async fn cancel_pending_offer_safely(&self, trade_id: &Bytes32) -> Result<()> {
        log::info!("safe-cancelling trade {}", hex::encode(trade_id));
        let lock = self.trade_lock(trade_id).await;
        let _guard = lock.lock().await;

        let Some(trade) = self.get_trade_by_id(trade_id).await? else {
            log::warn!("safe-cancel of unknown trade {}", hex::encode(trade_id));
            return Ok(());
        };
        if trade.status.is_terminal() {
            return Ok(());
        }

        let offer = Offer::from_bytes(&trade.offer)?;
        for coin in offer.primary_coins() {
            let Some(wallet) = self.wsm.get_wallet_for_coin(&coin.coin_id()).await? else {
                continue;
            };
            let new_ph = wallet.get_new_puzzle_hash().await?;
            let txs = wallet
                .generate_signed_transaction(
                    vec![coin.amount],
                    vec![new_ph],
                    0,
                    vec![coin],
                    true,
                )
                .await?;
            for tx in txs {
                self.wsm.add_pending_transaction(tx).await?;
            }
        }

        self.store
            .lock()
            .await
            .set_status(trade_id, TradeStatus::PendingCancel, None)
            .map_err(Error::Storage)
    }

    // ── On-ledger event handling ────────────────────────────────────────

    /// Entry point for ledger coin-state notifications. Best-effort: errors
    /// are logged, never surfaced.
    pub async fn coin_state_changed(&self, coin_state: CoinState) {
        if let Err(e) = self.process_coin_state(&coin_state).await {
            log::warn!(
                "failed to process state of coin {}: {e}",
                hex::encode(coin_state.coin.coin_id())
            );
        }
    }

    /// If our settlement coins were spent, the trade settled. If a watched
    /// coin was spent while our settlement coins were not, our inputs were
    /// consumed outside the trade: a completed safe-cancel, or a dead offer.
    async fn process_coin_state(&self, coin_state: &CoinState) -> Result<()> {
        let Some(trade) = self.get_trade_by_coin(&coin_state.coin).await? else {
            log::error!(
                "coin {} is not part of any trade",
                hex::encode(coin_state.coin.coin_id())
            );
            return Ok(());
        };
        if coin_state.spent_height.is_none() {
            log::debug!(
                "coin {} has not been spent; trade {} remains open",
                hex::encode(coin_state.coin.coin_id()),
                hex::encode(trade.trade_id)
            );
            return Ok(());
        }

        let lock = self.trade_lock(&trade.trade_id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; a racing transition may have landed first.
        let Some(trade) = self.get_trade_by_id(&trade.trade_id).await? else {
            return Ok(());
        };
        if trade.status.is_terminal() {
            return Ok(());
        }

        let offer = Offer::from_bytes(&trade.offer)?;

        let primary_ids: Vec<Bytes32> =
            offer.primary_coins().iter().map(|c| c.coin_id()).collect();
        let our_primary: HashSet<Bytes32> = self
            .wsm
            .get_multiple_coin_records(&primary_ids)
            .await?
            .iter()
            .map(|r| r.coin.coin_id())
            .collect();

        let our_settlement_ids: Vec<Bytes32> = offer
            .offered_coins()
            .into_values()
            .flatten()
            .filter(|c| our_primary.contains(&c.parent_coin_id))
            .map(|c| c.coin_id())
            .collect();

        let states = self.wsm.get_coin_state(&our_settlement_ids).await?;
        let settled_height = states.iter().find_map(|s| s.spent_height);

        if let Some(height) = settled_height {
            self.maybe_create_wallets_for_offer(&offer).await?;
            self.store
                .lock()
                .await
                .set_status(&trade.trade_id, TradeStatus::Confirmed, Some(height))
                .map_err(Error::Storage)?;
            log::info!(
                "trade {} confirmed at height {height}",
                hex::encode(trade.trade_id)
            );
        } else {
            match trade.status {
                TradeStatus::PendingCancel => {
                    self.store
                        .lock()
                        .await
                        .set_status(&trade.trade_id, TradeStatus::Cancelled, None)
                        .map_err(Error::Storage)?;
                    log::info!("trade {} cancelled", hex::encode(trade.trade_id));
                }
                TradeStatus::PendingConfirm | TradeStatus::PendingAccept => {
                    self.store
                        .lock()
                        .await
                        .set_status(&trade.trade_id, TradeStatus::Failed, None)
                        .map_err(Error::Storage)?;
                    log::warn!("trade {} failed", hex::encode(trade.trade_id));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn wallet_asset(wallet: &dyn Wallet) -> Result<Asset> {
    match wallet.kind() {
        WalletKind::Base => Ok(Asset::Base),
        WalletKind::Colored => wallet
            .color()
            .map(Asset::Colored)
            .ok_or_else(|| Error::Wallet(format!("colored wallet {} has no color", wallet.id()))),
        WalletKind::Other => Err(Error::UnsupportedAsset(wallet.id())),
    }
}
