//! In-memory collaborators for exercising the trade manager without a node:
//! a simulated ledger, wallets that select and "sign" deterministically, and
//! a wallet-state manager wired over both.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::bundle::{CoinSpend, Condition, Signature, SpendBundle};
use crate::coin::{Bytes32, Coin, CoinState, WalletCoinRecord};
use crate::error::{Error, Result};
use crate::settlement::cat_puzzle_hash;
use crate::wallet::{
    TransactionRecord, TransactionType, Wallet, WalletKind, WalletStateManager,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Fresh random 32 bytes, for parent ids and colors in tests.
pub fn random_bytes32() -> Bytes32 {
    rand::random()
}

// ── Simulated ledger ────────────────────────────────────────────────────

/// Coin states shared between every party of a test, the way a real ledger
/// is shared between nodes.
#[derive(Default)]
pub struct SharedLedger {
    states: Mutex<HashMap<Bytes32, CoinState>>,
}

impl SharedLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_coin(&self, coin: Coin, height: u32) {
        self.states.lock().unwrap().insert(
            coin.coin_id(),
            CoinState {
                coin,
                created_height: Some(height),
                spent_height: None,
            },
        );
    }

    /// Land a bundle at `height`: create its additions, then mark its
    /// removals spent. Coins created and consumed by the same bundle end up
    /// created-and-spent at `height`.
    pub fn apply_bundle(&self, bundle: &SpendBundle, height: u32) {
        let mut states = self.states.lock().unwrap();
        for addition in bundle.additions() {
            states.entry(addition.coin_id()).or_insert(CoinState {
                coin: addition,
                created_height: Some(height),
                spent_height: None,
            });
        }
        for removal in bundle.removals() {
            let state = states.entry(removal.coin_id()).or_insert(CoinState {
                coin: removal,
                created_height: Some(height),
                spent_height: None,
            });
            state.spent_height = Some(height);
        }
    }

    pub fn get(&self, coin_id: &Bytes32) -> Option<CoinState> {
        self.states.lock().unwrap().get(coin_id).copied()
    }
}

// ── Test wallet ─────────────────────────────────────────────────────────

struct WsmShared {
    ledger: Arc<SharedLedger>,
    /// puzzle hash → owning wallet id (wrapped hashes included).
    ph_owner: Mutex<HashMap<Bytes32, u32>>,
    /// coin id → (coin, owning wallet id), for coins known to be ours.
    coin_owner: Mutex<HashMap<Bytes32, (Coin, u32)>>,
    wallets: Mutex<BTreeMap<u32, Arc<TestWallet>>>,
    pending_txs: Mutex<Vec<TransactionRecord>>,
    txs: Mutex<Vec<TransactionRecord>>,
    next_wallet_id: AtomicU32,
}

/// A deterministic wallet over the shared ledger. Selection reserves coins
/// so overlapping offers cannot double-spend; "signatures" are stable
/// digests of the spent coin set.
pub struct TestWallet {
    id: u32,
    kind: WalletKind,
    color: Option<Bytes32>,
    shared: Arc<WsmShared>,
    coins: Mutex<Vec<Coin>>,
    reserved: Mutex<HashSet<Bytes32>>,
    unwrap_map: Mutex<HashMap<Bytes32, Bytes32>>,
    ph_counter: AtomicU32,
}

impl TestWallet {
    fn new(id: u32, kind: WalletKind, color: Option<Bytes32>, shared: Arc<WsmShared>) -> Self {
        Self {
            id,
            kind,
            color,
            shared,
            coins: Mutex::new(Vec::new()),
            reserved: Mutex::new(HashSet::new()),
            unwrap_map: Mutex::new(HashMap::new()),
            ph_counter: AtomicU32::new(0),
        }
    }

    fn fresh_puzzle_hash(&self) -> Bytes32 {
        let index = self.ph_counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool/test_ph");
        hasher.update(self.id.to_be_bytes());
        hasher.update(index.to_be_bytes());
        let ph: Bytes32 = hasher.finalize().into();

        let mut ph_owner = self.shared.ph_owner.lock().unwrap();
        ph_owner.insert(ph, self.id);
        if let Some(color) = self.color {
            let wrapped = cat_puzzle_hash(&color, &ph);
            ph_owner.insert(wrapped, self.id);
            self.unwrap_map.lock().unwrap().insert(wrapped, ph);
        }
        ph
    }

    /// Destination as it appears on-ledger: colored wallets wrap.
    fn wrap(&self, puzzle_hash: &Bytes32) -> Bytes32 {
        match self.color {
            Some(color) => cat_puzzle_hash(&color, puzzle_hash),
            None => *puzzle_hash,
        }
    }

    fn signature_for(&self, coins: &[Coin]) -> Signature {
        let mut out = [0u8; 96];
        for (i, chunk) in out.chunks_mut(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(b"tidepool/test_sig");
            hasher.update(self.id.to_be_bytes());
            hasher.update((i as u32).to_be_bytes());
            for coin in coins {
                hasher.update(coin.coin_id());
            }
            chunk.copy_from_slice(&hasher.finalize());
        }
        Signature(out)
    }
}

#[async_trait]
impl Wallet for TestWallet {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> WalletKind {
        self.kind
    }

    fn color(&self) -> Option<Bytes32> {
        self.color
    }

    async fn get_new_puzzle_hash(&self) -> Result<Bytes32> {
        Ok(self.fresh_puzzle_hash())
    }

    async fn get_confirmed_balance(&self) -> Result<u64> {
        let coins = self.coins.lock().unwrap();
        let total = coins
            .iter()
            .filter(|c| {
                self.shared
                    .ledger
                    .get(&c.coin_id())
                    .is_some_and(|s| s.spent_height.is_none())
            })
            .map(|c| c.amount)
            .sum();
        Ok(total)
    }

    async fn select_coins(&self, amount: u64) -> Result<Vec<Coin>> {
        let coins = self.coins.lock().unwrap();
        let mut reserved = self.reserved.lock().unwrap();

        let mut candidates: Vec<Coin> = coins
            .iter()
            .filter(|c| {
                !reserved.contains(&c.coin_id())
                    && self
                        .shared
                        .ledger
                        .get(&c.coin_id())
                        .is_some_and(|s| s.spent_height.is_none())
            })
            .copied()
            .collect();
        candidates.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut selected = Vec::new();
        let mut total = 0u64;
        for coin in candidates {
            if total >= amount {
                break;
            }
            total += coin.amount;
            selected.push(coin);
        }
        if total < amount {
            return Err(Error::CoinSelection(format!(
                "wallet {} can cover {total} of {amount}",
                self.id
            )));
        }
        for coin in &selected {
            reserved.insert(coin.coin_id());
        }
        Ok(selected)
    }

    async fn generate_signed_transaction(
        &self,
        amounts: Vec<u64>,
        puzzle_hashes: Vec<Bytes32>,
        fee: u64,
        coins: Vec<Coin>,
        _ignore_max_send_amount: bool,
    ) -> Result<Vec<TransactionRecord>> {
        if amounts.len() != puzzle_hashes.len() {
            return Err(Error::Wallet("amounts and destinations differ".into()));
        }
        let paying: u64 = amounts.iter().sum();
        let total: u64 = coins.iter().map(|c| c.amount).sum();
        if total < paying + fee {
            return Err(Error::Wallet(format!(
                "wallet {}: coins total {total}, need {}",
                self.id,
                paying + fee
            )));
        }

        let asset = match self.color {
            Some(color) => crate::asset::Asset::Colored(color),
            None => crate::asset::Asset::Base,
        };

        let mut conditions: Vec<Condition> = amounts
            .iter()
            .zip(&puzzle_hashes)
            .map(|(amount, ph)| Condition::CreateCoin {
                puzzle_hash: self.wrap(ph),
                amount: *amount,
                memos: Vec::new(),
            })
            .collect();
        let change = total - paying - fee;
        if change > 0 {
            let change_ph = self.fresh_puzzle_hash();
            conditions.push(Condition::CreateCoin {
                puzzle_hash: self.wrap(&change_ph),
                amount: change,
                memos: Vec::new(),
            });
        }

        let mut spends = Vec::with_capacity(coins.len());
        for (index, coin) in coins.iter().enumerate() {
            let spend_conditions = if index == 0 {
                std::mem::take(&mut conditions)
            } else {
                Vec::new()
            };
            spends.push(CoinSpend::new(*coin, asset, spend_conditions));
        }

        let bundle = SpendBundle::new(spends, self.signature_for(&coins));
        let record = TransactionRecord {
            name: bundle.name(),
            created_at: unix_now(),
            confirmed_at_height: 0,
            confirmed: false,
            to_puzzle_hash: puzzle_hashes.first().copied().unwrap_or([0u8; 32]),
            amount: paying,
            fee_amount: fee,
            wallet_id: self.id,
            kind: TransactionType::OutgoingTrade,
            trade_id: None,
            spend_bundle: Some(bundle.clone()),
            additions: bundle.additions(),
            removals: bundle.removals(),
            memos: Vec::new(),
        };
        Ok(vec![record])
    }

    async fn convert_puzzle_hash(&self, puzzle_hash: Bytes32) -> Bytes32 {
        match self.kind {
            WalletKind::Colored => self
                .unwrap_map
                .lock()
                .unwrap()
                .get(&puzzle_hash)
                .copied()
                .unwrap_or(puzzle_hash),
            _ => puzzle_hash,
        }
    }
}

// ── Test wallet-state manager ───────────────────────────────────────────

/// In-memory wallet-state manager over a [`SharedLedger`]. Wallet 1 is the
/// base wallet; colored wallets are added per color.
pub struct TestStateManager {
    shared: Arc<WsmShared>,
}

impl TestStateManager {
    pub fn new(ledger: Arc<SharedLedger>) -> Arc<Self> {
        let shared = Arc::new(WsmShared {
            ledger,
            ph_owner: Mutex::new(HashMap::new()),
            coin_owner: Mutex::new(HashMap::new()),
            wallets: Mutex::new(BTreeMap::new()),
            pending_txs: Mutex::new(Vec::new()),
            txs: Mutex::new(Vec::new()),
            next_wallet_id: AtomicU32::new(2),
        });
        let main = Arc::new(TestWallet::new(1, WalletKind::Base, None, shared.clone()));
        shared.wallets.lock().unwrap().insert(1, main);
        Arc::new(Self { shared })
    }

    fn insert_wallet(&self, kind: WalletKind, color: Option<Bytes32>) -> Arc<TestWallet> {
        let id = self.shared.next_wallet_id.fetch_add(1, Ordering::Relaxed);
        let wallet = Arc::new(TestWallet::new(id, kind, color, self.shared.clone()));
        self.shared.wallets.lock().unwrap().insert(id, wallet.clone());
        wallet
    }

    /// Register a colored wallet tracking `color`.
    pub fn add_colored_wallet(&self, color: Bytes32) -> Arc<TestWallet> {
        self.insert_wallet(WalletKind::Colored, Some(color))
    }

    /// Register a wallet of a kind that cannot trade.
    pub fn add_other_wallet(&self) -> Arc<TestWallet> {
        self.insert_wallet(WalletKind::Other, None)
    }

    /// Mint a confirmed coin into a wallet and onto the ledger.
    pub fn fund_wallet(&self, wallet_id: u32, amount: u64, height: u32) -> Coin {
        let wallet = {
            let wallets = self.shared.wallets.lock().unwrap();
            wallets.get(&wallet_id).expect("wallet exists").clone()
        };
        let ph = wallet.fresh_puzzle_hash();
        let coin = Coin::new(random_bytes32(), wallet.wrap(&ph), amount);

        self.shared.ledger.create_coin(coin, height);
        self.shared
            .coin_owner
            .lock()
            .unwrap()
            .insert(coin.coin_id(), (coin, wallet_id));
        wallet.coins.lock().unwrap().push(coin);
        coin
    }

    pub fn ledger(&self) -> Arc<SharedLedger> {
        self.shared.ledger.clone()
    }

    pub fn pending_transactions(&self) -> Vec<TransactionRecord> {
        self.shared.pending_txs.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.shared.txs.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletStateManager for TestStateManager {
    async fn wallet(&self, wallet_id: u32) -> Option<Arc<dyn Wallet>> {
        let wallets = self.shared.wallets.lock().unwrap();
        wallets.get(&wallet_id).map(|w| w.clone() as Arc<dyn Wallet>)
    }

    async fn main_wallet(&self) -> Arc<dyn Wallet> {
        self.wallet(1).await.expect("base wallet always exists")
    }

    async fn get_multiple_coin_records(
        &self,
        coin_ids: &[Bytes32],
    ) -> Result<Vec<WalletCoinRecord>> {
        let owners = self.shared.coin_owner.lock().unwrap();
        Ok(coin_ids
            .iter()
            .filter_map(|id| owners.get(id))
            .map(|(coin, wallet_id)| WalletCoinRecord {
                coin: *coin,
                wallet_id: *wallet_id,
            })
            .collect())
    }

    async fn get_coin_state(&self, coin_ids: &[Bytes32]) -> Result<Vec<CoinState>> {
        Ok(coin_ids
            .iter()
            .filter_map(|id| self.shared.ledger.get(id))
            .collect())
    }

    async fn get_wallet_for_coin(&self, coin_id: &Bytes32) -> Result<Option<Arc<dyn Wallet>>> {
        let wallet_id = {
            let owners = self.shared.coin_owner.lock().unwrap();
            owners.get(coin_id).map(|(_, id)| *id)
        };
        match wallet_id {
            Some(id) => Ok(self.wallet(id).await),
            None => Ok(None),
        }
    }

    async fn get_wallet_for_color(&self, color: &Bytes32) -> Result<Option<Arc<dyn Wallet>>> {
        let wallets = self.shared.wallets.lock().unwrap();
        Ok(wallets
            .values()
            .find(|w| w.color() == Some(*color))
            .map(|w| w.clone() as Arc<dyn Wallet>))
    }

    async fn get_wallet_id_for_puzzle_hash(&self, puzzle_hash: &Bytes32) -> Result<Option<u32>> {
        Ok(self.shared.ph_owner.lock().unwrap().get(puzzle_hash).copied())
    }

    async fn add_pending_transaction(&self, tx: TransactionRecord) -> Result<()> {
        self.shared.pending_txs.lock().unwrap().push(tx);
        Ok(())
    }

    async fn add_transaction(&self, tx: TransactionRecord) -> Result<()> {
        self.shared.txs.lock().unwrap().push(tx);
        Ok(())
    }

    async fn create_colored_wallet(&self, color: Bytes32) -> Result<Arc<dyn Wallet>> {
        Ok(self.add_colored_wallet(color) as Arc<dyn Wallet>)
    }
}
