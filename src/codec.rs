//! Canonical offer-blob encoding.
//!
//! An offer serializes as a version byte, the spend bundle, then the
//! requested-payments map with asset keys in canonical order (base first,
//! then colors by raw byte order) and payments in construction order. Two
//! implementations produce byte-identical blobs for equal content; the
//! offer's identity is the hash of this encoding.

use std::collections::BTreeMap;

use crate::asset::Asset;
use crate::bundle::{CoinSpend, Condition, Signature, SpendBundle};
use crate::coin::{Bytes32, Coin};
use crate::error::{Error, Result};
use crate::offer::Offer;
use crate::payment::NotarizedPayment;

const VERSION: u8 = 1;

const TAG_ASSET_BASE: u8 = 0x00;
const TAG_ASSET_COLORED: u8 = 0x01;

const TAG_CREATE_COIN: u8 = 0x00;
const TAG_CREATE_ANNOUNCEMENT: u8 = 0x01;
const TAG_ASSERT_ANNOUNCEMENT: u8 = 0x02;

// ── Writing ─────────────────────────────────────────────────────────────

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn put_coin(out: &mut Vec<u8>, coin: &Coin) {
    out.extend_from_slice(&coin.parent_coin_id);
    out.extend_from_slice(&coin.puzzle_hash);
    put_u64(out, coin.amount);
}

fn put_asset(out: &mut Vec<u8>, asset: &Asset) {
    match asset {
        Asset::Base => out.push(TAG_ASSET_BASE),
        Asset::Colored(color) => {
            out.push(TAG_ASSET_COLORED);
            out.extend_from_slice(color);
        }
    }
}

fn put_memos(out: &mut Vec<u8>, memos: &[Vec<u8>]) {
    put_u32(out, memos.len() as u32);
    for memo in memos {
        put_bytes(out, memo);
    }
}

fn put_condition(out: &mut Vec<u8>, condition: &Condition) {
    match condition {
        Condition::CreateCoin {
            puzzle_hash,
            amount,
            memos,
        } => {
            out.push(TAG_CREATE_COIN);
            out.extend_from_slice(puzzle_hash);
            put_u64(out, *amount);
            put_memos(out, memos);
        }
        Condition::CreatePuzzleAnnouncement { message } => {
            out.push(TAG_CREATE_ANNOUNCEMENT);
            out.extend_from_slice(message);
        }
        Condition::AssertPuzzleAnnouncement { announcement_id } => {
            out.push(TAG_ASSERT_ANNOUNCEMENT);
            out.extend_from_slice(announcement_id);
        }
    }
}

fn put_bundle(out: &mut Vec<u8>, bundle: &SpendBundle) {
    put_u32(out, bundle.coin_spends.len() as u32);
    for spend in &bundle.coin_spends {
        put_coin(out, &spend.coin);
        put_asset(out, &spend.asset);
        put_u32(out, spend.conditions.len() as u32);
        for condition in &spend.conditions {
            put_condition(out, condition);
        }
    }
    out.extend_from_slice(&bundle.aggregated_signature.0);
}

pub fn serialize_offer(offer: &Offer) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(VERSION);
    put_bundle(&mut out, &offer.bundle);
    put_u32(&mut out, offer.requested_payments.len() as u32);
    for (asset, payments) in &offer.requested_payments {
        put_asset(&mut out, asset);
        put_u32(&mut out, payments.len() as u32);
        for payment in payments {
            out.extend_from_slice(&payment.nonce);
            out.extend_from_slice(&payment.puzzle_hash);
            put_u64(&mut out, payment.amount);
            put_memos(&mut out, &payment.memos);
        }
    }
    out
}

/// Encode a coin list for storage blobs (`coins_of_interest`).
pub fn encode_coins(coins: &[Coin]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, coins.len() as u32);
    for coin in coins {
        put_coin(&mut out, coin);
    }
    out
}

// ── Reading ─────────────────────────────────────────────────────────────

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::Parse(format!("truncated at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    fn bytes32(&mut self) -> Result<Bytes32> {
        Ok(self.take(32)?.try_into().expect("32 bytes"))
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn read_coin(cur: &mut Cursor<'_>) -> Result<Coin> {
    Ok(Coin::new(cur.bytes32()?, cur.bytes32()?, cur.u64()?))
}

fn read_asset(cur: &mut Cursor<'_>) -> Result<Asset> {
    match cur.u8()? {
        TAG_ASSET_BASE => Ok(Asset::Base),
        TAG_ASSET_COLORED => Ok(Asset::Colored(cur.bytes32()?)),
        other => Err(Error::Parse(format!("unknown asset tag {other:#04x}"))),
    }
}

fn read_memos(cur: &mut Cursor<'_>) -> Result<Vec<Vec<u8>>> {
    let count = cur.u32()? as usize;
    let mut memos = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        memos.push(cur.var_bytes()?);
    }
    Ok(memos)
}

fn read_condition(cur: &mut Cursor<'_>) -> Result<Condition> {
    match cur.u8()? {
        TAG_CREATE_COIN => Ok(Condition::CreateCoin {
            puzzle_hash: cur.bytes32()?,
            amount: cur.u64()?,
            memos: read_memos(cur)?,
        }),
        TAG_CREATE_ANNOUNCEMENT => Ok(Condition::CreatePuzzleAnnouncement {
            message: cur.bytes32()?,
        }),
        TAG_ASSERT_ANNOUNCEMENT => Ok(Condition::AssertPuzzleAnnouncement {
            announcement_id: cur.bytes32()?,
        }),
        other => Err(Error::Parse(format!("unknown condition tag {other:#04x}"))),
    }
}

fn read_bundle(cur: &mut Cursor<'_>) -> Result<SpendBundle> {
    let spend_count = cur.u32()? as usize;
    let mut coin_spends = Vec::with_capacity(spend_count.min(1024));
    for _ in 0..spend_count {
        let coin = read_coin(cur)?;
        let asset = read_asset(cur)?;
        let condition_count = cur.u32()? as usize;
        let mut conditions = Vec::with_capacity(condition_count.min(1024));
        for _ in 0..condition_count {
            conditions.push(read_condition(cur)?);
        }
        coin_spends.push(CoinSpend::new(coin, asset, conditions));
    }
    let signature = Signature(cur.take(96)?.try_into().expect("96 bytes"));
    Ok(SpendBundle::new(coin_spends, signature))
}

pub fn parse_offer(bytes: &[u8]) -> Result<Offer> {
    let mut cur = Cursor::new(bytes);
    let version = cur.u8()?;
    if version != VERSION {
        return Err(Error::Parse(format!("unsupported version {version}")));
    }
    let bundle = read_bundle(&mut cur)?;

    let key_count = cur.u32()? as usize;
    let mut requested_payments: BTreeMap<Asset, Vec<NotarizedPayment>> = BTreeMap::new();
    let mut previous: Option<Asset> = None;
    for _ in 0..key_count {
        let asset = read_asset(&mut cur)?;
        if let Some(prev) = previous
            && prev >= asset
        {
            return Err(Error::Parse("asset keys out of canonical order".into()));
        }
        previous = Some(asset);

        let payment_count = cur.u32()? as usize;
        let mut payments = Vec::with_capacity(payment_count.min(1024));
        for _ in 0..payment_count {
            payments.push(NotarizedPayment {
                nonce: cur.bytes32()?,
                puzzle_hash: cur.bytes32()?,
                amount: cur.u64()?,
                memos: read_memos(&mut cur)?,
            });
        }
        requested_payments.insert(asset, payments);
    }

    if !cur.done() {
        return Err(Error::Parse(format!(
            "{} trailing bytes after offer",
            bytes.len() - cur.pos
        )));
    }
    Ok(Offer::new(requested_payments, bundle))
}

/// Decode a coin list previously written by [`encode_coins`].
pub fn decode_coins(bytes: &[u8]) -> Result<Vec<Coin>> {
    let mut cur = Cursor::new(bytes);
    let count = cur.u32()? as usize;
    let mut coins = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        coins.push(read_coin(&mut cur)?);
    }
    if !cur.done() {
        return Err(Error::Parse("trailing bytes after coin list".into()));
    }
    Ok(coins)
}
