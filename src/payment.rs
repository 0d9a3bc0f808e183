use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::coin::Bytes32;

/// A requested output: pay `amount` to `puzzle_hash`, with optional memos.
///
/// Colored-asset payments carry the receiver's inner puzzle hash as a memo so
/// the hint survives the colored wrapper; base payments have no memos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub puzzle_hash: Bytes32,
    pub amount: u64,
    pub memos: Vec<Vec<u8>>,
}

impl Payment {
    pub fn new(puzzle_hash: Bytes32, amount: u64, memos: Vec<Vec<u8>>) -> Self {
        Self {
            puzzle_hash,
            amount,
            memos,
        }
    }
}

/// A [`Payment`] bound by nonce to the set of coins offered alongside it.
/// The payment is only satisfiable in the exact bundle it was notarized for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizedPayment {
    pub nonce: Bytes32,
    pub puzzle_hash: Bytes32,
    pub amount: u64,
    pub memos: Vec<Vec<u8>>,
}

impl NotarizedPayment {
    pub fn from_payment(nonce: Bytes32, payment: Payment) -> Self {
        Self {
            nonce,
            puzzle_hash: payment.puzzle_hash,
            amount: payment.amount,
            memos: payment.memos,
        }
    }

    /// Commitment hash of the notarized payment; doubles as the announcement
    /// message the settlement spend emits when it creates the payment.
    ///
    /// ```text
    /// name = SHA256(
    ///     "tidepool/notarized_payment" ||
    ///     nonce        ||    // 32 bytes
    ///     puzzle_hash  ||    // 32 bytes
    ///     amount       ||    //  8 bytes (big-endian)
    ///     memo_count   ||    //  4 bytes (big-endian)
    ///     for each memo: len (4 bytes big-endian) || bytes
    /// )
    /// ```
    pub fn name(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool/notarized_payment");
        hasher.update(self.nonce);
        hasher.update(self.puzzle_hash);
        hasher.update(self.amount.to_be_bytes());
        hasher.update((self.memos.len() as u32).to_be_bytes());
        for memo in &self.memos {
            hasher.update((memo.len() as u32).to_be_bytes());
            hasher.update(memo);
        }
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment::new([0x02; 32], 100, vec![vec![0xaa, 0xbb]])
    }

    #[test]
    fn name_deterministic() {
        let a = NotarizedPayment::from_payment([0x01; 32], payment());
        let b = NotarizedPayment::from_payment([0x01; 32], payment());
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn name_changes_with_nonce() {
        let a = NotarizedPayment::from_payment([0x01; 32], payment());
        let b = NotarizedPayment::from_payment([0x02; 32], payment());
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn name_changes_with_memos() {
        let a = NotarizedPayment::from_payment([0x01; 32], payment());
        let b = NotarizedPayment::from_payment(
            [0x01; 32],
            Payment::new([0x02; 32], 100, vec![]),
        );
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn memo_framing_is_unambiguous() {
        let a = NotarizedPayment::from_payment(
            [0x01; 32],
            Payment::new([0x02; 32], 100, vec![vec![0xaa], vec![0xbb]]),
        );
        let b = NotarizedPayment::from_payment(
            [0x01; 32],
            Payment::new([0x02; 32], 100, vec![vec![0xaa, 0xbb]]),
        );
        assert_ne!(a.name(), b.name());
    }
}
