use sha2::{Digest, Sha256};

use crate::asset::Asset;
use crate::coin::Bytes32;

/// Puzzle hash of the settlement program. The program itself is supplied by
/// the ledger rules; it releases its coin only when every notarized payment
/// of the coin's group is created and announced in the same spend.
pub const SETTLEMENT_PH: Bytes32 = [
    0x1a, 0x71, 0xd7, 0x40, 0xeb, 0xb2, 0xdb, 0xf1, 0xe9, 0x45, 0x92, 0x51, 0xcf, 0x06, 0xee,
    0x0c, 0x9b, 0xbd, 0x52, 0x14, 0x00, 0xac, 0xd7, 0xda, 0xb6, 0x54, 0x31, 0xf1, 0xb9, 0x61,
    0xf1, 0x85,
];

/// Wrap an inner puzzle hash in the colored-asset layer.
///
/// ```text
/// cat_ph = SHA256("tidepool/cat" || color || inner_puzzle_hash)
/// ```
pub fn cat_puzzle_hash(color: &Bytes32, inner: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"tidepool/cat");
    hasher.update(color);
    hasher.update(inner);
    hasher.finalize().into()
}

/// The puzzle hash an offered coin of the given asset must pay to: the bare
/// settlement hash for the base asset, the colored-wrapped analogue otherwise.
pub fn settlement_puzzle_hash(asset: &Asset) -> Bytes32 {
    match asset {
        Asset::Base => SETTLEMENT_PH,
        Asset::Colored(color) => cat_puzzle_hash(color, &SETTLEMENT_PH),
    }
}

/// A puzzle announcement a settlement spend emits for one notarized payment,
/// and that the opposite leg asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    /// Puzzle hash of the announcing settlement coin.
    pub settlement_puzzle_hash: Bytes32,
    /// The notarized payment's name.
    pub message: Bytes32,
}

impl Announcement {
    pub fn new(settlement_puzzle_hash: Bytes32, message: Bytes32) -> Self {
        Self {
            settlement_puzzle_hash,
            message,
        }
    }

    /// Announcement id asserted by the opposite side.
    pub fn name(&self) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool/announcement");
        hasher.update(self.settlement_puzzle_hash);
        hasher.update(self.message);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_settlement_hash_is_the_constant() {
        assert_eq!(settlement_puzzle_hash(&Asset::Base), SETTLEMENT_PH);
    }

    #[test]
    fn colored_settlement_hash_depends_on_color() {
        let a = settlement_puzzle_hash(&Asset::Colored([0x01; 32]));
        let b = settlement_puzzle_hash(&Asset::Colored([0x02; 32]));
        assert_ne!(a, b);
        assert_ne!(a, SETTLEMENT_PH);
    }

    #[test]
    fn announcement_name_binds_origin_and_message() {
        let a = Announcement::new(SETTLEMENT_PH, [0x11; 32]);
        let b = Announcement::new(SETTLEMENT_PH, [0x22; 32]);
        let c = Announcement::new([0x33; 32], [0x11; 32]);
        assert_ne!(a.name(), b.name());
        assert_ne!(a.name(), c.name());
        assert_eq!(a.name(), Announcement::new(SETTLEMENT_PH, [0x11; 32]).name());
    }
}
