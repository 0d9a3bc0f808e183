use serde::{Deserialize, Serialize};

use crate::coin::Bytes32;

/// The asset a coin carries: the ledger's native unit, or a colored
/// fungible asset identified by its 32-byte color tag.
///
/// The derived ordering (`Base` first, then colors by raw byte order) is the
/// canonical key order of the offer blob.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Asset {
    Base,
    Colored(Bytes32),
}

impl Asset {
    pub fn is_base(&self) -> bool {
        matches!(self, Asset::Base)
    }

    pub fn color(&self) -> Option<Bytes32> {
        match self {
            Asset::Base => None,
            Asset::Colored(color) => Some(*color),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Base => write!(f, "base"),
            Asset::Colored(color) => write!(f, "{}", hex::encode(color)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_sorts_before_every_color() {
        assert!(Asset::Base < Asset::Colored([0x00; 32]));
        assert!(Asset::Base < Asset::Colored([0xff; 32]));
    }

    #[test]
    fn colors_sort_by_raw_bytes() {
        assert!(Asset::Colored([0x01; 32]) < Asset::Colored([0x02; 32]));
    }

    #[test]
    fn display_is_hex_for_colors() {
        let mut color = [0u8; 32];
        color[0] = 0xab;
        assert!(Asset::Colored(color).to_string().starts_with("ab00"));
        assert_eq!(Asset::Base.to_string(), "base");
    }
}
