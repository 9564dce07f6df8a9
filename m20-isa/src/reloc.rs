use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// The five relocation kinds the assembler and linker can emit, per
/// spec.md §9's redesign note: a distinct type rather than an alias of the
/// internal instruction-type enum, but the on-disk byte values are kept
/// stable so object files remain a fixed, documented tag space (§6.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum RelocKind {
    D2Label = 0,
    BRelativeLabel = 1,
    MRelativeLabel = 2,
    MBaseOffsetLabel = 3,
    DataAddr = 4,
}

impl RelocKind {
    pub fn from_byte(b: u8) -> Option<RelocKind> {
        FromPrimitive::from_u8(b)
    }

    pub fn to_byte(self) -> u8 {
        ToPrimitive::to_u8(&self).unwrap()
    }

    /// Whether the field is relative to the fixup address (rather than an
    /// absolute value).
    pub fn is_relative(self) -> bool {
        matches!(
            self,
            RelocKind::BRelativeLabel | RelocKind::MRelativeLabel | RelocKind::MBaseOffsetLabel
        )
    }

    /// Bias subtracted from the target before taking the difference, to
    /// account for the simulator's pc already having advanced past the
    /// instruction at fetch time.
    pub fn pc_bias(self) -> i64 {
        match self {
            RelocKind::BRelativeLabel | RelocKind::MRelativeLabel => -4,
            _ => 0,
        }
    }

    /// Whether the computed offset must be 4-byte aligned and is then
    /// stored as a word count (right-shifted by 2).
    pub fn is_word_aligned(self) -> bool {
        matches!(self, RelocKind::BRelativeLabel)
    }

    /// Width of the field in bits, for range-checking and masking.
    pub fn bits(self) -> u32 {
        match self {
            RelocKind::D2Label => 16,
            RelocKind::BRelativeLabel => 23,
            RelocKind::MRelativeLabel => 16,
            RelocKind::MBaseOffsetLabel => 12,
            RelocKind::DataAddr => 32,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn on_disk_byte_values_are_stable() {
        assert_eq!(RelocKind::D2Label.to_byte(), 0);
        assert_eq!(RelocKind::BRelativeLabel.to_byte(), 1);
        assert_eq!(RelocKind::MRelativeLabel.to_byte(), 2);
        assert_eq!(RelocKind::MBaseOffsetLabel.to_byte(), 3);
        assert_eq!(RelocKind::DataAddr.to_byte(), 4);
    }

    #[test]
    fn roundtrip_byte() {
        for b in 0u8..5 {
            let kind = RelocKind::from_byte(b).unwrap();
            assert_eq!(kind.to_byte(), b);
        }
    }

    #[test]
    fn unknown_byte_is_none() {
        assert!(RelocKind::from_byte(5).is_none());
    }
}
