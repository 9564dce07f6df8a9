use num_derive::{FromPrimitive, ToPrimitive};

/// Data-processing family opcode, bits [24:20] of the instruction word.
/// Shared by the D3 (three-operand), D2 (two-operand), D1 (single-operand)
/// and empty instruction statement forms of §4.2 — they all encode into
/// this one opcode space, which is why the mnemonic table in §4.3 lists
/// them together.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum DataOp {
    Noop = 0x00,
    Add = 0x01,
    Adc = 0x02,
    Sub = 0x03,
    Sbc = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Udv = 0x07,
    Or = 0x08,
    And = 0x09,
    Xor = 0x0A,
    Nor = 0x0B,
    Bic = 0x0C,
    Ror = 0x0D,
    Lsl = 0x0E,
    Lsr = 0x0F,
    Asr = 0x10,
    Mov = 0x11,
    Mvn = 0x12,
    Cmp = 0x13,
    Cmn = 0x14,
    Tst = 0x15,
    Teq = 0x16,
    Push = 0x17,
    Pop = 0x18,
    Srl = 0x19,
    Srs = 0x1A,
    Halt = 0x1F,
}

impl DataOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            DataOp::Noop => "noop",
            DataOp::Add => "add",
            DataOp::Adc => "adc",
            DataOp::Sub => "sub",
            DataOp::Sbc => "sbc",
            DataOp::Mul => "mul",
            DataOp::Div => "div",
            DataOp::Udv => "udv",
            DataOp::Or => "or",
            DataOp::And => "and",
            DataOp::Xor => "xor",
            DataOp::Nor => "nor",
            DataOp::Bic => "bic",
            DataOp::Ror => "ror",
            DataOp::Lsl => "lsl",
            DataOp::Lsr => "lsr",
            DataOp::Asr => "asr",
            DataOp::Mov => "mov",
            DataOp::Mvn => "mvn",
            DataOp::Cmp => "cmp",
            DataOp::Cmn => "cmn",
            DataOp::Tst => "tst",
            DataOp::Teq => "teq",
            DataOp::Push => "push",
            DataOp::Pop => "pop",
            DataOp::Srl => "srl",
            DataOp::Srs => "srs",
            DataOp::Halt => "halt",
        }
    }

    /// Whether the opcode always updates status flags regardless of the
    /// `.s` suffix (§4.5: "or for CMP/CMN/TST/TEQ, always").
    pub fn always_updates_flags(self) -> bool {
        matches!(
            self,
            DataOp::Cmp | DataOp::Cmn | DataOp::Tst | DataOp::Teq
        )
    }
}

/// Load/store family opcode, bits [22:20].
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum LoadStoreOp {
    Ldr = 0,
    Ldrb = 1,
    Ldrh = 2,
    Ldrsb = 3,
    Ldrsh = 4,
    Str = 5,
    Strb = 6,
    Strh = 7,
}

impl LoadStoreOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadStoreOp::Ldr => "ldr",
            LoadStoreOp::Ldrb => "ldrb",
            LoadStoreOp::Ldrh => "ldrh",
            LoadStoreOp::Ldrsb => "ldrsb",
            LoadStoreOp::Ldrsh => "ldrsh",
            LoadStoreOp::Str => "str",
            LoadStoreOp::Strb => "strb",
            LoadStoreOp::Strh => "strh",
        }
    }

    pub fn is_load(self) -> bool {
        matches!(
            self,
            LoadStoreOp::Ldr | LoadStoreOp::Ldrb | LoadStoreOp::Ldrh | LoadStoreOp::Ldrsb | LoadStoreOp::Ldrsh
        )
    }

    /// Byte width touched in memory; sign/zero-extension to a word happens
    /// at the caller.
    pub fn access_size(self) -> usize {
        match self {
            LoadStoreOp::Ldr | LoadStoreOp::Str => 4,
            LoadStoreOp::Ldrh | LoadStoreOp::Ldrsh | LoadStoreOp::Strh => 2,
            LoadStoreOp::Ldrb | LoadStoreOp::Ldrsb | LoadStoreOp::Strb => 1,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, LoadStoreOp::Ldrsb | LoadStoreOp::Ldrsh)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn data_opcode_values_match_table() {
        assert_eq!(DataOp::Add as u8, 0x01);
        assert_eq!(DataOp::Srs as u8, 0x1A);
        assert_eq!(DataOp::Halt as u8, 0x1F);
    }

    #[test]
    fn reserved_opcode_has_no_variant() {
        assert!(DataOp::from_u8(0x1B).is_none());
        assert!(DataOp::from_u8(0x1E).is_none());
    }

    #[test]
    fn load_store_access_sizes() {
        assert_eq!(LoadStoreOp::Ldrsb.access_size(), 1);
        assert_eq!(LoadStoreOp::Ldrsh.access_size(), 2);
        assert!(LoadStoreOp::Ldrsb.is_signed());
        assert!(!LoadStoreOp::Ldr.is_signed());
    }
}
