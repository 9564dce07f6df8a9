//! Instruction encoding shared by the assembler and the simulator, and the
//! relocation arithmetic shared by the assembler and the linker.

pub mod condition;
pub mod immediate;
pub mod layout;
pub mod opcode;
pub mod reloc;

pub use condition::{Condition, Flags};
pub use immediate::{compute_immediate, ImmediateError};
pub use layout::{
    condition_of, decode_branch, decode_data, decode_load_store, decode_swi, dp_operand_width,
    encode_branch, encode_data, encode_load_store, encode_swi, family_of, BranchWord, DataWord,
    Family, LoadStoreWord, Operand, SwiWord,
};
pub use opcode::{DataOp, LoadStoreOp};
pub use reloc::RelocKind;

/// Word width of every memory access and register in M20.
pub type Word = u32;

/// Named general-purpose register indices that have a dedicated assembly
/// mnemonic beyond `r0`..`r12`.
pub const REG_SP: u8 = 13;
pub const REG_LP: u8 = 14;
pub const REG_PC: u8 = 15;

pub const GENERAL_REGISTER_COUNT: usize = 16;
