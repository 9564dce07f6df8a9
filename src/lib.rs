//! Instruction-set simulator for the M20 processor (§4.5): a fetch-decode-
//! execute loop over a fixed-size flat memory buffer loaded from an
//! [`m20_obj::Executable`].

pub mod constants;
pub mod exception;
pub mod memory;
pub mod processor;
pub mod registers;

pub use exception::Exception;
pub use memory::{Memory, Storage};
pub use processor::{Processor, StatusDump, StopReason};
pub use registers::{Flags, Mode, Registers};

#[cfg(test)]
mod tests {
    use super::*;
    use m20_isa::Condition;
    use std::num::Wrapping;

    #[test]
    fn wrapping_arithmetic() {
        let i = -50;
        let a = Wrapping(100u32);
        let b = Wrapping(i as u32);
        assert_eq!(a + b, Wrapping(50u32));
    }

    #[test]
    fn boot_stub_decodes_as_halt_al() {
        let decoded = m20_isa::decode_data(constants::BOOT_STUB_WORD).unwrap();
        assert_eq!(decoded.condition, Condition::Al);
        assert_eq!(decoded.opcode, m20_isa::DataOp::Halt);
    }
}
