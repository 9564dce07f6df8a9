//! Exception taxonomy and vector numbers (§4.5).

/// A synchronous processor exception. Vector numbers are byte offsets
/// reserved for handlers (never executed by this simulator — only the
/// `HALT,AL` stub at `BOOT_LP` is); every exception halts the simulator
/// except [`Exception::SoftwareInterrupt`], which is special-cased to
/// emulate a `write` syscall and continue (§4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exception {
    UndefinedInstruction,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    UsageAbort,
    HardwareInterrupt,
}

impl Exception {
    pub fn vector(self) -> u32 {
        match self {
            Exception::UndefinedInstruction => 4,
            Exception::SoftwareInterrupt => 8,
            Exception::PrefetchAbort => 12,
            Exception::DataAbort => 16,
            Exception::UsageAbort => 20,
            Exception::HardwareInterrupt => 56,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vectors_match_spec_table() {
        assert_eq!(Exception::UndefinedInstruction.vector(), 4);
        assert_eq!(Exception::SoftwareInterrupt.vector(), 8);
        assert_eq!(Exception::PrefetchAbort.vector(), 12);
        assert_eq!(Exception::DataAbort.vector(), 16);
        assert_eq!(Exception::UsageAbort.vector(), 20);
        assert_eq!(Exception::HardwareInterrupt.vector(), 56);
    }
}
