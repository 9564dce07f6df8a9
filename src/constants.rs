//! Boot-time and layout constants for the simulator (§4.5).

/// Memory size used when a caller doesn't specify one explicitly: 64 KiB,
/// exactly covering the boot addresses `BOOT_SP`/`BOOT_LP` (§4.5). A
/// `Processor` built with fewer words can never reach those addresses and
/// panics at boot rather than silently booting into unmapped memory.
pub const DEFAULT_MEMORY_WORDS: usize = 0x4000;

pub const WORD_BYTES: u32 = 4;

/// `sp` at boot (§4.5).
pub const BOOT_SP: u32 = 0xFFF8;
/// `lp` at boot (§4.5).
pub const BOOT_LP: u32 = 0xFFFC;

/// Written at `BOOT_LP` at boot; decodes as `HALT,AL`. A return through an
/// uninitialized `lp` lands here instead of faulting into garbage.
pub const BOOT_STUB_WORD: u32 = 0xE1F0_0000;

/// Low two bits of the status word select the register bank (§3: "Register
/// bank selection is purely a function of the current mode nibble").
pub const STATUS_MODE_MASK: u32 = 0b11;

pub const STATUS_N_SHIFT: u32 = 31;
pub const STATUS_Z_SHIFT: u32 = 30;
pub const STATUS_C_SHIFT: u32 = 29;
pub const STATUS_V_SHIFT: u32 = 28;
