mod core;

use m20_obj::Executable;

pub use self::core::TickResult;
use crate::constants::{BOOT_LP, BOOT_STUB_WORD, DEFAULT_MEMORY_WORDS, WORD_BYTES};
use crate::exception::Exception;
use crate::memory::{Memory, Storage};
use crate::registers::{Flags, Mode, Registers};
use self::core::Core;

/// Why `Processor::run` stopped (§4.5: "on any exception the simulator...
/// halts" — `HALT,AL` and every exception but `SoftwareInterrupt` end the
/// loop the same way).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    Halted,
    Exception(Exception),
}

/// A snapshot of the processor state, the data `Simulator::printStatus`/
/// `printByteDump` rendered in the original (§3 supplement: a plain data
/// structure here, left to the caller to print).
#[derive(Clone, Debug)]
pub struct StatusDump {
    pub general: [u32; 13],
    pub sp: u32,
    pub lp: u32,
    pub sv: Option<u32>,
    pub pc: u32,
    pub status_word: u32,
    pub flags: Flags,
    pub mode: Mode,
    pub instructions_executed: u64,
}

pub struct Processor {
    memory: Memory,
    core: Core,
}

impl Processor {
    /// Boots a processor over `memory_words` words of zeroed memory, per
    /// §4.5's initial state (pc=0, supervisor mode, `sp`/`lp` set, the
    /// `HALT,AL` stub written at `BOOT_LP`).
    pub fn new(memory_words: usize) -> Processor {
        let mut memory = Memory::new(memory_words as u32 * WORD_BYTES);
        memory
            .write_word(BOOT_LP, BOOT_STUB_WORD)
            .expect("BOOT_LP must lie within memory_words");
        Processor { memory, core: Core::new() }
    }

    /// A processor with the default memory size (§2: configuration surface
    /// for the memory size, `DEFAULT_MEMORY_WORDS`).
    pub fn with_default_memory() -> Processor {
        Processor::new(DEFAULT_MEMORY_WORDS)
    }

    /// Loads an executable image at address 0 (§6.3: text then data,
    /// nothing else) and re-writes the boot stub in case the image
    /// overlapped it.
    pub fn load_executable(&mut self, executable: &Executable) -> Result<(), ()> {
        let bytes = executable.bytes();
        let slice = self.memory.borrow_slice_mut(0, bytes.len() as u32)?;
        slice.copy_from_slice(bytes);
        self.memory.write_word(BOOT_LP, BOOT_STUB_WORD)?;
        Ok(())
    }

    /// Runs until halt or an unhandled exception.
    pub fn run(&mut self) -> StopReason {
        loop {
            match self.core.tick(&mut self.memory) {
                TickResult::Running => {}
                TickResult::Exit(reason) => return reason,
            }
        }
    }

    pub fn registers(&self) -> &Registers {
        self.core.registers()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn instructions_executed(&self) -> u64 {
        self.core.instructions_executed()
    }

    pub fn dump(&self) -> StatusDump {
        let regs = self.core.registers();
        let mut general = [0u32; 13];
        for (i, slot) in general.iter_mut().enumerate() {
            *slot = regs.read(i as u8).expect("0..=12 always readable");
        }
        StatusDump {
            general,
            sp: regs.sp(),
            lp: regs.lp(),
            sv: regs.sv().ok(),
            pc: regs.pc(),
            status_word: regs.status_word(),
            flags: regs.flags(),
            mode: regs.mode(),
            instructions_executed: self.core.instructions_executed(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boot_writes_the_halt_stub_at_boot_lp() {
        let processor = Processor::with_default_memory();
        assert_eq!(processor.memory().read_word(BOOT_LP), Ok(BOOT_STUB_WORD));
    }

    #[test]
    fn dump_reports_the_current_bank() {
        let processor = Processor::with_default_memory();
        let dump = processor.dump();
        assert_eq!(dump.mode, Mode::Svr);
        assert_eq!(dump.instructions_executed, 0);
    }
}
