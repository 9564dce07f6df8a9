use std::io::{self, Write};
use std::num::Wrapping;

use m20_isa::{layout, Condition, DataOp, Flags};

use super::StopReason;
use crate::constants::WORD_BYTES;
use crate::exception::Exception;
use crate::memory::{Memory, Storage};
use crate::registers::{Mode, Registers};

pub enum TickResult {
    Running,
    Exit(StopReason),
}

/// The fetch-decode-execute engine (§4.5). `Processor` owns the memory and
/// drives `tick` in a loop; `Core` only knows about one step.
pub struct Core {
    registers: Registers,
    instructions_executed: u64,
}

impl Core {
    pub fn new() -> Core {
        Core {
            registers: Registers::boot(),
            instructions_executed: 0,
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn tick(&mut self, memory: &mut Memory) -> TickResult {
        let pc = self.registers.pc();
        if pc % WORD_BYTES != 0 || !memory.check_range(pc, WORD_BYTES) {
            return TickResult::Exit(StopReason::Exception(Exception::PrefetchAbort));
        }
        let word = memory.read_word(pc).expect("range checked above");
        self.registers.set_pc(pc + WORD_BYTES);

        let nibble = ((word >> layout::COND_SHIFT) & 0xF) as u8;
        let condition = match Condition::from_nibble(nibble) {
            Some(c) => c,
            None => return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction)),
        };

        // §4.5: "instructionsExecuted" counts every fetch, including ones
        // skipped by a failed condition check (§3 supplement).
        self.instructions_executed += 1;

        if !self.registers.condition_holds(condition) {
            return TickResult::Running;
        }

        match layout::family_of(word) {
            layout::Family::DataProcessing => self.execute_data(word, memory),
            layout::Family::LoadStore => self.execute_load_store(word, memory),
            layout::Family::Branch => self.execute_branch(word),
            layout::Family::SoftwareInterrupt => self.execute_swi(word, memory),
            layout::Family::CoprocessorReserved => {
                TickResult::Exit(StopReason::Exception(Exception::UsageAbort))
            }
        }
    }

    fn operand_value(&self, operand: layout::Operand) -> Result<u32, ()> {
        match operand {
            layout::Operand::Reg(r) => self.registers.read(r),
            layout::Operand::Imm(v) => Ok(v),
        }
    }

    fn execute_data(&mut self, word: u32, memory: &mut Memory) -> TickResult {
        let decoded = match layout::decode_data(word) {
            Some(d) => d,
            None => return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction)),
        };

        if decoded.opcode == DataOp::Noop {
            return TickResult::Running;
        }
        if decoded.opcode == DataOp::Halt {
            // HALT outside supervisor mode is itself a Usage Abort (§4.5).
            return if self.registers.mode() == Mode::Svr {
                TickResult::Exit(StopReason::Halted)
            } else {
                TickResult::Exit(StopReason::Exception(Exception::UsageAbort))
            };
        }

        if matches!(decoded.opcode, DataOp::Push | DataOp::Pop) {
            return self.execute_stack_op(decoded.opcode, decoded.rd, memory);
        }
        if matches!(decoded.opcode, DataOp::Srl | DataOp::Srs) {
            return self.execute_status_op(decoded.opcode, decoded.rd);
        }

        let operand = match self.operand_value(decoded.operand) {
            Ok(v) => v,
            Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
        };

        // D3 shape reads `rn`; D2 shape has no `rn` field and uses `rd`
        // itself as the left-hand operand (§4.2/§4.3 mnemonic table).
        let is_d2 = matches!(
            decoded.opcode,
            DataOp::Mov | DataOp::Mvn | DataOp::Cmp | DataOp::Cmn | DataOp::Tst | DataOp::Teq
        );
        let left = if is_d2 {
            match self.registers.read(decoded.rd) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            }
        } else {
            match self.registers.read(decoded.rn) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            }
        };

        let carry_in = self.registers.flags().c;
        let previous = self.registers.flags();
        let (result, flags, writes_back) = match decoded.opcode {
            DataOp::Add => {
                let (r, f) = add_with_carry(left, operand, false);
                (r, f, true)
            }
            DataOp::Adc => {
                let (r, f) = add_with_carry(left, operand, carry_in);
                (r, f, true)
            }
            DataOp::Sub => {
                let (r, f) = add_with_carry(left, !operand, true);
                (r, f, true)
            }
            DataOp::Sbc => {
                let (r, f) = add_with_carry(left, !operand, carry_in);
                (r, f, true)
            }
            DataOp::Cmp => {
                let (r, f) = add_with_carry(left, !operand, true);
                (r, f, false)
            }
            DataOp::Cmn => {
                let (r, f) = add_with_carry(left, operand, false);
                (r, f, false)
            }
            DataOp::Mul => (
                (Wrapping(left) * Wrapping(operand)).0,
                logic_flags((Wrapping(left) * Wrapping(operand)).0, previous),
                true,
            ),
            DataOp::Div => {
                if operand == 0 {
                    return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
                }
                let r = ((left as i32).wrapping_div(operand as i32)) as u32;
                (r, logic_flags(r, previous), true)
            }
            DataOp::Udv => {
                if operand == 0 {
                    return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
                }
                let r = left.wrapping_div(operand);
                (r, logic_flags(r, previous), true)
            }
            DataOp::Or => (left | operand, logic_flags(left | operand, previous), true),
            DataOp::And => (left & operand, logic_flags(left & operand, previous), true),
            DataOp::Xor => (left ^ operand, logic_flags(left ^ operand, previous), true),
            DataOp::Nor => (!(left | operand), logic_flags(!(left | operand), previous), true),
            DataOp::Bic => (left & !operand, logic_flags(left & !operand, previous), true),
            DataOp::Ror => {
                let r = left.rotate_right(operand);
                (r, logic_flags(r, previous), true)
            }
            DataOp::Lsl => {
                let r = left.wrapping_shl(operand);
                (r, logic_flags(r, previous), true)
            }
            DataOp::Lsr => {
                let r = left.wrapping_shr(operand);
                (r, logic_flags(r, previous), true)
            }
            DataOp::Asr => {
                let r = (left as i32).wrapping_shr(operand) as u32;
                (r, logic_flags(r, previous), true)
            }
            DataOp::Mov => (operand, logic_flags(operand, previous), true),
            DataOp::Mvn => (!operand, logic_flags(!operand, previous), true),
            DataOp::Tst => {
                let r = left & operand;
                (r, logic_flags(r, previous), false)
            }
            DataOp::Teq => {
                let r = left ^ operand;
                (r, logic_flags(r, previous), false)
            }
            DataOp::Noop | DataOp::Halt | DataOp::Push | DataOp::Pop | DataOp::Srl | DataOp::Srs => {
                unreachable!("handled above")
            }
        };

        if decoded.update_status {
            self.registers.set_flags(flags);
        }
        if writes_back && self.registers.write(decoded.rd, result).is_err() {
            return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
        }

        TickResult::Running
    }

    /// `PUSH rd`/`POP rd`: the natural stack semantics the source simulator
    /// never implemented (§9 design note).
    fn execute_stack_op(&mut self, opcode: DataOp, rd: u8, memory: &mut Memory) -> TickResult {
        match opcode {
            DataOp::Push => {
                let value = match self.registers.read(rd) {
                    Ok(v) => v,
                    Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
                };
                let sp = self.registers.sp().wrapping_sub(WORD_BYTES);
                if memory.write_word(sp, value).is_err() {
                    return TickResult::Exit(StopReason::Exception(Exception::DataAbort));
                }
                self.registers.set_sp(sp);
                TickResult::Running
            }
            DataOp::Pop => {
                let sp = self.registers.sp();
                let value = match memory.read_word(sp) {
                    Ok(v) => v,
                    Err(()) => return TickResult::Exit(StopReason::Exception(Exception::DataAbort)),
                };
                self.registers.set_sp(sp.wrapping_add(WORD_BYTES));
                if self.registers.write(rd, value).is_err() {
                    return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
                }
                TickResult::Running
            }
            _ => unreachable!(),
        }
    }

    /// `SRL rd` loads `sv` into `rd`; `SRS rd` stores `rd` into `sv` (§9:
    /// "status-register load/store" — `sv` is addressable only outside USR
    /// mode).
    fn execute_status_op(&mut self, opcode: DataOp, rd: u8) -> TickResult {
        match opcode {
            DataOp::Srl => match self.registers.sv() {
                Ok(value) => {
                    if self.registers.write(rd, value).is_err() {
                        return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
                    }
                    TickResult::Running
                }
                Err(()) => TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            },
            DataOp::Srs => {
                let value = match self.registers.read(rd) {
                    Ok(v) => v,
                    Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
                };
                match self.registers.set_sv(value) {
                    Ok(()) => TickResult::Running,
                    Err(()) => TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
                }
            }
            _ => unreachable!(),
        }
    }

    fn execute_load_store(&mut self, word: u32, memory: &mut Memory) -> TickResult {
        let decoded = match layout::decode_load_store(word) {
            Some(d) => d,
            None => return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction)),
        };

        let address = if decoded.has_base {
            let base = match self.registers.read(decoded.rn) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            };
            let offset = match self.operand_value(decoded.operand) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            };
            base.wrapping_add(offset)
        } else {
            let offset = match decoded.operand {
                layout::Operand::Imm(v) => v,
                layout::Operand::Reg(_) => {
                    return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction))
                }
            };
            // PC-relative: `pc` has already been advanced past this
            // instruction by fetch (matches M_RELATIVE_LABEL's -4 bias at
            // assemble time).
            self.registers.pc().wrapping_add(offset)
        };

        let size = decoded.opcode.access_size() as u32;
        if size == 4 && address % 4 != 0 {
            return TickResult::Exit(StopReason::Exception(Exception::DataAbort));
        }

        if decoded.opcode.is_load() {
            let raw = match size {
                1 => memory.read_byte(address).map(u32::from),
                2 => memory.read_half(address).map(u32::from),
                _ => memory.read_word(address),
            };
            let value = match raw {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::DataAbort)),
            };
            let value = if decoded.opcode.is_signed() {
                sign_extend(value, size * 8)
            } else {
                value
            };
            if self.registers.write(decoded.rd, value).is_err() {
                return TickResult::Exit(StopReason::Exception(Exception::UsageAbort));
            }
        } else {
            let value = match self.registers.read(decoded.rd) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            };
            let result = match size {
                1 => memory.write_byte(address, value as u8),
                2 => memory.write_half(address, value as u16),
                _ => memory.write_word(address, value),
            };
            if result.is_err() {
                return TickResult::Exit(StopReason::Exception(Exception::DataAbort));
            }
        }

        TickResult::Running
    }

    fn execute_branch(&mut self, word: u32) -> TickResult {
        let decoded = match layout::decode_branch(word) {
            Some(d) => d,
            None => return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction)),
        };

        let target = match decoded.operand {
            layout::Operand::Imm(offset_words) => {
                let offset_bytes = (offset_words as i32 as i64) * i64::from(WORD_BYTES);
                (i64::from(self.registers.pc()) + offset_bytes) as u32
            }
            layout::Operand::Reg(r) => match self.registers.read(r) {
                Ok(v) => v,
                Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
            },
        };

        if decoded.link {
            self.registers.set_lp(self.registers.pc());
        }
        self.registers.set_pc(target);
        TickResult::Running
    }

    /// Every software interrupt emulates `write(fd, ptr, len)` to standard
    /// output and continues (§4.5) — the only real I/O this simulator
    /// performs.
    fn execute_swi(&mut self, word: u32, memory: &mut Memory) -> TickResult {
        if layout::decode_swi(word).is_none() {
            return TickResult::Exit(StopReason::Exception(Exception::UndefinedInstruction));
        }

        let ptr = match self.registers.read(1) {
            Ok(v) => v,
            Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
        };
        let len = match self.registers.read(2) {
            Ok(v) => v,
            Err(()) => return TickResult::Exit(StopReason::Exception(Exception::UsageAbort)),
        };

        match memory.borrow_slice(ptr, len) {
            Ok(bytes) => {
                let _ = io::stdout().write_all(bytes);
                TickResult::Running
            }
            Err(()) => TickResult::Exit(StopReason::Exception(Exception::DataAbort)),
        }
    }
}

fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, Flags) {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let result = wide as u32;
    (
        result,
        Flags {
            n: (result as i32) < 0,
            z: result == 0,
            c: wide > u64::from(u32::MAX),
            // Known quirk (§9): real signed overflow is
            // `sign(a) == sign(b) && sign(result) != sign(a)`; the source
            // simulator instead flags "both operands negative", which this
            // preserves rather than silently fixing.
            v: (a as i32) < 0 && (b as i32) < 0,
        },
    )
}

fn logic_flags(result: u32, previous: Flags) -> Flags {
    Flags {
        n: (result as i32) < 0,
        z: result == 0,
        c: previous.c,
        v: previous.v,
    }
}

fn sign_extend(value: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as u32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::Memory;

    fn core_with(words: &[u32]) -> (Core, Memory) {
        let mut memory = Memory::new((words.len() as u32 + 4) * WORD_BYTES);
        for (i, &w) in words.iter().enumerate() {
            memory.write_word(i as u32 * WORD_BYTES, w).unwrap();
        }
        (Core::new(), memory)
    }

    #[test]
    fn mov_immediate_writes_rd() {
        let word = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Al,
            update_status: false,
            opcode: DataOp::Mov,
            rd: 0,
            rn: 0,
            operand: layout::Operand::Imm(5),
        });
        let (mut core, mut memory) = core_with(&[word]);
        let result = core.tick(&mut memory);
        assert!(matches!(result, TickResult::Running));
        assert_eq!(core.registers().read(0), Ok(5));
    }

    #[test]
    fn halt_outside_supervisor_mode_is_a_usage_abort() {
        let word = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Al,
            update_status: false,
            opcode: DataOp::Halt,
            rd: 0,
            rn: 0,
            operand: layout::Operand::Reg(0),
        });
        let (mut core, mut memory) = core_with(&[word]);
        core.registers.set_mode(Mode::Usr);
        let result = core.tick(&mut memory);
        assert!(matches!(
            result,
            TickResult::Exit(StopReason::Exception(Exception::UsageAbort))
        ));
    }

    #[test]
    fn divide_by_zero_is_a_usage_abort() {
        let word = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Al,
            update_status: false,
            opcode: DataOp::Div,
            rd: 0,
            rn: 0,
            operand: layout::Operand::Imm(0),
        });
        let (mut core, mut memory) = core_with(&[word]);
        let result = core.tick(&mut memory);
        assert!(matches!(
            result,
            TickResult::Exit(StopReason::Exception(Exception::UsageAbort))
        ));
    }

    #[test]
    fn unaligned_pc_is_a_prefetch_abort() {
        let (mut core, mut memory) = core_with(&[0]);
        core.registers.set_pc(2);
        let result = core.tick(&mut memory);
        assert!(matches!(
            result,
            TickResult::Exit(StopReason::Exception(Exception::PrefetchAbort))
        ));
    }

    #[test]
    fn push_then_pop_roundtrips_through_the_stack() {
        let push = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Al,
            update_status: false,
            opcode: DataOp::Push,
            rd: 0,
            rn: 0,
            operand: layout::Operand::Reg(0),
        });
        let pop = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Al,
            update_status: false,
            opcode: DataOp::Pop,
            rd: 1,
            rn: 0,
            operand: layout::Operand::Reg(0),
        });
        let (mut core, mut memory) = core_with(&[push, pop]);
        core.registers.write(0, 0xABCD).unwrap();
        let sp_before = core.registers().sp();
        assert!(matches!(core.tick(&mut memory), TickResult::Running));
        assert_eq!(core.registers().sp(), sp_before - WORD_BYTES);
        assert!(matches!(core.tick(&mut memory), TickResult::Running));
        assert_eq!(core.registers().read(1), Ok(0xABCD));
        assert_eq!(core.registers().sp(), sp_before);
    }

    #[test]
    fn condition_failure_still_counts_as_executed_and_skips_effects() {
        let word = m20_isa::encode_data(layout::DataWord {
            condition: Condition::Eq,
            update_status: false,
            opcode: DataOp::Mov,
            rd: 0,
            rn: 0,
            operand: layout::Operand::Imm(5),
        });
        let (mut core, mut memory) = core_with(&[word]);
        assert!(matches!(core.tick(&mut memory), TickResult::Running));
        assert_eq!(core.registers().read(0), Ok(0));
        assert_eq!(core.instructions_executed(), 1);
    }
}
