use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use util::ParseEnumError;

/// Four NZCV status flags, bits 31..28 of the status word.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

/// The condition nibble carried by every instruction ([31:28]). `0xF` is
/// reserved and never constructed by `from_nibble`; the caller (the
/// simulator) treats that case as Undefined Instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum Condition {
    Eq = 0x0,
    Ne = 0x1,
    Cs = 0x2,
    Cc = 0x3,
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xA,
    Lt = 0xB,
    Gt = 0xC,
    Le = 0xD,
    Al = 0xE,
}

impl Condition {
    pub fn from_nibble(nibble: u8) -> Option<Condition> {
        FromPrimitive::from_u8(nibble)
    }

    pub fn nibble(self) -> u8 {
        ToPrimitive::to_u8(&self).unwrap()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Cs => "cs",
            Condition::Cc => "cc",
            Condition::Mi => "mi",
            Condition::Pl => "pl",
            Condition::Vs => "vs",
            Condition::Vc => "vc",
            Condition::Hi => "hi",
            Condition::Ls => "ls",
            Condition::Ge => "ge",
            Condition::Lt => "lt",
            Condition::Gt => "gt",
            Condition::Le => "le",
            Condition::Al => "al",
        }
    }

    pub fn from_mnemonic(s: &str) -> Result<Condition, ParseEnumError> {
        Ok(match s {
            "eq" => Condition::Eq,
            "ne" => Condition::Ne,
            "cs" => Condition::Cs,
            "cc" => Condition::Cc,
            "mi" => Condition::Mi,
            "pl" => Condition::Pl,
            "vs" => Condition::Vs,
            "vc" => Condition::Vc,
            "hi" => Condition::Hi,
            "ls" => Condition::Ls,
            "ge" => Condition::Ge,
            "lt" => Condition::Lt,
            "gt" => Condition::Gt,
            "le" => Condition::Le,
            "al" => Condition::Al,
            _ => {
                return Err(ParseEnumError {
                    value: s.to_owned(),
                    enum_name: "Condition",
                })
            }
        })
    }

    /// NZCV truth table from spec.md §4.5. `AL` is always true; `GE`/`LT`/
    /// `GT`/`LE` compare N (shifted to a bool) against V.
    pub fn evaluate(self, flags: Flags) -> bool {
        match self {
            Condition::Eq => flags.z,
            Condition::Ne => !flags.z,
            Condition::Cs => flags.c,
            Condition::Cc => !flags.c,
            Condition::Mi => flags.n,
            Condition::Pl => !flags.n,
            Condition::Vs => flags.v,
            Condition::Vc => !flags.v,
            Condition::Hi => flags.c && !flags.z,
            Condition::Ls => !flags.c || flags.z,
            Condition::Ge => flags.n == flags.v,
            Condition::Lt => flags.n != flags.v,
            Condition::Gt => !flags.z && (flags.n == flags.v),
            Condition::Le => flags.z || (flags.n != flags.v),
            Condition::Al => true,
        }
    }
}

impl Default for Condition {
    fn default() -> Condition {
        Condition::Al
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn al_is_always_true() {
        for n in &[false, true] {
            for z in &[false, true] {
                for c in &[false, true] {
                    for v in &[false, true] {
                        let flags = Flags { n: *n, z: *z, c: *c, v: *v };
                        assert!(Condition::Al.evaluate(flags));
                    }
                }
            }
        }
    }

    #[test]
    fn every_condition_has_a_true_and_false_setting() {
        let all_flags: Vec<Flags> = (0..16)
            .map(|bits| Flags {
                n: bits & 1 != 0,
                z: bits & 2 != 0,
                c: bits & 4 != 0,
                v: bits & 8 != 0,
            })
            .collect();

        for nibble in 0x0u8..=0xE {
            let cond = Condition::from_nibble(nibble).unwrap();
            let (mut saw_true, mut saw_false) = (false, false);
            for flags in &all_flags {
                if cond.evaluate(*flags) {
                    saw_true = true;
                } else {
                    saw_false = true;
                }
            }
            if cond != Condition::Al {
                assert!(saw_true && saw_false, "{:?} is constant", cond);
            }
        }
    }

    #[test]
    fn nibble_0xf_is_not_a_condition() {
        assert_eq!(Condition::from_nibble(0xF), None);
    }

    #[test]
    fn roundtrip_mnemonic() {
        for nibble in 0x0u8..=0xE {
            let cond = Condition::from_nibble(nibble).unwrap();
            assert_eq!(Condition::from_mnemonic(cond.mnemonic()).unwrap(), cond);
        }
    }
}
